use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use backend::{init_tracing, parse_flag, MemoryStore, TurnService};
use clap::{ArgAction, Parser, Subcommand};
use game_core::{AdvanceOptions, GameId, UserId};
use tracing::info;

#[derive(Parser)]
#[command(name = "backend")]
#[command(about = "Turn rotation for board-game matches backed by a JSON state file")]
struct Cli {
    /// JSON file holding games and their players
    #[arg(long, env = "PERSIST_PATH")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// End a user's turn and hand it to the next player outside jail
    Advance {
        #[arg(long)]
        game: GameId,

        /// User whose turn is ending
        #[arg(long)]
        user: UserId,

        /// Whether the turn ended by timeout (true/false)
        #[arg(long, default_value = "false", action = ArgAction::Set, value_parser = parse_timeout)]
        timeout: bool,

        /// Turn start stamp for the next player; defaults to unix millis
        #[arg(long)]
        now: Option<String>,

        /// Also refuse unless the game's next-player pointer names this user
        #[arg(long)]
        require_active: bool,
    },
    /// Print a game and its players in turn order
    Show {
        #[arg(long)]
        game: GameId,
    },
}

fn parse_timeout(value: &str) -> Result<bool, String> {
    parse_flag(value).ok_or_else(|| format!("expected true or false, got {value:?}"))
}

fn unix_millis() -> anyhow::Result<String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?;
    Ok(elapsed.as_millis().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let store = MemoryStore::with_persistence(cli.state.clone())
        .await
        .with_context(|| format!("failed to load state from {}", cli.state.display()))?;

    match cli.command {
        Command::Advance {
            game,
            user,
            timeout,
            now,
            require_active,
        } => {
            let now = match now {
                Some(now) => now,
                None => unix_millis()?,
            };
            let options = AdvanceOptions {
                is_timeout: timeout,
                now,
                require_active,
            };
            let service = TurnService::new(store);
            let advance = service
                .advance_turn(game, user, options)
                .await
                .with_context(|| format!("failed to advance turn for user {user} in game {game}"))?;
            info!(game, next = advance.next_user_id, "state saved");
            println!("{}", serde_json::to_string_pretty(&advance)?);
        }
        Command::Show { game } => {
            let record = store
                .record(game)
                .await
                .with_context(|| format!("game {game} not found"))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
