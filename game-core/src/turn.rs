//! Turn rotation: ends the acting player's turn and hands it to the next
//! player in `turn_order` who is not in jail.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{GameId, GamePlayer, GameStore, NotFoundKind, TurnError, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOptions {
    /// The turn ended through inaction rather than an explicit action.
    pub is_timeout: bool,
    /// Stamp written to the new active player's `turn_start`.
    pub now: String,
    /// Also reject the call unless the acting user is `game.next_player_id`.
    pub require_active: bool,
}

impl AdvanceOptions {
    pub fn action(now: impl Into<String>) -> Self {
        Self {
            is_timeout: false,
            now: now.into(),
            require_active: false,
        }
    }

    pub fn timeout(now: impl Into<String>) -> Self {
        Self {
            is_timeout: true,
            ..Self::action(now)
        }
    }
}

/// Summary of a completed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnAdvance {
    pub game_id: GameId,
    pub previous_user_id: UserId,
    pub next_user_id: UserId,
    /// Jailed players passed over between the previous and next player.
    pub skipped_jailed: usize,
    /// The previous player's timeout counter after the transition.
    pub consecutive_timeouts: u32,
}

/// Index of the first non-jailed player after `current`, wrapping around.
/// `current` itself is never returned.
pub fn next_eligible_index(players: &[GamePlayer], current: usize) -> Option<usize> {
    let len = players.len();
    (1..len)
        .map(|step| (current + step) % len)
        .find(|&idx| !players[idx].in_jail)
}

pub struct TurnAdvancer<S> {
    store: S,
}

impl<S: GameStore> TurnAdvancer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ends `acting_user_id`'s turn and activates the next eligible player.
    ///
    /// Writes the two changed players as one batch (`[current, next]`), then
    /// the game's `next_player_id`. Nothing is written when any check fails,
    /// and the game is left untouched if the player batch fails.
    pub async fn advance_turn(
        &self,
        game_id: GameId,
        acting_user_id: UserId,
        options: AdvanceOptions,
    ) -> Result<TurnAdvance, TurnError> {
        let mut game = self
            .store
            .find_game(game_id)
            .await?
            .ok_or(TurnError::NotFound(NotFoundKind::Game))?;

        let mut players = self.store.find_players(game_id).await?;
        players.sort_by_key(|p| p.turn_order);
        debug!(game_id, players = players.len(), "loaded players for turn advance");

        if players.len() != game.number_of_players as usize {
            warn!(
                game_id,
                expected = game.number_of_players,
                loaded = players.len(),
                "player count differs from game record; rotating over loaded players"
            );
        }

        let current_index = players
            .iter()
            .position(|p| p.user_id == acting_user_id)
            .ok_or(TurnError::NotFound(NotFoundKind::Player))?;

        let is_pointer = game.next_player_id == Some(acting_user_id);
        if options.require_active && !is_pointer {
            return Err(TurnError::NotPlayersTurn);
        }
        // The actor must hold the turn: either it is the active player, or no
        // one is active yet and the game points at it.
        let holds_turn = players[current_index].is_active()
            || (is_pointer && !players.iter().any(GamePlayer::is_active));
        if !holds_turn {
            return Err(TurnError::NotPlayersTurn);
        }

        let next_index = next_eligible_index(&players, current_index).ok_or_else(|| {
            TurnError::InvalidState(format!(
                "no player outside jail can follow user {acting_user_id} in game {game_id}"
            ))
        })?;
        let len = players.len();
        let skipped_jailed = (next_index + len - current_index) % len - 1;

        let mut current = players[current_index].clone();
        let mut next = players[next_index].clone();
        end_turn(&mut current, options.is_timeout);
        begin_turn(&mut next, options.now);

        let advance = TurnAdvance {
            game_id,
            previous_user_id: current.user_id,
            next_user_id: next.user_id,
            skipped_jailed,
            consecutive_timeouts: current.consecutive_timeouts,
        };

        self.store.save_players(vec![current, next]).await?;
        game.next_player_id = Some(advance.next_user_id);
        self.store.save_game(game).await?;

        info!(
            game_id,
            from = advance.previous_user_id,
            to = advance.next_user_id,
            timeout = options.is_timeout,
            skipped_jailed,
            "turn advanced"
        );
        Ok(advance)
    }
}

fn end_turn(player: &mut GamePlayer, is_timeout: bool) {
    let started = player.turn_start.take();
    if is_timeout {
        player.consecutive_timeouts = player.consecutive_timeouts.saturating_add(1);
        player.last_timeout_turn_start = started;
    } else {
        player.consecutive_timeouts = 0;
    }
}

fn begin_turn(player: &mut GamePlayer, now: String) {
    player.turn_start = Some(now);
    player.turn_count = player.turn_count.saturating_add(1);
    player.rolled = Some(0);
    player.consecutive_timeouts = 0;
}
