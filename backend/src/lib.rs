use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use game_core::{
    AdvanceOptions, Game, GameId, GamePlayer, GameStore, StoreError, TurnAdvance, TurnAdvancer,
    TurnError, UserId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Parses a boolean handed over as text by a transport: `true` or `false`,
/// trimmed and case-insensitive.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRecord {
    pub game: Game,
    pub players: Vec<GamePlayer>,
}

/// Game-state store held in memory, optionally mirrored to a JSON file after
/// every write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    games: Arc<RwLock<HashMap<GameId, GameRecord>>>,
    persist_path: Option<PathBuf>,
}

impl MemoryStore {
    pub async fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self {
            persist_path: Some(path.clone()),
            ..Self::default()
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let saved: HashMap<GameId, GameRecord> = serde_json::from_slice(&bytes)
                    .map_err(|err| StoreError::Serialization(err.to_string()))?;
                debug!(path = %path.display(), games = saved.len(), "loaded persisted games");
                store.games = Arc::new(RwLock::new(saved));
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted state yet");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(store)
    }

    pub async fn insert(&self, game: Game, players: Vec<GamePlayer>) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let mut staged = games.clone();
        staged.insert(game.id, GameRecord { game, players });
        self.commit(&mut games, staged).await
    }

    /// The game together with its players in `turn_order`.
    pub async fn record(&self, game_id: GameId) -> Option<GameRecord> {
        let games = self.games.read().await;
        games.get(&game_id).cloned().map(|mut record| {
            record.players.sort_by_key(|p| p.turn_order);
            record
        })
    }

    /// Writes `staged` to disk and only then swaps it in, so a failed write
    /// leaves the map as it was.
    async fn commit(
        &self,
        games: &mut HashMap<GameId, GameRecord>,
        staged: HashMap<GameId, GameRecord>,
    ) -> Result<(), StoreError> {
        self.persist(&staged).await?;
        *games = staged;
        Ok(())
    }

    async fn persist(&self, games: &HashMap<GameId, GameRecord>) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(games)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        if let Err(err) = tokio::fs::write(path, json).await {
            warn!(path = %path.display(), error = %err, "persist failed");
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StoreError> {
        let games = self.games.read().await;
        Ok(games.get(&game_id).map(|record| record.game.clone()))
    }

    async fn save_game(&self, game: Game) -> Result<Game, StoreError> {
        let mut games = self.games.write().await;
        let mut staged = games.clone();
        match staged.get_mut(&game.id) {
            Some(record) => record.game = game.clone(),
            None => {
                staged.insert(
                    game.id,
                    GameRecord {
                        game: game.clone(),
                        players: Vec::new(),
                    },
                );
            }
        }
        self.commit(&mut games, staged).await?;
        Ok(game)
    }

    async fn find_players(&self, game_id: GameId) -> Result<Vec<GamePlayer>, StoreError> {
        let games = self.games.read().await;
        let mut players = games
            .get(&game_id)
            .map(|record| record.players.clone())
            .unwrap_or_default();
        players.sort_by_key(|p| p.turn_order);
        Ok(players)
    }

    async fn save_players(&self, players: Vec<GamePlayer>) -> Result<Vec<GamePlayer>, StoreError> {
        let mut games = self.games.write().await;
        let mut staged = games.clone();
        for player in &players {
            let record = staged.get_mut(&player.game_id).ok_or_else(|| {
                StoreError::Unavailable(format!(
                    "player {} belongs to unknown game {}",
                    player.id, player.game_id
                ))
            })?;
            match record.players.iter_mut().find(|p| p.id == player.id) {
                Some(slot) => *slot = player.clone(),
                None => record.players.push(player.clone()),
            }
        }
        self.commit(&mut games, staged).await?;
        Ok(players)
    }
}

/// Runs turn advances one at a time per game; different games proceed in
/// parallel.
pub struct TurnService<S> {
    advancer: Arc<TurnAdvancer<S>>,
    locks: Arc<Mutex<HashMap<GameId, Arc<Mutex<()>>>>>,
}

impl<S> Clone for TurnService<S> {
    fn clone(&self) -> Self {
        Self {
            advancer: Arc::clone(&self.advancer),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: GameStore> TurnService<S> {
    pub fn new(store: S) -> Self {
        Self {
            advancer: Arc::new(TurnAdvancer::new(store)),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &S {
        self.advancer.store()
    }

    pub async fn advance_turn(
        &self,
        game_id: GameId,
        acting_user_id: UserId,
        options: AdvanceOptions,
    ) -> Result<TurnAdvance, TurnError> {
        let game_lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(game_id).or_default())
        };
        let result = {
            let _guard = game_lock.lock().await;
            self.advancer
                .advance_turn(game_id, acting_user_id, options)
                .await
        };

        // Entries are created under the table lock, so with it held a count of
        // two (table + ours) means nobody else is waiting on this game.
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&game_lock) == 2 {
            locks.remove(&game_id);
        }
        result
    }

    #[cfg(test)]
    async fn tracked_games(&self) -> usize {
        self.locks.lock().await.len()
    }
}
