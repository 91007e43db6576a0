//! Persistence port for games and their players.

use async_trait::async_trait;
use thiserror::Error;

use crate::{Game, GameId, GamePlayer};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read/write access to game and player records.
///
/// Implementations are expected to give read-your-writes consistency.
/// Serialising concurrent writers for the same game is the caller's job.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn find_game(&self, game_id: GameId) -> Result<Option<Game>, StoreError>;

    async fn save_game(&self, game: Game) -> Result<Game, StoreError>;

    /// Players of a game, ascending by `turn_order`.
    async fn find_players(&self, game_id: GameId) -> Result<Vec<GamePlayer>, StoreError>;

    /// Upserts exactly the records passed, as one batch.
    async fn save_players(&self, players: Vec<GamePlayer>) -> Result<Vec<GamePlayer>, StoreError>;
}
