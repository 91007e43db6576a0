use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod store;
pub mod turn;

pub use store::{GameStore, StoreError};
pub use turn::{next_eligible_index, AdvanceOptions, TurnAdvance, TurnAdvancer};

pub type GameId = i64;
pub type UserId = i64;
pub type PlayerId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Pending,
    Running,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Public,
    Private,
    Tournament,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub id: GameId,
    pub code: String,
    pub mode: Option<GameMode>,
    pub creator_id: UserId,
    pub status: Option<GameStatus>,
    pub winner_id: Option<UserId>,
    pub number_of_players: u32,
    /// User whose turn is current.
    pub next_player_id: Option<UserId>,
    pub is_ai: bool,
    pub is_minipay: bool,
    pub chain: Option<String>,
    pub duration: Option<String>,
    pub started_at: Option<String>,
    pub contract_game_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GamePlayer {
    pub id: PlayerId,
    pub game_id: GameId,
    pub user_id: UserId,
    pub symbol: String,
    pub position: u32,
    pub balance: i64,
    pub in_jail: bool,
    pub in_jail_rolls: u32,
    pub circle: u32,
    /// 1-based rotation slot, unique within a game.
    pub turn_order: u32,
    /// Opaque stamp set while this player is the active one.
    pub turn_start: Option<String>,
    pub consecutive_timeouts: u32,
    pub turn_count: u32,
    pub last_timeout_turn_start: Option<String>,
    pub trade_locked_balance: String,
    pub rolled: Option<u32>,
    pub address: Option<String>,
}

impl GamePlayer {
    pub fn is_active(&self) -> bool {
        self.turn_start.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Game,
    Player,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("{0:?} not found")]
    NotFound(NotFoundKind),
    #[error("not your turn")]
    NotPlayersTurn,
    #[error("invalid turn state: {0}")]
    InvalidState(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_mode_use_wire_casing() {
        assert_eq!(
            serde_json::to_string(&GameStatus::Running).unwrap(),
            "\"RUNNING\""
        );
        assert_eq!(
            serde_json::to_string(&GameMode::Tournament).unwrap(),
            "\"tournament\""
        );
        let status: GameStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(status, GameStatus::Pending);
    }

    #[test]
    fn active_means_turn_start_is_set() {
        let mut player = GamePlayer {
            id: 1,
            game_id: 1,
            user_id: 1,
            symbol: "A".into(),
            position: 0,
            balance: 1500,
            in_jail: false,
            in_jail_rolls: 0,
            circle: 0,
            turn_order: 1,
            turn_start: None,
            consecutive_timeouts: 0,
            turn_count: 0,
            last_timeout_turn_start: None,
            trade_locked_balance: "0.00".into(),
            rolled: None,
            address: None,
        };
        assert!(!player.is_active());
        player.turn_start = Some("100".into());
        assert!(player.is_active());
    }

    #[test]
    fn errors_render_readable_messages() {
        assert_eq!(
            TurnError::NotFound(NotFoundKind::Game).to_string(),
            "Game not found"
        );
        assert_eq!(TurnError::NotPlayersTurn.to_string(), "not your turn");
        let err: TurnError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.to_string(), "store error: store unavailable: down");
    }
}
