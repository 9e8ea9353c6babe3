use thiserror::Error;

use takesix_shared::types::GameId;

/// Errors produced by the store layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A snapshot carried a different game id than the request it answers.
    #[error("Snapshot for game {got} does not match requested game {expected}")]
    GameMismatch { expected: GameId, got: GameId },

    /// Hand, columns or heaps were offered for a game that has not started.
    #[error("Game {0} has not started")]
    NotStarted(GameId),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
