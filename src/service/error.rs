//! Error type for stage handlers.

use crate::model::MatchError;
use crate::store::StoreError;

/// Error type for stage handler operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    /// No handler registered for this message type.
    #[error("unknown message type: {0}")]
    UnknownMessage(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    /// The match can never be processed as stored.
    #[error("invalid match: {0}")]
    InvalidMatch(#[from] MatchError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Every commit attempt lost a race with another writer.
    #[error("gave up after {attempts} conflicting commits: {source}")]
    Contention { attempts: u32, source: StoreError },
}

impl StageError {
    /// Whether redelivering the message may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StageError::Store(err) => err.is_transient(),
            StageError::Contention { .. } => true,
            _ => false,
        }
    }
}

impl From<bitcode::Error> for StageError {
    fn from(err: bitcode::Error) -> Self {
        StageError::Decode(err.to_string())
    }
}
