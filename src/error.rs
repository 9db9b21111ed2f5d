//! Errors surfaced at the pipeline boundary.

use crate::bus::QueueError;
use crate::config::ConfigError;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not encode message: {0}")]
    Encode(String),
}

impl From<bitcode::Error> for PipelineError {
    fn from(err: bitcode::Error) -> Self {
        PipelineError::Encode(err.to_string())
    }
}
