//! Queue names, message types and payloads of the pipeline signals.

use serde::{Deserialize, Serialize};

use crate::bus::Message;

/// Named queues, one per stage.
pub mod queues {
    pub const RATING: &str = "rating";
    pub const HEAD_TO_HEAD: &str = "head_to_head";
    pub const NEMESIS: &str = "nemesis";
}

/// Message types.
pub mod types {
    pub const MATCH_COMPLETED: &str = "match.completed";
    pub const MATCH_RATING_PROCESSED: &str = "match.rating_processed";
    pub const HEAD_TO_HEAD_CHANGED: &str = "head_to_head.changed";
}

/// A match became completed with rosters and result present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCompleted {
    pub match_id: String,
}

/// Stage 1 committed ratings and the rating marker for a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRatingProcessed {
    pub match_id: String,
}

/// A player's head-to-head record set changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadToHeadChanged {
    pub owner_id: String,
    pub match_id: String,
}

impl MatchCompleted {
    pub fn message(&self) -> Result<Message, bitcode::Error> {
        Message::encode(
            format!("{}:{}", self.match_id, types::MATCH_COMPLETED),
            types::MATCH_COMPLETED,
            self,
        )
    }
}

impl MatchRatingProcessed {
    pub fn message(&self) -> Result<Message, bitcode::Error> {
        Message::encode(
            format!("{}:{}", self.match_id, types::MATCH_RATING_PROCESSED),
            types::MATCH_RATING_PROCESSED,
            self,
        )
    }
}

impl HeadToHeadChanged {
    pub fn message(&self) -> Result<Message, bitcode::Error> {
        Message::encode(
            format!("{}:{}:{}", self.match_id, self.owner_id, types::HEAD_TO_HEAD_CHANGED),
            types::HEAD_TO_HEAD_CHANGED,
            self,
        )
    }
}
