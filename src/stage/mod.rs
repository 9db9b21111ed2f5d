//! The three pipeline stages.
//!
//! Each stage handles one unit of work (a match for rating and head-to-head,
//! a player for nemesis) as a read, compute, conditional-commit cycle. The
//! commit carries the stage's completion marker and the messages for the next
//! stage, so a unit is either fully applied or not at all.

mod head_to_head;
mod nemesis;
mod rating;

pub use head_to_head::{HeadToHeadStage, PairBatch, SkippedPair};
pub use nemesis::{select_nemesis, NemesisStage};
pub use rating::RatingStage;

use tracing::debug;

use crate::model::MatchError;
use crate::service::StageError;
use crate::store::StoreError;

/// What a stage did with a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The unit was committed.
    Applied { documents: usize, messages: usize },
    /// Nothing was written.
    Skipped(SkipReason),
}

impl StageOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, StageOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MatchNotFound,
    PlayerNotFound,
    /// The stage's completion marker is already set.
    AlreadyProcessed,
    /// An earlier stage has not completed for this match.
    NotReady,
    /// The match lacks data a later correction may supply.
    Malformed(MatchError),
    /// The recomputed value equals the stored one.
    Unchanged,
}

/// Run one read-compute-commit attempt, starting over on write conflicts.
pub(crate) fn retry_on_conflict<F>(max_attempts: u32, mut attempt: F) -> Result<StageOutcome, StageError>
where
    F: FnMut() -> Result<StageOutcome, StageError>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt() {
            Err(StageError::Store(err @ StoreError::Conflict { .. })) => {
                if attempts >= max_attempts {
                    return Err(StageError::Contention {
                        attempts,
                        source: err,
                    });
                }
                debug!(attempt = attempts, error = %err, "commit conflict, retrying");
            }
            other => return other,
        }
    }
}
