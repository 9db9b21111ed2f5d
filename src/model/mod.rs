//! Documents read and written by the pipeline.
//!
//! | Document | Collection | Written by |
//! |---|---|---|
//! | [`Match`] | `matches` | collaborators; markers by stages 1 and 2 |
//! | [`Player`] | `players` | stage 1 (profile, stats), stage 3 (nemesis) |
//! | [`RatingHistoryEntry`] | `rating_history` | stage 1, append-only |
//! | [`HeadToHeadRecord`] | `head_to_head` | stage 2 |

mod head_to_head;
mod match_record;
mod player;

pub use head_to_head::{HeadToHeadRecord, RecentMatchup};
pub use match_record::{
    CompletedMatch, GameScore, Match, MatchError, MatchResult, MatchStatus, RatingUpdate,
    SetScore, Side, Teams,
};
pub use player::{
    BestWin, NemesisDesignation, Player, PointStats, RatingHistoryEntry, RatingProfile,
    TeammateStats,
};
