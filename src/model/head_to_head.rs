use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Document;

/// One match between owner and opponent, from the owner's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMatchup {
    pub match_id: String,
    pub won: bool,
    pub points_scored: u32,
    pub points_allowed: u32,
    pub rating_change: f64,
    /// The owner's teammates in that match.
    pub partner_ids: Vec<String>,
    /// The opponent's teammates in that match.
    pub opponent_partner_ids: Vec<String>,
    pub played_at: DateTime<Utc>,
}

/// The owner's cumulative record against one opponent.
///
/// Records are directional: `(a, b)` and `(b, a)` are separate documents with
/// equal `played` counts and mirrored wins and losses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHeadRecord {
    pub owner_id: String,
    pub opponent_id: String,
    /// Opponent display name as of the last update.
    pub opponent_name: String,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub points_scored: u64,
    pub points_allowed: u64,
    #[serde(default)]
    pub rating_change: f64,
    #[serde(default)]
    pub largest_victory_margin: u32,
    #[serde(default)]
    pub largest_defeat_margin: u32,
    /// Most recent first.
    #[serde(default)]
    pub recent: Vec<RecentMatchup>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Document for HeadToHeadRecord {
    const COLLECTION: &'static str = "head_to_head";

    fn id(&self) -> Cow<'_, str> {
        Cow::Owned(Self::record_id(&self.owner_id, &self.opponent_id))
    }
}

impl HeadToHeadRecord {
    pub fn new(owner_id: impl Into<String>, opponent_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            opponent_id: opponent_id.into(),
            opponent_name: String::new(),
            played: 0,
            won: 0,
            lost: 0,
            points_scored: 0,
            points_allowed: 0,
            rating_change: 0.0,
            largest_victory_margin: 0,
            largest_defeat_margin: 0,
            recent: Vec::new(),
            last_updated: None,
        }
    }

    /// `"{owner}:{opponent}"`. Unambiguous because validated player ids never contain ':'.
    pub fn record_id(owner_id: &str, opponent_id: &str) -> String {
        format!("{}:{}", owner_id, opponent_id)
    }

    /// Fold one match into the record, keeping at most `recent_len` recent matchups.
    pub fn record(&mut self, matchup: RecentMatchup, opponent_name: &str, recent_len: usize) {
        self.played += 1;
        let margin = matchup.points_scored.abs_diff(matchup.points_allowed);
        if matchup.won {
            self.won += 1;
            self.largest_victory_margin = self.largest_victory_margin.max(margin);
        } else {
            self.lost += 1;
            self.largest_defeat_margin = self.largest_defeat_margin.max(margin);
        }
        self.points_scored += u64::from(matchup.points_scored);
        self.points_allowed += u64::from(matchup.points_allowed);
        self.rating_change += matchup.rating_change;
        self.opponent_name = opponent_name.to_string();
        self.last_updated = Some(matchup.played_at);

        self.recent.insert(0, matchup);
        self.recent.truncate(recent_len);
    }

    pub fn win_rate(&self) -> f64 {
        if self.played == 0 {
            0.0
        } else {
            f64::from(self.won) / f64::from(self.played)
        }
    }

    pub fn win_rate_percent(&self) -> f64 {
        self.win_rate() * 100.0
    }

    pub fn point_differential(&self) -> i64 {
        self.points_scored as i64 - self.points_allowed as i64
    }
}
