use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rivalry_macros::Document;

/// Rating fields of a player. Absent values mean "never rated".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingProfile {
    pub current: Option<f64>,
    pub peak: Option<f64>,
    pub peak_at: Option<DateTime<Utc>>,
    pub rated_matches: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl RatingProfile {
    pub fn current_or(&self, default_rating: f64) -> f64 {
        self.current.unwrap_or(default_rating)
    }

    /// Move from `previous` to `new_rating`, raising the peak if it is exceeded.
    ///
    /// A profile without a peak counts `previous` as the highest rating held so far.
    pub fn apply(&mut self, previous: f64, new_rating: f64, at: DateTime<Utc>) {
        let peak = self.peak.unwrap_or(previous).max(previous);
        self.current = Some(new_rating);
        self.rated_matches += 1;
        self.last_updated = Some(at);
        if new_rating > peak {
            self.peak = Some(new_rating);
            self.peak_at = Some(at);
        } else {
            self.peak = Some(peak);
        }
    }
}

/// Aggregate record with one teammate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeammateStats {
    pub teammate_name: String,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub points_scored: u64,
    pub points_allowed: u64,
    pub rating_change: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl TeammateStats {
    pub fn win_rate(&self) -> f64 {
        if self.played == 0 {
            0.0
        } else {
            f64::from(self.won) / f64::from(self.played)
        }
    }
}

/// Set point differentials from the player's side: positive in won sets, negative in lost sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PointStats {
    pub won_sets_differential: i64,
    pub won_sets: u32,
    pub lost_sets_differential: i64,
    pub lost_sets: u32,
}

impl PointStats {
    pub fn average_won_margin(&self) -> Option<f64> {
        (self.won_sets > 0).then(|| self.won_sets_differential as f64 / f64::from(self.won_sets))
    }

    pub fn average_lost_margin(&self) -> Option<f64> {
        (self.lost_sets > 0).then(|| self.lost_sets_differential as f64 / f64::from(self.lost_sets))
    }
}

/// The win against the strongest opposing team so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestWin {
    pub match_id: String,
    pub match_title: String,
    /// Weak-link team rating of the beaten team.
    pub opponent_team_rating: f64,
    pub opponent_team_avg_rating: f64,
    pub opponent_names: String,
    pub rating_gained: f64,
    pub achieved_at: DateTime<Utc>,
}

/// The opponent this player fares worst against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NemesisDesignation {
    pub opponent_id: String,
    pub opponent_name: String,
    pub matches_won: u32,
    pub matches_lost: u32,
    pub matches_played: u32,
    pub win_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "players")]
pub struct Player {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub rating: RatingProfile,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    /// +n on an n-match win streak, -n on an n-match losing streak.
    #[serde(default)]
    pub current_streak: i32,
    /// Most recent first.
    #[serde(default)]
    pub recent_match_ids: Vec<String>,
    #[serde(default)]
    pub best_win: Option<BestWin>,
    #[serde(default)]
    pub nemesis: Option<NemesisDesignation>,
    #[serde(default)]
    pub teammate_stats: BTreeMap<String, TeammateStats>,
    #[serde(default)]
    pub point_stats: PointStats,
}

impl Player {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            rating: RatingProfile::default(),
            wins: 0,
            losses: 0,
            current_streak: 0,
            recent_match_ids: Vec::new(),
            best_win: None,
            nemesis: None,
            teammate_stats: BTreeMap::new(),
            point_stats: PointStats::default(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating.current = Some(rating);
        self.rating.peak = Some(rating);
        self
    }

    /// Display name, falling back to email, then "Unknown".
    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|email| !email.trim().is_empty()))
            .unwrap_or("Unknown")
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses
    }
}

/// One append-only entry of a player's rating history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "rating_history")]
pub struct RatingHistoryEntry {
    /// `"{player_id}:{match_id}"`
    pub id: String,
    pub player_id: String,
    pub match_id: String,
    pub old_rating: f64,
    pub new_rating: f64,
    pub delta: f64,
    /// Opponent display names joined with " & ".
    pub opponent_label: String,
    pub won: bool,
    pub timestamp: DateTime<Utc>,
}

impl RatingHistoryEntry {
    pub fn entry_id(player_id: &str, match_id: &str) -> String {
        format!("{}:{}", player_id, match_id)
    }
}
