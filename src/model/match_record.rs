use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rivalry_macros::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    TeamA,
    TeamB,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::TeamA => Side::TeamB,
            Side::TeamB => Side::TeamA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    pub team_a: Vec<String>,
    pub team_b: Vec<String>,
}

impl Teams {
    pub fn new<A, B>(team_a: A, team_b: B) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self {
            team_a: team_a.into_iter().map(Into::into).collect(),
            team_b: team_b.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roster(&self, side: Side) -> &[String] {
        match side {
            Side::TeamA => &self.team_a,
            Side::TeamB => &self.team_b,
        }
    }
}

/// One set: both point totals and the side that reached the winning threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub team_a_points: u32,
    pub team_b_points: u32,
    pub winner: Side,
}

impl SetScore {
    /// A set scored `team_a_points`-`team_b_points`, won by the side with more points.
    pub fn new(team_a_points: u32, team_b_points: u32) -> Self {
        let winner = if team_b_points > team_a_points {
            Side::TeamB
        } else {
            Side::TeamA
        };
        Self {
            team_a_points,
            team_b_points,
            winner,
        }
    }

    pub fn points(&self, side: Side) -> u32 {
        match side {
            Side::TeamA => self.team_a_points,
            Side::TeamB => self.team_b_points,
        }
    }

    /// Points of `side` minus points of its opponent.
    pub fn differential(&self, side: Side) -> i64 {
        i64::from(self.points(side)) - i64::from(self.points(side.opponent()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameScore {
    pub sets: Vec<SetScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Side,
    pub games: Vec<GameScore>,
}

impl MatchResult {
    /// A single-game result made of the given sets.
    pub fn single_game(winner: Side, sets: Vec<SetScore>) -> Self {
        Self {
            winner,
            games: vec![GameScore { sets }],
        }
    }
}

/// A participant's rating change, stored on the match by stage 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub previous: f64,
    pub new: f64,
    pub delta: f64,
}

/// A match as stored. Immutable once completed, except for the completion markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "matches")]
pub struct Match {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub status: MatchStatus,
    #[serde(default)]
    pub teams: Option<Teams>,
    #[serde(default)]
    pub result: Option<MatchResult>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rating_processed: bool,
    #[serde(default)]
    pub rating_processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rating_updates: BTreeMap<String, RatingUpdate>,
    #[serde(default)]
    pub h2h_processed: bool,
    #[serde(default)]
    pub h2h_processed_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn scheduled(id: impl Into<String>, teams: Teams) -> Self {
        Self {
            id: id.into(),
            title: None,
            status: MatchStatus::Scheduled,
            teams: Some(teams),
            result: None,
            completed_at: None,
            rating_processed: false,
            rating_processed_at: None,
            rating_updates: BTreeMap::new(),
            h2h_processed: false,
            h2h_processed_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Transition to completed with the given result.
    pub fn complete(mut self, result: MatchResult, at: DateTime<Utc>) -> Self {
        self.status = MatchStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(at);
        self
    }

    /// Completed, rosters and result present, not yet rated.
    pub fn awaits_rating(&self) -> bool {
        self.status == MatchStatus::Completed
            && self.teams.is_some()
            && self.result.is_some()
            && !self.rating_processed
    }

    pub fn awaits_head_to_head(&self) -> bool {
        self.rating_processed && !self.h2h_processed
    }

    pub fn mark_rating_processed(
        &mut self,
        updates: BTreeMap<String, RatingUpdate>,
        at: DateTime<Utc>,
    ) {
        self.rating_processed = true;
        self.rating_processed_at = Some(at);
        self.rating_updates = updates;
    }

    pub fn mark_h2h_processed(&mut self, at: DateTime<Utc>) {
        self.h2h_processed = true;
        self.h2h_processed_at = Some(at);
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Reasons a stored match cannot be turned into a [`CompletedMatch`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("match {0} is not completed")]
    NotCompleted(String),
    #[error("match {0} has no team rosters")]
    MissingTeams(String),
    #[error("match {0} has no result")]
    MissingResult(String),
    #[error("match {0} has no scored games")]
    NoGames(String),
    #[error("match {id} has an empty roster for {side:?}")]
    EmptyTeam { id: String, side: Side },
    #[error("match {id} has teams of size {team_a} and {team_b}")]
    TeamSizeMismatch {
        id: String,
        team_a: usize,
        team_b: usize,
    },
    #[error("match {id} lists player {player} on both teams")]
    OverlappingRosters { id: String, player: String },
    #[error("match {id} lists player {player} twice on one team")]
    DuplicatePlayer { id: String, player: String },
    #[error("match {id} lists player {player:?}, ids may not be empty or contain ':'")]
    InvalidPlayerId { id: String, player: String },
}

impl MatchError {
    /// Missing data a later correction of the match can supply.
    ///
    /// Anything else is a logic failure that no redelivery will fix.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            MatchError::NotCompleted(_)
                | MatchError::MissingTeams(_)
                | MatchError::MissingResult(_)
                | MatchError::NoGames(_)
        )
    }
}

/// A completed match whose rosters and result have been validated.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedMatch {
    pub id: String,
    pub title: String,
    pub team_a: Vec<String>,
    pub team_b: Vec<String>,
    pub winner: Side,
    /// Every set of every game, in play order.
    pub sets: Vec<SetScore>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<&Match> for CompletedMatch {
    type Error = MatchError;

    fn try_from(m: &Match) -> Result<Self, Self::Error> {
        if m.status != MatchStatus::Completed {
            return Err(MatchError::NotCompleted(m.id.clone()));
        }
        let teams = m
            .teams
            .as_ref()
            .ok_or_else(|| MatchError::MissingTeams(m.id.clone()))?;
        let result = m
            .result
            .as_ref()
            .ok_or_else(|| MatchError::MissingResult(m.id.clone()))?;

        let sets: Vec<SetScore> = result
            .games
            .iter()
            .flat_map(|game| game.sets.iter().copied())
            .collect();
        if sets.is_empty() {
            return Err(MatchError::NoGames(m.id.clone()));
        }

        for side in [Side::TeamA, Side::TeamB] {
            if teams.roster(side).is_empty() {
                return Err(MatchError::EmptyTeam {
                    id: m.id.clone(),
                    side,
                });
            }
        }
        if teams.team_a.len() != teams.team_b.len() {
            return Err(MatchError::TeamSizeMismatch {
                id: m.id.clone(),
                team_a: teams.team_a.len(),
                team_b: teams.team_b.len(),
            });
        }

        // Player ids are the leading segment of derived keys such as
        // "{owner}:{opponent}" and must not contain the separator.
        if let Some(player) = teams
            .team_a
            .iter()
            .chain(&teams.team_b)
            .find(|player| player.is_empty() || player.contains(':'))
        {
            return Err(MatchError::InvalidPlayerId {
                id: m.id.clone(),
                player: player.clone(),
            });
        }

        let mut seen_a = HashSet::new();
        for player in &teams.team_a {
            if !seen_a.insert(player.as_str()) {
                return Err(MatchError::DuplicatePlayer {
                    id: m.id.clone(),
                    player: player.clone(),
                });
            }
        }
        let mut seen_b = HashSet::new();
        for player in &teams.team_b {
            if seen_a.contains(player.as_str()) {
                return Err(MatchError::OverlappingRosters {
                    id: m.id.clone(),
                    player: player.clone(),
                });
            }
            if !seen_b.insert(player.as_str()) {
                return Err(MatchError::DuplicatePlayer {
                    id: m.id.clone(),
                    player: player.clone(),
                });
            }
        }

        Ok(Self {
            id: m.id.clone(),
            title: m.display_title().to_string(),
            team_a: teams.team_a.clone(),
            team_b: teams.team_b.clone(),
            winner: result.winner,
            sets,
            completed_at: m.completed_at,
        })
    }
}

impl CompletedMatch {
    pub fn roster(&self, side: Side) -> &[String] {
        match side {
            Side::TeamA => &self.team_a,
            Side::TeamB => &self.team_b,
        }
    }

    /// Every participant with the side they played on, team A first.
    pub fn participants(&self) -> impl Iterator<Item = (Side, &str)> {
        self.team_a
            .iter()
            .map(|p| (Side::TeamA, p.as_str()))
            .chain(self.team_b.iter().map(|p| (Side::TeamB, p.as_str())))
    }

    pub fn side_of(&self, player_id: &str) -> Option<Side> {
        self.participants()
            .find(|(_, p)| *p == player_id)
            .map(|(side, _)| side)
    }

    /// Teammates of `player_id` on `side`.
    pub fn teammates<'a>(&'a self, side: Side, player_id: &'a str) -> impl Iterator<Item = &'a str> {
        self.roster(side)
            .iter()
            .map(String::as_str)
            .filter(move |p| *p != player_id)
    }

    pub fn won(&self, side: Side) -> bool {
        self.winner == side
    }

    /// Total points of `side` over all sets of all games.
    pub fn points(&self, side: Side) -> u32 {
        self.sets.iter().map(|s| s.points(side)).sum()
    }
}
