//! Stage 1: weak-link Elo update for every participant of a completed match.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn};

use crate::bus::Message;
use crate::config::RatingConfig;
use crate::elo::{self, MatchRating};
use crate::events::{queues, MatchCompleted, MatchRatingProcessed};
use crate::model::{
    BestWin, CompletedMatch, Match, Player, RatingHistoryEntry, RatingUpdate, Side,
};
use crate::service::StageError;
use crate::store::{DocumentStore, Transaction, Versioned};

use super::{retry_on_conflict, SkipReason, StageOutcome};

/// Rates completed matches.
#[derive(Debug, Clone)]
pub struct RatingStage {
    config: RatingConfig,
    max_commit_attempts: u32,
}

impl RatingStage {
    pub fn new(config: RatingConfig, max_commit_attempts: u32) -> Self {
        Self {
            config,
            max_commit_attempts: max_commit_attempts.max(1),
        }
    }

    /// Handle a `match.completed` message.
    pub fn handle_message<S: DocumentStore>(
        &self,
        store: &S,
        message: &Message,
    ) -> Result<StageOutcome, StageError> {
        let signal: MatchCompleted = message.decode()?;
        self.process(store, &signal.match_id)
    }

    /// Rate one match unless it is already rated.
    pub fn process<S: DocumentStore>(
        &self,
        store: &S,
        match_id: &str,
    ) -> Result<StageOutcome, StageError> {
        let span = info_span!("rating", match_id = %match_id);
        let _guard = span.enter();

        retry_on_conflict(self.max_commit_attempts, || self.attempt(store, match_id))
    }

    fn attempt<S: DocumentStore>(
        &self,
        store: &S,
        match_id: &str,
    ) -> Result<StageOutcome, StageError> {
        let Some(mut stored) = store.get::<Match>(match_id)? else {
            warn!("match not found");
            return Ok(StageOutcome::Skipped(SkipReason::MatchNotFound));
        };
        if stored.data.rating_processed {
            return Ok(StageOutcome::Skipped(SkipReason::AlreadyProcessed));
        }

        let completed = match CompletedMatch::try_from(&stored.data) {
            Ok(completed) => completed,
            Err(err) if err.is_malformed() => {
                warn!(error = %err, "declining malformed match");
                return Ok(StageOutcome::Skipped(SkipReason::Malformed(err)));
            }
            Err(err) => return Err(err.into()),
        };

        let mut players: BTreeMap<String, Versioned<Player>> = BTreeMap::new();
        for (_, player_id) in completed.participants() {
            match store.get::<Player>(player_id)? {
                Some(player) => {
                    players.insert(player_id.to_string(), player);
                }
                None => warn!(player_id, "participant not found, skipping"),
            }
        }

        let ratings_of = |side: Side| -> Vec<f64> {
            completed
                .roster(side)
                .iter()
                .map(|id| {
                    players
                        .get(id)
                        .map(|p| p.data.rating.current_or(self.config.default_rating))
                        .unwrap_or(self.config.default_rating)
                })
                .collect()
        };
        let team_a = ratings_of(Side::TeamA);
        let team_b = ratings_of(Side::TeamB);
        let rated = elo::rate_match(&self.config, &team_a, &team_b, completed.won(Side::TeamA));

        let labels: BTreeMap<String, String> = completed
            .participants()
            .map(|(_, id)| {
                let label = players
                    .get(id)
                    .map(|p| p.data.display_label().to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                (id.to_string(), label)
            })
            .collect();

        let now = Utc::now();
        let context = MatchContext {
            completed: &completed,
            rated: &rated,
            team_a: &team_a,
            team_b: &team_b,
            labels: &labels,
            at: now,
        };

        let mut tx = Transaction::new();
        let mut updates = BTreeMap::new();
        for (side, player_id) in completed.participants() {
            let Some(player) = players.get_mut(player_id) else {
                continue;
            };
            let update = self.apply_to_player(&mut player.data, side, &context);
            tx.save(player)?;
            tx.create(&RatingHistoryEntry {
                id: RatingHistoryEntry::entry_id(player_id, &completed.id),
                player_id: player_id.to_string(),
                match_id: completed.id.clone(),
                old_rating: update.previous,
                new_rating: update.new,
                delta: update.delta,
                opponent_label: context.opponent_label(side),
                won: completed.won(side),
                timestamp: now,
            })?;
            updates.insert(player_id.to_string(), update);
        }

        let rated_players = updates.len();
        stored.data.mark_rating_processed(updates, now);
        tx.save(&stored)?;

        let next = MatchRatingProcessed {
            match_id: completed.id.clone(),
        }
        .message()
        .map_err(|e| StageError::Encode(e.to_string()))?;
        tx.send(queues::HEAD_TO_HEAD, next);

        let receipt = store.commit(tx)?;
        info!(
            players = rated_players,
            team_a_rating = rated.team_a_rating,
            team_b_rating = rated.team_b_rating,
            team_a_delta = rated.team_a_delta,
            "match rated"
        );

        Ok(StageOutcome::Applied {
            documents: receipt.documents,
            messages: receipt.messages,
        })
    }

    /// Fold the match into one participant's profile and stats.
    fn apply_to_player(&self, player: &mut Player, side: Side, ctx: &MatchContext<'_>) -> RatingUpdate {
        let completed = ctx.completed;
        let won = completed.won(side);
        let delta = match side {
            Side::TeamA => ctx.rated.team_a_delta,
            Side::TeamB => ctx.rated.team_b_delta,
        };
        let previous = player.rating.current_or(self.config.default_rating);
        let new = previous + delta;

        player.rating.apply(previous, new, ctx.at);
        if won {
            player.wins += 1;
        } else {
            player.losses += 1;
        }
        player.current_streak = elo::next_streak(player.current_streak, won);
        player.recent_match_ids.retain(|id| id != &completed.id);
        player.recent_match_ids.insert(0, completed.id.clone());
        player.recent_match_ids.truncate(self.config.recent_history_len);

        if won {
            let opponent_team_rating = ctx.team_rating(side.opponent());
            let beats_best = player
                .best_win
                .as_ref()
                .map_or(true, |best| opponent_team_rating > best.opponent_team_rating);
            if beats_best {
                player.best_win = Some(BestWin {
                    match_id: completed.id.clone(),
                    match_title: completed.title.clone(),
                    opponent_team_rating,
                    opponent_team_avg_rating: elo::average(ctx.member_ratings(side.opponent())),
                    opponent_names: ctx.opponent_label(side),
                    rating_gained: delta,
                    achieved_at: ctx.at,
                });
            }
        }

        let scored = u64::from(completed.points(side));
        let allowed = u64::from(completed.points(side.opponent()));
        for teammate in completed.teammates(side, &player.id) {
            let stats = player.teammate_stats.entry(teammate.to_string()).or_default();
            stats.teammate_name = ctx.label(teammate).to_string();
            stats.played += 1;
            if won {
                stats.won += 1;
            } else {
                stats.lost += 1;
            }
            stats.points_scored += scored;
            stats.points_allowed += allowed;
            stats.rating_change += delta;
            stats.last_updated = Some(ctx.at);
        }

        for set in &completed.sets {
            if set.winner == side {
                player.point_stats.won_sets += 1;
                player.point_stats.won_sets_differential += set.differential(side);
            } else {
                player.point_stats.lost_sets += 1;
                player.point_stats.lost_sets_differential += set.differential(side);
            }
        }

        RatingUpdate {
            previous,
            new,
            delta,
        }
    }
}

/// Per-match values shared by every participant's update.
struct MatchContext<'a> {
    completed: &'a CompletedMatch,
    rated: &'a MatchRating,
    team_a: &'a [f64],
    team_b: &'a [f64],
    labels: &'a BTreeMap<String, String>,
    at: DateTime<Utc>,
}

impl MatchContext<'_> {
    fn team_rating(&self, side: Side) -> f64 {
        match side {
            Side::TeamA => self.rated.team_a_rating,
            Side::TeamB => self.rated.team_b_rating,
        }
    }

    fn member_ratings(&self, side: Side) -> &[f64] {
        match side {
            Side::TeamA => self.team_a,
            Side::TeamB => self.team_b,
        }
    }

    fn label(&self, player_id: &str) -> &str {
        self.labels.get(player_id).map(String::as_str).unwrap_or("Unknown")
    }

    /// Display names of the side opposing `side`, joined with " & ".
    fn opponent_label(&self, side: Side) -> String {
        self.completed
            .roster(side.opponent())
            .iter()
            .map(|id| self.label(id))
            .collect::<Vec<_>>()
            .join(" & ")
    }
}
