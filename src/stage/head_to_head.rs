//! Stage 2: pairwise head-to-head records for every cross-team pair.
//!
//! The cross product of the two rosters is folded into one [`PairBatch`] that
//! commits together with the match's h2h marker. A pair whose players cannot
//! both be resolved is skipped; the rest of the batch still commits.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn};

use crate::bus::Message;
use crate::config::RatingConfig;
use crate::events::{queues, HeadToHeadChanged, MatchRatingProcessed};
use crate::model::{CompletedMatch, HeadToHeadRecord, Match, Player, RecentMatchup, Side};
use crate::service::StageError;
use crate::store::{DocumentStore, StoreError, Transaction, Versioned};

use super::{retry_on_conflict, SkipReason, StageOutcome};

/// A cross-team pair that was left out of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPair {
    pub team_a_player: String,
    pub team_b_player: String,
    pub unresolved: Vec<String>,
}

/// Directional records staged for one match.
#[derive(Debug, Default)]
pub struct PairBatch {
    records: BTreeMap<(String, String), Versioned<HeadToHeadRecord>>,
    skipped: Vec<SkippedPair>,
}

impl PairBatch {
    /// Build the batch: load or create both directions of every resolvable pair
    /// and fold the match into them.
    pub fn build<S: DocumentStore>(
        store: &S,
        completed: &CompletedMatch,
        players: &BTreeMap<String, Player>,
        rating_changes: &BTreeMap<String, f64>,
        recent_len: usize,
        at: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let mut batch = Self::default();

        for a in &completed.team_a {
            for b in &completed.team_b {
                let unresolved: Vec<String> = [a, b]
                    .into_iter()
                    .filter(|id| !players.contains_key(id.as_str()))
                    .cloned()
                    .collect();
                if !unresolved.is_empty() {
                    warn!(team_a_player = %a, team_b_player = %b, ?unresolved, "skipping pair");
                    batch.skipped.push(SkippedPair {
                        team_a_player: a.clone(),
                        team_b_player: b.clone(),
                        unresolved,
                    });
                    continue;
                }

                for (owner, opponent, side) in [(a, b, Side::TeamA), (b, a, Side::TeamB)] {
                    let mut record = store
                        .get::<HeadToHeadRecord>(&HeadToHeadRecord::record_id(owner, opponent))?
                        .unwrap_or_else(|| Versioned::fresh(HeadToHeadRecord::new(owner.as_str(), opponent.as_str())));

                    let matchup = RecentMatchup {
                        match_id: completed.id.clone(),
                        won: completed.won(side),
                        points_scored: completed.points(side),
                        points_allowed: completed.points(side.opponent()),
                        rating_change: rating_changes.get(owner).copied().unwrap_or(0.0),
                        partner_ids: completed.teammates(side, owner).map(str::to_string).collect(),
                        opponent_partner_ids: completed
                            .teammates(side.opponent(), opponent)
                            .map(str::to_string)
                            .collect(),
                        played_at: at,
                    };
                    let opponent_name = players
                        .get(opponent.as_str())
                        .map(Player::display_label)
                        .unwrap_or("Unknown");
                    record.data.record(matchup, opponent_name, recent_len);

                    batch.records.insert((owner.clone(), opponent.clone()), record);
                }
            }
        }

        Ok(batch)
    }

    /// Number of directional records staged.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedPair] {
        &self.skipped
    }

    /// Owners with at least one staged record, in id order.
    pub fn owners(&self) -> BTreeSet<&str> {
        self.records.keys().map(|(owner, _)| owner.as_str()).collect()
    }

    pub fn record(&self, owner: &str, opponent: &str) -> Option<&HeadToHeadRecord> {
        self.records
            .get(&(owner.to_string(), opponent.to_string()))
            .map(|v| &v.data)
    }

    /// Stage every record into `tx`.
    pub fn stage(&self, tx: &mut Transaction) -> Result<(), StoreError> {
        for record in self.records.values() {
            tx.save(record)?;
        }
        Ok(())
    }
}

/// Aggregates pairwise records for rated matches.
#[derive(Debug, Clone)]
pub struct HeadToHeadStage {
    recent_len: usize,
    max_commit_attempts: u32,
}

impl HeadToHeadStage {
    pub fn new(config: &RatingConfig, max_commit_attempts: u32) -> Self {
        Self {
            recent_len: config.recent_history_len,
            max_commit_attempts: max_commit_attempts.max(1),
        }
    }

    /// Handle a `match.rating_processed` message.
    pub fn handle_message<S: DocumentStore>(
        &self,
        store: &S,
        message: &Message,
    ) -> Result<StageOutcome, StageError> {
        let signal: MatchRatingProcessed = message.decode()?;
        self.process(store, &signal.match_id)
    }

    pub fn process<S: DocumentStore>(
        &self,
        store: &S,
        match_id: &str,
    ) -> Result<StageOutcome, StageError> {
        let span = info_span!("head_to_head", match_id = %match_id);
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
        if stored.data.h2h_processed {
            return Ok(StageOutcome::Skipped(SkipReason::AlreadyProcessed));
        }
        if !stored.data.rating_processed {
            warn!("match not rated yet");
            return Ok(StageOutcome::Skipped(SkipReason::NotReady));
        }

        let completed = match CompletedMatch::try_from(&stored.data) {
            Ok(completed) => completed,
            Err(err) if err.is_malformed() => {
                warn!(error = %err, "declining malformed match");
                return Ok(StageOutcome::Skipped(SkipReason::Malformed(err)));
            }
            Err(err) => return Err(err.into()),
        };

        let mut players = BTreeMap::new();
        for (_, player_id) in completed.participants() {
            if let Some(player) = store.get::<Player>(player_id)? {
                players.insert(player_id.to_string(), player.data);
            }
        }
        let rating_changes: BTreeMap<String, f64> = stored
            .data
            .rating_updates
            .iter()
            .map(|(id, update)| (id.clone(), update.delta))
            .collect();

        let now = Utc::now();
        let batch = PairBatch::build(
            store,
            &completed,
            &players,
            &rating_changes,
            self.recent_len,
            now,
        )?;

        let mut tx = Transaction::new();
        batch.stage(&mut tx)?;
        for owner in batch.owners() {
            let changed = HeadToHeadChanged {
                owner_id: owner.to_string(),
                match_id: completed.id.clone(),
            }
            .message()
            .map_err(|e| StageError::Encode(e.to_string()))?;
            tx.send(queues::NEMESIS, changed);
        }
        stored.data.mark_h2h_processed(now);
        tx.save(&stored)?;

        let receipt = store.commit(tx)?;
        info!(
            records = batch.len(),
            skipped_pairs = batch.skipped().len(),
            "head-to-head updated"
        );

        Ok(StageOutcome::Applied {
            documents: receipt.documents,
            messages: receipt.messages,
        })
    }
}
