//! Stage 3: recompute a player's nemesis from their head-to-head records.

use tracing::{info, info_span, warn};

use crate::bus::Message;
use crate::config::NemesisConfig;
use crate::events::HeadToHeadChanged;
use crate::model::{HeadToHeadRecord, NemesisDesignation, Player};
use crate::service::StageError;
use crate::store::{DocumentStore, Transaction};

use super::{retry_on_conflict, SkipReason, StageOutcome};

/// Pick the nemesis among a player's records.
///
/// Candidates have played at least `min_matches` and have a win rate strictly
/// below `max_win_rate_percent`. The candidate with the most losses wins, then
/// the one with the most matches played, then the lowest opponent id.
pub fn select_nemesis(
    records: &[HeadToHeadRecord],
    config: &NemesisConfig,
) -> Option<NemesisDesignation> {
    records
        .iter()
        .filter(|r| r.played >= config.min_matches)
        .filter(|r| u64::from(r.won) * 100 < u64::from(config.max_win_rate_percent) * u64::from(r.played))
        .min_by(|x, y| {
            y.lost
                .cmp(&x.lost)
                .then_with(|| y.played.cmp(&x.played))
                .then_with(|| x.opponent_id.cmp(&y.opponent_id))
        })
        .map(|r| NemesisDesignation {
            opponent_id: r.opponent_id.clone(),
            opponent_name: r.opponent_name.clone(),
            matches_won: r.won,
            matches_lost: r.lost,
            matches_played: r.played,
            win_rate_percent: r.win_rate_percent(),
        })
}

/// Keeps each player's nemesis designation current.
#[derive(Debug, Clone)]
pub struct NemesisStage {
    config: NemesisConfig,
    max_commit_attempts: u32,
}

impl NemesisStage {
    pub fn new(config: NemesisConfig, max_commit_attempts: u32) -> Self {
        Self {
            config,
            max_commit_attempts: max_commit_attempts.max(1),
        }
    }

    /// Handle a `head_to_head.changed` message.
    pub fn handle_message<S: DocumentStore>(
        &self,
        store: &S,
        message: &Message,
    ) -> Result<StageOutcome, StageError> {
        let signal: HeadToHeadChanged = message.decode()?;
        self.process(store, &signal.owner_id)
    }

    pub fn process<S: DocumentStore>(
        &self,
        store: &S,
        player_id: &str,
    ) -> Result<StageOutcome, StageError> {
        let span = info_span!("nemesis", player_id = %player_id);
        let _guard = span.enter();

        retry_on_conflict(self.max_commit_attempts, || self.attempt(store, player_id))
    }

    fn attempt<S: DocumentStore>(
        &self,
        store: &S,
        player_id: &str,
    ) -> Result<StageOutcome, StageError> {
        let Some(mut player) = store.get::<Player>(player_id)? else {
            warn!("player not found");
            return Ok(StageOutcome::Skipped(SkipReason::PlayerNotFound));
        };

        let records: Vec<HeadToHeadRecord> = store
            .scan::<HeadToHeadRecord>(&HeadToHeadRecord::record_id(player_id, ""))?
            .into_iter()
            .map(|v| v.data)
            .filter(|r| r.owner_id == player_id)
            .collect();
        let nemesis = select_nemesis(&records, &self.config);

        if nemesis == player.data.nemesis {
            return Ok(StageOutcome::Skipped(SkipReason::Unchanged));
        }

        match &nemesis {
            Some(n) => info!(
                opponent_id = %n.opponent_id,
                lost = n.matches_lost,
                played = n.matches_played,
                "nemesis designated"
            ),
            None => info!("nemesis cleared"),
        }
        player.data.nemesis = nemesis;

        let mut tx = Transaction::new();
        tx.save(&player)?;
        let receipt = store.commit(tx)?;

        Ok(StageOutcome::Applied {
            documents: receipt.documents,
            messages: receipt.messages,
        })
    }
}
