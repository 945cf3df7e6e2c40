use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::config::MatchingSettings;
use crate::core::assembler::{dedup_venues, resolve_start_time, GameAssembler};
use crate::core::groups::GroupStateManager;
use crate::core::intents::MatchIntentStore;
use crate::core::subset::team_partition;
use crate::error::MatchError;
use crate::models::{
    Game, GroupId, MatchCriteria, MatchIntent, MatchRequest, Sport, UserId,
};
use crate::services::GroupAdministration;

/// Result of one matching attempt.
///
/// `Pending` is the expected steady state while the pool lacks an
/// opponent; the intent stays queryable for a later invocation.
#[derive(Debug)]
pub enum AttemptOutcome {
    Matched(Game),
    Pending,
}

/// A queued matching attempt.
#[derive(Debug)]
pub struct AttemptJob {
    pub intent: MatchIntent,
    pub rating_tolerance: i32,
}

/// The matchmaking engine.
///
/// `submit` registers a group's intent and queues a fire-and-forget
/// attempt; the submitter is acknowledged for the registration, never for
/// the match outcome. Attempts run as independent tasks spawned by the
/// [`EngineWorker`]; attempts contending for the same sport serialize
/// their find-then-commit sequence on the store's bucket lock.
pub struct MatchingEngine {
    store: Arc<MatchIntentStore>,
    groups: Arc<GroupStateManager>,
    assembler: GameAssembler,
    admin: Arc<dyn GroupAdministration>,
    settings: MatchingSettings,
    jobs: mpsc::Sender<AttemptJob>,
}

/// Consumes queued attempt jobs, spawning one task per attempt.
///
/// Kept separate from the engine so embedders decide where the loop runs
/// and tests can drive `run_attempt` directly instead.
pub struct EngineWorker {
    engine: Arc<MatchingEngine>,
    jobs: mpsc::Receiver<AttemptJob>,
}

impl MatchingEngine {
    pub fn new(
        store: Arc<MatchIntentStore>,
        groups: Arc<GroupStateManager>,
        assembler: GameAssembler,
        admin: Arc<dyn GroupAdministration>,
        settings: MatchingSettings,
    ) -> (Arc<Self>, EngineWorker) {
        let (tx, rx) = mpsc::channel(settings.queue_depth);

        let engine = Arc::new(Self {
            store,
            groups,
            assembler,
            admin,
            settings,
            jobs: tx,
        });

        let worker = EngineWorker {
            engine: Arc::clone(&engine),
            jobs: rx,
        };

        (engine, worker)
    }

    /// Register a group's matching intent and queue an attempt.
    ///
    /// Fails synchronously on leadership, headcount or status violations.
    /// If the intent cannot be persisted after the members were already
    /// flipped to MATCHING, the flip is rolled back.
    pub async fn submit(
        &self,
        request: &MatchRequest,
        user_id: UserId,
        rating: i32,
    ) -> Result<GroupId, MatchError> {
        let sport = Sport::from_name(&request.sport)
            .ok_or_else(|| MatchError::UnknownSport(request.sport.clone()))?;

        // A slot that cannot be parsed would otherwise surface only while
        // assembling a game, after intents were already consumed.
        for slot in &request.start_slots {
            resolve_start_time(slot)?;
        }

        let group = self.groups.group_of(user_id).await?;
        let group = self
            .groups
            .begin_matching(group.id, user_id, sport, request.is_club_matching)
            .await?;

        let intent = MatchIntent {
            group_id: group.id,
            sport,
            latitude: request.latitude,
            longitude: request.longitude,
            rating,
            user_count: group.member_count(),
            start_slots: request.start_slots.clone(),
            preferred_venue: request.preferred_venue.clone(),
            is_club_matching: request.is_club_matching,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.put(&intent).await {
            if let Err(revert) = self.groups.revert_to_waiting(&group).await {
                tracing::error!(
                    "Failed to revert group {} to waiting after rejected intent: {}",
                    group.id,
                    revert
                );
            }
            return Err(e);
        }

        let job = AttemptJob {
            intent,
            rating_tolerance: self.settings.rating_tolerance,
        };
        if let Err(e) = self.jobs.try_send(job) {
            // The intent stays pending; a later submission or an external
            // scheduler will pick it up.
            tracing::warn!(
                "Attempt queue full, group {} waits for a later scan: {}",
                group.id,
                e
            );
        }

        Ok(group.id)
    }

    /// Run one matching attempt over the intent's acceptable slots.
    ///
    /// At most one game is created per invocation; remaining slots are not
    /// probed once a pairing succeeds. Storage errors abort the attempt
    /// and leave the intent pending.
    pub async fn run_attempt(
        &self,
        intent: &MatchIntent,
        rating_tolerance: i32,
    ) -> Result<AttemptOutcome, MatchError> {
        for slot in &intent.start_slots {
            let _bucket = self.store.lock_bucket(intent.sport).await;

            let criteria = MatchCriteria {
                sport: intent.sport,
                slot: slot.clone(),
                rating: intent.rating,
                rating_tolerance,
                latitude: intent.latitude,
                longitude: intent.longitude,
                max_distance_km: self.settings.max_distance_km,
                is_club_matching: intent.is_club_matching,
            };

            let candidates = self.store.find_compatible(&criteria).await?;
            if candidates.len() < 2 {
                continue;
            }

            if intent.is_club_matching {
                // First-fit: the two oldest compatible clubs pair directly.
                let side1 = vec![candidates[0].clone()];
                let side2 = vec![candidates[1].clone()];
                let game = self.finalize(&side1, &side2, slot, intent.sport, true).await?;
                return Ok(AttemptOutcome::Matched(game));
            }

            let roster = intent.sport.roster_size();
            let Some((team1, rest)) = team_partition(&candidates, roster) else {
                continue;
            };
            let Some((team2, _)) = team_partition(&rest, roster) else {
                // No second team this slot; the pure partition left the
                // pool untouched, so just move on.
                continue;
            };

            let game = self.finalize(&team1, &team2, slot, intent.sport, false).await?;
            return Ok(AttemptOutcome::Matched(game));
        }

        Ok(AttemptOutcome::Pending)
    }

    /// Materialize the game and consume the matched intents.
    ///
    /// Runs under the caller-held bucket lock. The intents, the game and
    /// the GAMING statuses commit as one storage unit; a failed commit
    /// leaves every intent pending for a retry. A commit miss means the
    /// pool changed despite the lock; the attempt is discarded rather than
    /// assembling a game with missing participants.
    async fn finalize(
        &self,
        side1: &[MatchIntent],
        side2: &[MatchIntent],
        slot: &str,
        sport: Sport,
        is_club_matching: bool,
    ) -> Result<Game, MatchError> {
        let venues = dedup_venues(&[side1, side2]);
        let game = self
            .assembler
            .assemble(side1, side2, slot, sport, venues, is_club_matching)
            .await?;

        let consumed: Vec<MatchIntent> = side1
            .iter()
            .chain(side2.iter())
            .cloned()
            .collect();
        if !self.store.commit_match(&game, &consumed).await? {
            return Err(MatchError::InconsistentState);
        }

        let group_ids: Vec<GroupId> = consumed.iter().map(|i| i.group_id).collect();

        // The commit already flipped every participant to GAMING; a failure
        // here only costs the match notifications.
        if let Err(e) = self.groups.promote_to_gaming(&group_ids).await {
            tracing::warn!("Failed to notify matched groups {:?}: {}", group_ids, e);
        }

        for group_id in &group_ids {
            if let Err(e) = self.admin.disband(*group_id).await {
                tracing::warn!("Failed to disband group {}: {}", group_id, e);
            }
        }

        tracing::info!(
            "Matched {:?} game {} from groups {:?}",
            sport,
            game.id,
            group_ids
        );

        Ok(game)
    }
}

impl EngineWorker {
    /// Drain the attempt queue until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move {
                let group_id = job.intent.group_id;
                match engine.run_attempt(&job.intent, job.rating_tolerance).await {
                    Ok(AttemptOutcome::Matched(game)) => {
                        tracing::info!("Attempt for group {} produced game {}", group_id, game.id);
                    }
                    Ok(AttemptOutcome::Pending) => {
                        tracing::debug!("No opponent yet for group {}", group_id);
                    }
                    Err(e) => {
                        tracing::warn!("Attempt for group {} aborted: {}", group_id, e);
                    }
                }
            });
        }
    }
}
