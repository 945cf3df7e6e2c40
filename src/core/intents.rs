use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::compat::is_compatible;
use crate::error::MatchError;
use crate::models::{Game, GroupId, MatchCriteria, MatchIntent, Sport};
use crate::services::PersistenceGateway;

/// Owner of the pending matching intents.
///
/// Wraps the persistence gateway with the one-intent-per-group rule, the
/// fine-grained compatibility filter and per-sport bucket locks. An
/// attempt's find-then-commit sequence and a cancellation's removal both
/// run under the same sport's lock, so two contending attempts can never
/// consume overlapping intents.
pub struct MatchIntentStore {
    gateway: Arc<dyn PersistenceGateway>,
    buckets: StdMutex<HashMap<Sport, Arc<Mutex<()>>>>,
}

impl MatchIntentStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            buckets: StdMutex::new(HashMap::new()),
        }
    }

    /// Acquire the critical-section lock for a sport's bucket.
    pub async fn lock_bucket(&self, sport: Sport) -> OwnedMutexGuard<()> {
        let lock = {
            let mut buckets = self.buckets.lock().unwrap();
            Arc::clone(
                buckets
                    .entry(sport)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Register a pending intent. A group holds at most one at a time.
    pub async fn put(&self, intent: &MatchIntent) -> Result<(), MatchError> {
        if self
            .gateway
            .find_intent_by_group(intent.group_id)
            .await?
            .is_some()
        {
            return Err(MatchError::DuplicateIntent(intent.group_id));
        }

        self.gateway.save_intent(intent).await?;
        Ok(())
    }

    /// Atomically consume the matched intents, persist their game and flip
    /// every participant to GAMING. Returns `false`, with nothing changed,
    /// when a consumed intent has already left the pool.
    pub async fn commit_match(
        &self,
        game: &Game,
        consumed: &[MatchIntent],
    ) -> Result<bool, MatchError> {
        Ok(self.gateway.commit_match(game, consumed).await?)
    }

    /// Remove an intent. Idempotent; returns whether anything was removed.
    pub async fn remove(&self, intent: &MatchIntent) -> Result<bool, MatchError> {
        Ok(self
            .gateway
            .delete_intent_by_group_location(intent.group_id, intent.latitude, intent.longitude)
            .await?)
    }

    pub async fn find_by_group(
        &self,
        group_id: GroupId,
    ) -> Result<Option<MatchIntent>, MatchError> {
        Ok(self.gateway.find_intent_by_group(group_id).await?)
    }

    /// All pending intents compatible with the criteria, oldest first.
    pub async fn find_compatible(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<MatchIntent>, MatchError> {
        let candidates = self.gateway.find_intents_matching(criteria).await?;
        let total = candidates.len();

        let compatible: Vec<MatchIntent> = candidates
            .into_iter()
            .filter(|intent| is_compatible(intent, criteria))
            .collect();

        tracing::debug!(
            "Compatibility scan for {:?} slot {}: {} of {} candidates",
            criteria.sport,
            criteria.slot,
            compatible.len(),
            total
        );

        Ok(compatible)
    }
}
