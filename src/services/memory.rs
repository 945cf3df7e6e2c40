use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{Game, Group, GroupId, MatchCriteria, MatchIntent, Player, UserId, UserStatus};
use crate::services::gateway::{GroupAdministration, PersistenceGateway, StorageError};

#[derive(Default)]
struct Inner {
    groups: HashMap<GroupId, Group>,
    players: HashMap<UserId, Player>,
    intents: Vec<MatchIntent>,
    games: Vec<Game>,
}

/// In-memory persistence gateway.
///
/// Deterministic backend for unit and integration tests: intents keep
/// insertion order in a plain `Vec`, and every operation runs under one
/// lock so group transitions and game writes are trivially atomic. The
/// `set_unavailable` switch makes every call fail, for exercising the
/// engine's storage-abort path.
#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a group and its members, all in the waiting state.
    pub fn insert_group(&self, group: Group, nicknames: &[(UserId, &str)]) {
        let mut inner = self.inner.lock().unwrap();
        for (id, nickname) in nicknames {
            inner.players.insert(
                *id,
                Player {
                    id: *id,
                    nickname: nickname.to_string(),
                    status: UserStatus::Waiting,
                },
            );
        }
        inner.groups.insert(group.id, group);
    }

    /// Toggle simulated backend failure.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn games(&self) -> Vec<Game> {
        self.inner.lock().unwrap().games.clone()
    }

    pub fn pending_intents(&self) -> Vec<MatchIntent> {
        self.inner.lock().unwrap().intents.clone()
    }

    pub fn player_status(&self, user_id: UserId) -> Option<UserStatus> {
        self.inner
            .lock()
            .unwrap()
            .players
            .get(&user_id)
            .map(|p| p.status)
    }

    pub fn group_exists(&self, group_id: GroupId) -> bool {
        self.inner.lock().unwrap().groups.contains_key(&group_id)
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "memory gateway marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn save_intent(&self, intent: &MatchIntent) -> Result<(), StorageError> {
        self.check_available()?;
        self.inner.lock().unwrap().intents.push(intent.clone());
        Ok(())
    }

    async fn delete_intent_by_group_location(
        &self,
        group_id: GroupId,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, StorageError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.intents.len();
        inner.intents.retain(|i| {
            !(i.group_id == group_id
                && i.latitude.to_bits() == latitude.to_bits()
                && i.longitude.to_bits() == longitude.to_bits())
        });
        Ok(inner.intents.len() < before)
    }

    async fn find_intent_by_group(
        &self,
        group_id: GroupId,
    ) -> Result<Option<MatchIntent>, StorageError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .intents
            .iter()
            .find(|i| i.group_id == group_id)
            .cloned())
    }

    async fn find_intents_matching(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<MatchIntent>, StorageError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .intents
            .iter()
            .filter(|i| {
                i.sport == criteria.sport && i.is_club_matching == criteria.is_club_matching
            })
            .cloned()
            .collect())
    }

    async fn commit_match(
        &self,
        game: &Game,
        consumed: &[MatchIntent],
    ) -> Result<bool, StorageError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();

        let matches = |i: &MatchIntent, c: &MatchIntent| {
            i.group_id == c.group_id
                && i.latitude.to_bits() == c.latitude.to_bits()
                && i.longitude.to_bits() == c.longitude.to_bits()
        };

        // Verify before mutating so a miss leaves everything untouched.
        if !consumed
            .iter()
            .all(|c| inner.intents.iter().any(|i| matches(i, c)))
        {
            return Ok(false);
        }

        for c in consumed {
            inner.intents.retain(|i| !matches(i, c));
        }
        inner.games.push(game.clone());
        for id in game.user_ids() {
            if let Some(player) = inner.players.get_mut(&id) {
                player.status = UserStatus::Gaming;
            }
        }

        Ok(true)
    }

    async fn find_group_by_id(&self, group_id: GroupId) -> Result<Option<Group>, StorageError> {
        self.check_available()?;
        Ok(self.inner.lock().unwrap().groups.get(&group_id).cloned())
    }

    async fn find_group_by_member(&self, user_id: UserId) -> Result<Option<Group>, StorageError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .groups
            .values()
            .find(|g| g.member_ids.contains(&user_id))
            .cloned())
    }

    async fn find_users_in_group(&self, group_id: GroupId) -> Result<Vec<Player>, StorageError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        let group = inner
            .groups
            .get(&group_id)
            .ok_or_else(|| StorageError::Unavailable(format!("group {} not found", group_id)))?;
        Ok(group
            .member_ids
            .iter()
            .filter_map(|id| inner.players.get(id).cloned())
            .collect())
    }

    async fn update_statuses(
        &self,
        user_ids: &[UserId],
        status: UserStatus,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        for id in user_ids {
            if let Some(player) = inner.players.get_mut(id) {
                player.status = status;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GroupAdministration for MemoryGateway {
    async fn disband(&self, group_id: GroupId) -> Result<(), StorageError> {
        self.check_available()?;
        self.inner.lock().unwrap().groups.remove(&group_id);
        Ok(())
    }
}
