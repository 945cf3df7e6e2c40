// Integration tests for squadmatch, driven end to end over the in-memory
// gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use squadmatch::config::MatchingSettings;
use squadmatch::core::{
    AttemptOutcome, EngineWorker, GameAssembler, GroupStateManager, MatchIntentStore,
    MatchingEngine,
};
use squadmatch::error::MatchError;
use squadmatch::models::{
    Game, Group, GroupId, MatchCriteria, MatchIntent, MatchRequest, Player, UserId, UserStatus,
};
use squadmatch::services::{
    GroupAdministration, MemoryGateway, PersistenceGateway, RecordingNotifier, StorageError,
};

struct Harness {
    gateway: Arc<MemoryGateway>,
    notifier: Arc<RecordingNotifier>,
    manager: Arc<GroupStateManager>,
    engine: Arc<MatchingEngine>,
    worker: Option<EngineWorker>,
}

fn harness() -> Harness {
    let gateway = Arc::new(MemoryGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let store = Arc::new(MatchIntentStore::new(gateway.clone()));
    let manager = Arc::new(GroupStateManager::new(
        gateway.clone(),
        store.clone(),
        notifier.clone(),
        gateway.clone(),
    ));
    let assembler = GameAssembler::new(gateway.clone());
    let (engine, worker) = MatchingEngine::new(
        store,
        manager.clone(),
        assembler,
        gateway.clone(),
        MatchingSettings::default(),
    );

    Harness {
        gateway,
        notifier,
        manager,
        engine,
        worker: Some(worker),
    }
}

fn seed_group(h: &Harness, id: GroupId, members: &[UserId], club_id: Option<i64>) {
    let named: Vec<(UserId, String)> = members
        .iter()
        .map(|m| (*m, format!("user{}", m)))
        .collect();
    let borrowed: Vec<(UserId, &str)> = named.iter().map(|(id, n)| (*id, n.as_str())).collect();
    h.gateway.insert_group(
        Group {
            id,
            master_id: members[0],
            member_ids: members.to_vec(),
            club_id,
        },
        &borrowed,
    );
}

fn request(sport: &str, is_club: bool) -> MatchRequest {
    MatchRequest {
        sport: sport.to_string(),
        latitude: 37.5665,
        longitude: 126.9780,
        start_slots: vec!["1830".to_string()],
        preferred_venue: None,
        is_club_matching: is_club,
    }
}

async fn pending_intent(h: &Harness, group_id: GroupId) -> MatchIntent {
    h.gateway
        .pending_intents()
        .into_iter()
        .find(|i| i.group_id == group_id)
        .unwrap_or_else(|| panic!("no pending intent for group {}", group_id))
}

#[tokio::test]
async fn test_open_match_fills_two_basketball_rosters() {
    let h = harness();
    // Headcounts 2, 3, 4 and 1 against a roster of 5: the oldest viable
    // split is {3, 2} versus {4, 1}.
    seed_group(&h, 1, &[10, 11], None);
    seed_group(&h, 2, &[20, 21, 22], None);
    seed_group(&h, 3, &[30, 31, 32, 33], None);
    seed_group(&h, 4, &[40], None);

    for leader in [10, 20, 30, 40] {
        h.engine
            .submit(&request("basketball", false), leader, 5)
            .await
            .unwrap();
    }
    assert_eq!(h.gateway.pending_intents().len(), 4);

    let intent = pending_intent(&h, 4).await;
    let outcome = h.engine.run_attempt(&intent, 3).await.unwrap();
    let AttemptOutcome::Matched(game) = outcome else {
        panic!("expected a match");
    };

    assert_eq!(game.teams.len(), 2);
    for team in &game.teams {
        assert_eq!(team.user_ids.len(), 5);
        assert!(team.club_id.is_none());
    }
    assert!(game.venue.is_none());

    // Every consumed intent is gone, every participant is gaming and every
    // matched group is disbanded.
    assert!(h.gateway.pending_intents().is_empty());
    for user in [10, 11, 20, 21, 22, 30, 31, 32, 33, 40] {
        assert_eq!(h.gateway.player_status(user), Some(UserStatus::Gaming));
    }
    for group in [1, 2, 3, 4] {
        assert!(!h.gateway.group_exists(group));
    }
    assert_eq!(h.notifier.events().len(), 10);
}

#[tokio::test]
async fn test_attempt_without_opponent_stays_pending() {
    let h = harness();
    seed_group(&h, 1, &[10, 11], None);

    h.engine
        .submit(&request("badminton", false), 10, 5)
        .await
        .unwrap();

    let intent = pending_intent(&h, 1).await;
    let outcome = h.engine.run_attempt(&intent, 3).await.unwrap();
    assert!(matches!(outcome, AttemptOutcome::Pending));
    assert_eq!(h.gateway.pending_intents().len(), 1);
    assert_eq!(h.gateway.player_status(10), Some(UserStatus::Matching));
}

#[tokio::test]
async fn test_club_match_pairs_two_oldest_clubs_and_resolves_venue() {
    let h = harness();
    seed_group(&h, 1, &[10, 11, 12, 13, 14], Some(100));
    seed_group(&h, 2, &[20, 21, 22, 23, 24], Some(200));
    seed_group(&h, 3, &[30, 31, 32, 33, 34], Some(300));

    for (leader, venue) in [(10, "west gym"), (20, "east gym"), (30, "north gym")] {
        let mut req = request("basketball", true);
        req.preferred_venue = Some(venue.to_string());
        h.engine.submit(&req, leader, 5).await.unwrap();
    }

    let intent = pending_intent(&h, 3).await;
    let outcome = h.engine.run_attempt(&intent, 3).await.unwrap();
    let AttemptOutcome::Matched(game) = outcome else {
        panic!("expected a match");
    };

    // First-fit over submission order: clubs 100 and 200 pair up and the
    // latecomer keeps waiting.
    assert_eq!(game.teams[0].club_id, Some(100));
    assert_eq!(game.teams[0].leader_id, Some(10));
    assert_eq!(game.teams[1].club_id, Some(200));
    assert_eq!(game.teams[1].leader_id, Some(20));

    // Club games skip venue voting; the first candidate wins outright.
    let venue = game.venue.as_ref().unwrap();
    assert_eq!(venue.name, "west gym");
    assert_eq!(game.venue_candidates.len(), 2);

    assert_eq!(h.gateway.pending_intents().len(), 1);
    assert_eq!(h.gateway.player_status(30), Some(UserStatus::Matching));
}

#[tokio::test]
async fn test_worker_matches_fire_and_forget_submissions() {
    let mut h = harness();
    seed_group(&h, 1, &[10, 11], None);
    seed_group(&h, 2, &[20, 21], None);

    let worker = h.worker.take().unwrap();
    tokio::spawn(worker.run());

    h.engine
        .submit(&request("badminton", false), 10, 5)
        .await
        .unwrap();
    h.engine
        .submit(&request("badminton", false), 20, 5)
        .await
        .unwrap();

    // The submissions are acknowledged immediately; the match lands on a
    // background task.
    let game = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(game) = h.gateway.games().into_iter().next() {
                return game;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let mut players = game.user_ids();
    players.sort_unstable();
    assert_eq!(players, vec![10, 11, 20, 21]);
    assert!(h.gateway.pending_intents().is_empty());
}

#[tokio::test]
async fn test_attempt_probes_slots_in_order() {
    let h = harness();
    seed_group(&h, 1, &[10, 11], None);
    seed_group(&h, 2, &[20, 21], None);

    let mut early_and_late = request("badminton", false);
    early_and_late.start_slots = vec!["0900".to_string(), "1830".to_string()];
    h.engine.submit(&early_and_late, 10, 5).await.unwrap();
    h.engine
        .submit(&request("badminton", false), 20, 5)
        .await
        .unwrap();

    // Nobody else accepts 0900; the attempt moves on and lands on 1830.
    let intent = pending_intent(&h, 1).await;
    let outcome = h.engine.run_attempt(&intent, 3).await.unwrap();
    let AttemptOutcome::Matched(game) = outcome else {
        panic!("expected a match on the second slot");
    };
    assert_eq!(game.start_time.format("%H%M").to_string(), "1830");
}

#[tokio::test]
async fn test_cancel_restores_waiting_and_is_idempotent() {
    let h = harness();
    seed_group(&h, 1, &[10, 11], None);

    h.engine
        .submit(&request("badminton", false), 10, 5)
        .await
        .unwrap();
    assert_eq!(h.gateway.player_status(11), Some(UserStatus::Matching));

    h.manager.cancel_matching(10).await.unwrap();
    assert!(h.gateway.pending_intents().is_empty());
    assert_eq!(h.gateway.player_status(10), Some(UserStatus::Waiting));
    assert_eq!(h.gateway.player_status(11), Some(UserStatus::Waiting));
    assert!(h.gateway.group_exists(1));

    // Cancelling again without a pending intent is a no-op.
    h.manager.cancel_matching(10).await.unwrap();
}

#[tokio::test]
async fn test_cancel_by_sole_member_disbands_group() {
    let h = harness();
    seed_group(&h, 1, &[10], None);

    h.engine
        .submit(&request("badminton", false), 10, 5)
        .await
        .unwrap();
    h.manager.cancel_matching(10).await.unwrap();

    assert!(!h.gateway.group_exists(1));
    assert_eq!(h.gateway.player_status(10), Some(UserStatus::Waiting));
    assert!(matches!(
        h.manager.cancel_matching(10).await,
        Err(MatchError::NoActiveGroup(10))
    ));
}

#[tokio::test]
async fn test_storage_outage_aborts_attempt_and_keeps_intents() {
    let h = harness();
    seed_group(&h, 1, &[10, 11], None);
    seed_group(&h, 2, &[20, 21], None);

    h.engine
        .submit(&request("badminton", false), 10, 5)
        .await
        .unwrap();
    h.engine
        .submit(&request("badminton", false), 20, 5)
        .await
        .unwrap();

    let intent = pending_intent(&h, 2).await;
    h.gateway.set_unavailable(true);
    let result = h.engine.run_attempt(&intent, 3).await;
    assert!(matches!(result, Err(MatchError::StorageUnavailable(_))));

    h.gateway.set_unavailable(false);
    assert_eq!(h.gateway.pending_intents().len(), 2);
    assert!(h.gateway.games().is_empty());

    // The surviving intents are still matchable.
    let outcome = h.engine.run_attempt(&intent, 3).await.unwrap();
    assert!(matches!(outcome, AttemptOutcome::Matched(_)));
}

/// Gateway that can be armed to refuse exactly the match commit while
/// every other operation keeps working, so a failure lands mid-attempt
/// after candidates were already found.
struct FlakyCommitGateway {
    inner: MemoryGateway,
    fail_commit: AtomicBool,
}

impl FlakyCommitGateway {
    fn new() -> Self {
        Self {
            inner: MemoryGateway::new(),
            fail_commit: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PersistenceGateway for FlakyCommitGateway {
    async fn save_intent(&self, intent: &MatchIntent) -> Result<(), StorageError> {
        self.inner.save_intent(intent).await
    }

    async fn delete_intent_by_group_location(
        &self,
        group_id: GroupId,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, StorageError> {
        self.inner
            .delete_intent_by_group_location(group_id, latitude, longitude)
            .await
    }

    async fn find_intent_by_group(
        &self,
        group_id: GroupId,
    ) -> Result<Option<MatchIntent>, StorageError> {
        self.inner.find_intent_by_group(group_id).await
    }

    async fn find_intents_matching(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<MatchIntent>, StorageError> {
        self.inner.find_intents_matching(criteria).await
    }

    async fn commit_match(
        &self,
        game: &Game,
        consumed: &[MatchIntent],
    ) -> Result<bool, StorageError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("commit refused".to_string()));
        }
        self.inner.commit_match(game, consumed).await
    }

    async fn find_group_by_id(&self, group_id: GroupId) -> Result<Option<Group>, StorageError> {
        self.inner.find_group_by_id(group_id).await
    }

    async fn find_group_by_member(&self, user_id: UserId) -> Result<Option<Group>, StorageError> {
        self.inner.find_group_by_member(user_id).await
    }

    async fn find_users_in_group(&self, group_id: GroupId) -> Result<Vec<Player>, StorageError> {
        self.inner.find_users_in_group(group_id).await
    }

    async fn update_statuses(
        &self,
        user_ids: &[UserId],
        status: UserStatus,
    ) -> Result<(), StorageError> {
        self.inner.update_statuses(user_ids, status).await
    }
}

#[async_trait]
impl GroupAdministration for FlakyCommitGateway {
    async fn disband(&self, group_id: GroupId) -> Result<(), StorageError> {
        self.inner.disband(group_id).await
    }
}

#[tokio::test]
async fn test_failed_commit_keeps_intents_matchable() {
    let gateway = Arc::new(FlakyCommitGateway::new());
    let store = Arc::new(MatchIntentStore::new(gateway.clone()));
    let manager = Arc::new(GroupStateManager::new(
        gateway.clone(),
        store.clone(),
        Arc::new(RecordingNotifier::new()),
        gateway.clone(),
    ));
    let assembler = GameAssembler::new(gateway.clone());
    let (engine, _worker) = MatchingEngine::new(
        store,
        manager,
        assembler,
        gateway.clone(),
        MatchingSettings::default(),
    );

    for (id, members) in [(1, vec![10, 11]), (2, vec![20, 21])] {
        let named: Vec<(UserId, String)> = members
            .iter()
            .map(|m| (*m, format!("user{}", m)))
            .collect();
        let borrowed: Vec<(UserId, &str)> =
            named.iter().map(|(id, n)| (*id, n.as_str())).collect();
        gateway.inner.insert_group(
            Group {
                id,
                master_id: members[0],
                member_ids: members,
                club_id: None,
            },
            &borrowed,
        );
    }

    engine
        .submit(&request("badminton", false), 10, 5)
        .await
        .unwrap();
    engine
        .submit(&request("badminton", false), 20, 5)
        .await
        .unwrap();

    let intent = gateway
        .inner
        .pending_intents()
        .into_iter()
        .find(|i| i.group_id == 2)
        .unwrap();

    // The failure hits after both sides were found, right at the commit.
    gateway.fail_commit.store(true, Ordering::SeqCst);
    let result = engine.run_attempt(&intent, 3).await;
    assert!(matches!(result, Err(MatchError::StorageUnavailable(_))));

    // Nothing was consumed: both intents survive, no game exists and
    // everyone still counts as matching.
    assert_eq!(gateway.inner.pending_intents().len(), 2);
    assert!(gateway.inner.games().is_empty());
    for user in [10, 11, 20, 21] {
        assert_eq!(
            gateway.inner.player_status(user),
            Some(UserStatus::Matching)
        );
    }

    // Once storage recovers, a retry of the same attempt succeeds.
    gateway.fail_commit.store(false, Ordering::SeqCst);
    let outcome = engine.run_attempt(&intent, 3).await.unwrap();
    assert!(matches!(outcome, AttemptOutcome::Matched(_)));
    assert!(gateway.inner.pending_intents().is_empty());
    for user in [10, 11, 20, 21] {
        assert_eq!(gateway.inner.player_status(user), Some(UserStatus::Gaming));
    }
}

#[tokio::test]
async fn test_cancel_races_attempt_without_splitting_state() {
    for _ in 0..50 {
        let h = harness();
        seed_group(&h, 1, &[10, 11], None);
        seed_group(&h, 2, &[20, 21], None);

        h.engine
            .submit(&request("badminton", false), 10, 5)
            .await
            .unwrap();
        h.engine
            .submit(&request("badminton", false), 20, 5)
            .await
            .unwrap();

        let intent = pending_intent(&h, 2).await;
        let engine = h.engine.clone();
        let manager = h.manager.clone();

        let attempt = tokio::spawn(async move { engine.run_attempt(&intent, 3).await });
        let cancel = tokio::spawn(async move { manager.cancel_matching(10).await });

        attempt.await.unwrap().unwrap();
        // A late cancel sees its group already disbanded by the match.
        match cancel.await.unwrap() {
            Ok(()) | Err(MatchError::NoActiveGroup(_)) => {}
            Err(e) => panic!("unexpected cancel failure: {}", e),
        }

        let games = h.gateway.games();
        if let Some(game) = games.first() {
            // The attempt won; the cancel arrived late and was a no-op.
            let mut players = game.user_ids();
            players.sort_unstable();
            assert_eq!(players, vec![10, 11, 20, 21]);
            for user in [10, 11, 20, 21] {
                assert_eq!(h.gateway.player_status(user), Some(UserStatus::Gaming));
            }
        } else {
            // The cancel won; nobody was matched and group 1 is waiting
            // again while group 2 stays in the pool.
            assert_eq!(h.gateway.player_status(10), Some(UserStatus::Waiting));
            assert_eq!(h.gateway.player_status(11), Some(UserStatus::Waiting));
            assert_eq!(h.gateway.player_status(20), Some(UserStatus::Matching));
            assert_eq!(h.gateway.pending_intents().len(), 1);
        }
    }
}

#[tokio::test]
async fn test_non_leader_cannot_submit_or_cancel() {
    let h = harness();
    seed_group(&h, 1, &[10, 11], None);

    assert!(matches!(
        h.engine.submit(&request("badminton", false), 11, 5).await,
        Err(MatchError::NotLeader)
    ));

    h.engine
        .submit(&request("badminton", false), 10, 5)
        .await
        .unwrap();
    assert!(matches!(
        h.manager.cancel_matching(11).await,
        Err(MatchError::NotLeader)
    ));
}
