use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::intents::MatchIntentStore;
use crate::error::MatchError;
use crate::models::{Group, GroupId, NotificationKind, Sport, UserId, UserStatus};
use crate::services::{GroupAdministration, NotificationGateway, PersistenceGateway};

/// Drives group and user status transitions.
///
/// A group's members always move together: WAITING -> MATCHING when the
/// leader starts matching, back to WAITING on cancel, MATCHING -> GAMING
/// when a game is assembled. Check-then-set sequences run under one
/// transition lock so a concurrent reader never observes a split group.
pub struct GroupStateManager {
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<MatchIntentStore>,
    notifier: Arc<dyn NotificationGateway>,
    admin: Arc<dyn GroupAdministration>,
    transition: Mutex<()>,
}

impl GroupStateManager {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<MatchIntentStore>,
        notifier: Arc<dyn NotificationGateway>,
        admin: Arc<dyn GroupAdministration>,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
            admin,
            transition: Mutex::new(()),
        }
    }

    /// Resolve the group a user belongs to.
    pub async fn group_of(&self, user_id: UserId) -> Result<Group, MatchError> {
        self.gateway
            .find_group_by_member(user_id)
            .await?
            .ok_or(MatchError::NoActiveGroup(user_id))
    }

    /// Validate a matching request and flip every member to MATCHING.
    ///
    /// Club matching needs at least a full roster in the group; open
    /// matching needs the group to fit inside one team.
    pub async fn begin_matching(
        &self,
        group_id: GroupId,
        requester_id: UserId,
        sport: Sport,
        is_club_matching: bool,
    ) -> Result<Group, MatchError> {
        let _guard = self.transition.lock().await;

        let group = self
            .gateway
            .find_group_by_id(group_id)
            .await?
            .ok_or(MatchError::GroupNotFound(group_id))?;

        if group.master_id != requester_id {
            return Err(MatchError::NotLeader);
        }

        let roster = sport.roster_size();
        let headcount = group.member_count();
        let fits = if is_club_matching {
            headcount >= roster
        } else {
            headcount <= roster
        };
        if !fits {
            return Err(MatchError::InvalidHeadcount {
                actual: headcount,
                roster,
            });
        }

        let players = self.gateway.find_users_in_group(group_id).await?;
        if let Some(busy) = players.iter().find(|p| p.status != UserStatus::Waiting) {
            return Err(MatchError::MemberNotWaiting(busy.id));
        }

        self.gateway
            .update_statuses(&group.member_ids, UserStatus::Matching)
            .await?;

        tracing::info!(
            "Group {} started {} matching for {:?} with {} members",
            group_id,
            if is_club_matching { "club" } else { "open" },
            sport,
            headcount
        );

        Ok(group)
    }

    /// Roll a group back to WAITING, e.g. when intent registration fails
    /// after the members were already flipped to MATCHING.
    pub async fn revert_to_waiting(&self, group: &Group) -> Result<(), MatchError> {
        self.gateway
            .update_statuses(&group.member_ids, UserStatus::Waiting)
            .await?;
        Ok(())
    }

    /// Cancel the caller's pending matching.
    ///
    /// Only the leader may cancel. Removes the intent under the sport's
    /// bucket lock so an in-flight attempt cannot consume it concurrently,
    /// restores every member to WAITING and disbands the group when it has
    /// exactly one member. A second cancel while the group still exists is
    /// a no-op.
    pub async fn cancel_matching(&self, user_id: UserId) -> Result<(), MatchError> {
        let _guard = self.transition.lock().await;

        let group = self
            .gateway
            .find_group_by_member(user_id)
            .await?
            .ok_or(MatchError::NoActiveGroup(user_id))?;

        if group.master_id != user_id {
            return Err(MatchError::NotLeader);
        }

        let Some(intent) = self.store.find_by_group(group.id).await? else {
            tracing::debug!("Group {} has no pending intent; cancel is a no-op", group.id);
            return Ok(());
        };

        let _bucket = self.store.lock_bucket(intent.sport).await;

        // Re-check under the bucket lock: an attempt may have consumed the
        // intent between the lookup and the lock.
        let Some(intent) = self.store.find_by_group(group.id).await? else {
            return Ok(());
        };

        self.store.remove(&intent).await?;
        self.gateway
            .update_statuses(&group.member_ids, UserStatus::Waiting)
            .await?;

        let players = self.gateway.find_users_in_group(group.id).await?;
        for player in &players {
            if let Err(e) = self
                .notifier
                .notify(&player.nickname, NotificationKind::MatchCancelled)
                .await
            {
                tracing::warn!("Failed to notify {} of cancellation: {}", player.nickname, e);
            }
        }

        if group.member_ids.len() == 1 {
            self.admin.disband(group.id).await?;
        }

        tracing::info!("Group {} cancelled matching", group.id);

        Ok(())
    }

    /// Flip every member of every listed group to GAMING and dispatch a
    /// matched notification per user. Notification failures are logged and
    /// never roll back the transition.
    pub async fn promote_to_gaming(&self, group_ids: &[GroupId]) -> Result<(), MatchError> {
        for &group_id in group_ids {
            let players = self.gateway.find_users_in_group(group_id).await?;
            let ids: Vec<UserId> = players.iter().map(|p| p.id).collect();

            self.gateway
                .update_statuses(&ids, UserStatus::Gaming)
                .await?;

            for player in &players {
                if let Err(e) = self
                    .notifier
                    .notify(&player.nickname, NotificationKind::Matched)
                    .await
                {
                    tracing::warn!("Failed to notify {} of match: {}", player.nickname, e);
                }
            }
        }
        Ok(())
    }
}
