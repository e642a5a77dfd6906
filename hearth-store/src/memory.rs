// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store for group records.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hearth_core::{
    Account, AccountId, Change, GroupContext, GroupId, Invitation, InvitationId,
    InvitationStatus, Member, MemberId, Role, RoleAssignment, RoleId, Subgroup, SubgroupId,
    Timestamp, Topic, TopicId, UnknownEntity,
};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::trace;

use crate::traits::{GroupStore, GroupWriter, Transaction};

#[derive(Debug, Error, PartialEq)]
pub enum MemoryStoreError {
    #[error("unknown group: {0}")]
    UnknownGroup(GroupId),

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntity),

    #[error("write rejected by store")]
    WriteRejected,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    groups: HashMap<GroupId, GroupContext>,

    /// Groups as they were before their first write in the open transaction.
    undo: Option<HashMap<GroupId, GroupContext>>,
}

/// In-memory store.
///
/// This does not persist data permanently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// Transactions are serialised: `begin` waits until the previous transaction was committed or
/// rolled back. A rollback restores every group written while the permit was held to the state
/// it had before its first write, groups which were not written are left alone. Writes are not
/// tied to a permit, so a write to any group issued while a transaction is open is part of it.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
    transaction: Arc<Mutex<()>>,

    /// Number of writes which will still succeed, `usize::MAX` for no limit.
    write_budget: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStoreInner::default())),
            transaction: Arc::new(Mutex::new(())),
            write_budget: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Inserts or replaces all records of a group.
    pub async fn insert_group(&self, mut group: GroupContext) {
        group.as_of = Timestamp::default();
        let mut inner = self.inner.write().await;
        inner.groups.insert(group.group_id.clone(), group);
    }

    /// Returns a copy of all records of a group.
    pub async fn group(&self, group_id: &GroupId) -> Option<GroupContext> {
        let inner = self.inner.read().await;
        inner.groups.get(group_id).cloned()
    }

    /// Let the next `writes` writes succeed and reject every write after.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn fail_after(&self, writes: usize) {
        self.write_budget.store(writes, Ordering::SeqCst);
    }

    async fn read<T>(
        &self,
        group_id: &GroupId,
        f: impl FnOnce(&GroupContext) -> T,
    ) -> Result<T, MemoryStoreError> {
        let inner = self.inner.read().await;
        let group = inner
            .groups
            .get(group_id)
            .ok_or_else(|| MemoryStoreError::UnknownGroup(group_id.clone()))?;
        Ok(f(group))
    }

    async fn write(&self, group_id: &GroupId, change: Change) -> Result<(), MemoryStoreError> {
        let budget = self.write_budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            match n {
                usize::MAX => Some(n),
                0 => None,
                n => Some(n - 1),
            }
        });
        if budget.is_err() {
            return Err(MemoryStoreError::WriteRejected);
        }

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let group = inner
            .groups
            .get_mut(group_id)
            .ok_or_else(|| MemoryStoreError::UnknownGroup(group_id.clone()))?;
        if let Some(undo) = inner.undo.as_mut() {
            undo.entry(group_id.clone()).or_insert_with(|| group.clone());
        }
        group.apply(&change)?;

        trace!(group = %group_id, ?change, "write");
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn accounts(
        &self,
        group_id: &GroupId,
    ) -> Result<HashMap<AccountId, Account>, Self::Error> {
        self.read(group_id, |group| group.accounts.clone()).await
    }

    async fn members(
        &self,
        group_id: &GroupId,
        subgroup_id: Option<&SubgroupId>,
    ) -> Result<Vec<Member>, Self::Error> {
        self.read(group_id, |group| {
            group.members_in(subgroup_id).cloned().collect()
        })
        .await
    }

    async fn roles(&self, group_id: &GroupId) -> Result<Vec<Role>, Self::Error> {
        self.read(group_id, |group| group.roles.clone()).await
    }

    async fn subgroups(&self, group_id: &GroupId) -> Result<Vec<Subgroup>, Self::Error> {
        self.read(group_id, |group| group.subgroups.clone()).await
    }

    async fn topics(
        &self,
        group_id: &GroupId,
        subgroup_id: Option<&SubgroupId>,
    ) -> Result<Vec<Topic>, Self::Error> {
        self.read(group_id, |group| {
            group
                .topics
                .iter()
                .filter(|topic| topic.subgroup_id.as_ref() == subgroup_id)
                .cloned()
                .collect()
        })
        .await
    }

    async fn role_assignments(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<RoleAssignment>, Self::Error> {
        self.read(group_id, |group| group.role_assignments.clone())
            .await
    }

    async fn invitations(&self, group_id: &GroupId) -> Result<Vec<Invitation>, Self::Error> {
        self.read(group_id, |group| group.invitations.clone()).await
    }
}

impl GroupWriter for MemoryStore {
    type Error = MemoryStoreError;

    async fn set_member_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        role_id: Option<&RoleId>,
    ) -> Result<(), Self::Error> {
        let change = Change::SetMemberRole {
            member_id: member_id.clone(),
            role_id: role_id.cloned(),
        };
        self.write(group_id, change).await
    }

    async fn set_role_subgroup_assignment(
        &self,
        group_id: &GroupId,
        assignment: &RoleAssignment,
    ) -> Result<(), Self::Error> {
        let change = Change::SetRoleAssignment(assignment.clone());
        self.write(group_id, change).await
    }

    async fn clear_role_subgroup_assignment(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
        subgroup_id: &SubgroupId,
    ) -> Result<(), Self::Error> {
        let change = Change::ClearRoleAssignment {
            role_id: role_id.clone(),
            subgroup_id: subgroup_id.clone(),
        };
        self.write(group_id, change).await
    }

    async fn set_topic_global_audience(
        &self,
        group_id: &GroupId,
        topic_id: &TopicId,
        is_global: bool,
    ) -> Result<(), Self::Error> {
        let change = Change::SetTopicGlobalAudience {
            topic_id: topic_id.clone(),
            is_global,
        };
        self.write(group_id, change).await
    }

    async fn put_role(&self, group_id: &GroupId, role: &Role) -> Result<(), Self::Error> {
        self.write(group_id, Change::PutRole(role.clone())).await
    }

    async fn remove_role(&self, group_id: &GroupId, role_id: &RoleId) -> Result<(), Self::Error> {
        self.write(group_id, Change::RemoveRole(role_id.clone()))
            .await
    }

    async fn put_topic(&self, group_id: &GroupId, topic: &Topic) -> Result<(), Self::Error> {
        self.write(group_id, Change::PutTopic(topic.clone())).await
    }

    async fn put_member(&self, group_id: &GroupId, member: &Member) -> Result<(), Self::Error> {
        self.write(group_id, Change::PutMember(member.clone())).await
    }

    async fn remove_member(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<(), Self::Error> {
        self.write(group_id, Change::RemoveMember(member_id.clone()))
            .await
    }

    async fn put_invitation(
        &self,
        group_id: &GroupId,
        invitation: &Invitation,
    ) -> Result<(), Self::Error> {
        self.write(group_id, Change::PutInvitation(invitation.clone()))
            .await
    }

    async fn set_invitation_status(
        &self,
        group_id: &GroupId,
        invitation_id: &InvitationId,
        status: InvitationStatus,
    ) -> Result<(), Self::Error> {
        let change = Change::SetInvitationStatus {
            invitation_id: invitation_id.clone(),
            status,
        };
        self.write(group_id, change).await
    }
}

/// Held for the duration of a memory store transaction.
#[derive(Debug)]
pub struct MemoryPermit {
    _guard: OwnedMutexGuard<()>,
}

impl Transaction for MemoryStore {
    type Error = MemoryStoreError;

    type Permit = MemoryPermit;

    async fn begin(&self) -> Result<Self::Permit, Self::Error> {
        let guard = self.transaction.clone().lock_owned().await;
        self.inner.write().await.undo = Some(HashMap::new());
        Ok(MemoryPermit { _guard: guard })
    }

    async fn rollback(&self, permit: Self::Permit) -> Result<(), Self::Error> {
        let mut inner = self.inner.write().await;
        let undo = inner.undo.take().unwrap_or_default();
        trace!(groups = undo.len(), "rollback");
        inner.groups.extend(undo);
        drop(permit);
        Ok(())
    }

    async fn commit(&self, permit: Self::Permit) -> Result<(), Self::Error> {
        self.inner.write().await.undo = None;
        drop(permit);
        trace!("commit");
        Ok(())
    }
}
