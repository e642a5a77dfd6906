// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use hearth_auth::{
    Action, Decision, InvitationError, InvitationRequest, MembershipTree, PostingIdentity,
    RoleCapacity, lifecycle, membership, roles, topics,
};
use hearth_core::{
    CapabilitySet, GroupContext, GroupId, InvitationId, MemberId, Role, RoleId, Scope,
    SubgroupId, Timestamp, Topic, TopicId, TopicStatus, Transition,
};
use hearth_store::{GroupStore, GroupWriter, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{Cache, Snapshot};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fetch::{Fetched, fetch_context};
use crate::session::Session;

/// Resolves membership and access for the groups held by a store.
///
/// Queries are answered from a per-group cache of the fetched records and the views derived from
/// them. State changes are computed against freshly fetched records and applied inside a store
/// transaction, only one state change per group runs at a time.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    config: EngineConfig,
    cache: Cache,
    writers: Mutex<HashMap<GroupId, Arc<Mutex<()>>>>,
}

impl<S, E> Engine<S>
where
    S: GroupStore<Error = E> + GroupWriter<Error = E> + Transaction<Error = E>,
    E: Error + 'static,
{
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            cache: Cache::new(),
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens a session navigating between the scopes of a group.
    pub fn session(&self, group_id: &GroupId) -> Session<'_, S> {
        Session::new(&self.store, group_id.clone())
    }

    /// Drops everything cached for a group, the next query fetches it again.
    pub async fn refresh(&self, group_id: &GroupId) {
        debug!(group = %group_id, "refresh");
        self.cache.drop_group(group_id).await;
    }

    /// Returns the records of a group, fetching them when they are not cached.
    pub async fn context(&self, group_id: &GroupId) -> Result<Arc<GroupContext>, EngineError<E>> {
        Ok(self.snapshot(group_id).await?.context)
    }

    /// Returns the cached context of a group, fetching it when it is not cached.
    ///
    /// A cached context is moved forward to the current time once one of its role assignments
    /// ran out.
    async fn snapshot(&self, group_id: &GroupId) -> Result<Snapshot, EngineError<E>> {
        if let Some(snapshot) = self.cache.snapshot(group_id).await {
            let now = Timestamp::now();
            if snapshot.context.next_expiry().is_some_and(|expiry| expiry <= now) {
                return Ok(self.cache.advance(group_id, snapshot, now).await);
            }
            return Ok(snapshot);
        }

        let generation = self.cache.generation(group_id).await;
        let fetched = fetch_context(&self.store, group_id).await?;
        Ok(self.cache.fill(group_id, fetched.context, generation).await)
    }

    // Queries

    /// Members of a subgroup, or of the whole group for `None`, nested by parent/kid pairing.
    pub async fn resolve_membership(
        &self,
        group_id: &GroupId,
        subgroup_id: Option<&SubgroupId>,
    ) -> Result<Arc<MembershipTree>, EngineError<E>> {
        let key = subgroup_id.cloned();
        if let Some(tree) = self
            .cache
            .view(group_id, |views| views.membership.get(&key).cloned())
            .await
        {
            return Ok(tree);
        }

        let snapshot = self.snapshot(group_id).await?;
        let tree = Arc::new(membership::resolve(&snapshot.context, subgroup_id));
        self.cache
            .store_view(group_id, snapshot.generation, |views| {
                views.membership.insert(key, tree.clone());
            })
            .await;
        Ok(tree)
    }

    /// Capabilities a member has in a scope, empty for members unknown to the group.
    pub async fn resolve_capabilities(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        scope: &Scope,
    ) -> Result<CapabilitySet, EngineError<E>> {
        // Taking the snapshot first drops capabilities outdated by expired assignments.
        let snapshot = self.snapshot(group_id).await?;
        let key = (member_id.clone(), scope.clone());
        if let Some(capabilities) = self
            .cache
            .view(group_id, |views| views.capabilities.get(&key).cloned())
            .await
        {
            return Ok(capabilities);
        }

        let y = &snapshot.context;
        let capabilities = match y.member(member_id) {
            Some(member) => roles::effective_capabilities(y, &self.config.policy, member, scope),
            None => CapabilitySet::empty(),
        };
        self.cache
            .store_view(group_id, snapshot.generation, |views| {
                views.capabilities.insert(key, capabilities.clone());
            })
            .await;
        Ok(capabilities)
    }

    /// Topics visible in a scope, local topics first.
    pub async fn resolve_visible_topics(
        &self,
        group_id: &GroupId,
        scope: &Scope,
    ) -> Result<Arc<Vec<Topic>>, EngineError<E>> {
        if let Some(topics) = self
            .cache
            .view(group_id, |views| views.visible_topics.get(scope).cloned())
            .await
        {
            return Ok(topics);
        }

        let snapshot = self.snapshot(group_id).await?;
        let visible: Vec<Topic> = topics::visible_topics(&snapshot.context.topics, scope)
            .into_iter()
            .cloned()
            .collect();
        let visible = Arc::new(visible);
        self.cache
            .store_view(group_id, snapshot.generation, |views| {
                views.visible_topics.insert(scope.clone(), visible.clone());
            })
            .await;
        Ok(visible)
    }

    pub async fn role_capacity(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
    ) -> Result<RoleCapacity, EngineError<E>> {
        if let Some(capacity) = self
            .cache
            .view(group_id, |views| views.role_capacity.get(role_id).copied())
            .await
        {
            return Ok(capacity);
        }

        let snapshot = self.snapshot(group_id).await?;
        let capacity = roles::role_capacity(&snapshot.context, role_id)?;
        self.cache
            .store_view(group_id, snapshot.generation, |views| {
                views.role_capacity.insert(role_id.clone(), capacity);
            })
            .await;
        Ok(capacity)
    }

    pub async fn authorize(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        action: Action,
        scope: &Scope,
    ) -> Result<Decision, EngineError<E>> {
        let y = self.context(group_id).await?;
        Ok(hearth_auth::authorize(
            &y,
            &self.config.policy,
            member_id,
            action,
            scope,
        ))
    }

    pub async fn authorize_post(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        topic_id: &TopicId,
        scope: &Scope,
    ) -> Result<Decision, EngineError<E>> {
        let y = self.context(group_id).await?;
        Ok(hearth_auth::authorize_post(
            &y,
            &self.config.policy,
            member_id,
            topic_id,
            scope,
        ))
    }

    pub async fn posting_identity(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        scope: &Scope,
    ) -> Result<PostingIdentity, EngineError<E>> {
        let y = self.context(group_id).await?;
        Ok(hearth_auth::posting_identity(&y, member_id, scope)?)
    }

    // Roles

    pub async fn assign_member_to_role(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
        member_id: &MemberId,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| Ok(roles::assign_member(y, role_id, member_id)?))
            .await
    }

    pub async fn remove_member_from_role(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
        member_id: &MemberId,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| Ok(roles::remove_member(y, role_id, member_id)))
            .await
    }

    pub async fn assign_role_to_subgroup(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
        subgroup_id: &SubgroupId,
        notes: Option<String>,
        expires_at: Option<Timestamp>,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| {
            Ok(roles::assign_to_subgroup(
                y,
                role_id,
                subgroup_id,
                notes,
                expires_at,
            )?)
        })
        .await
    }

    pub async fn update_role_assignment(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
        subgroup_id: &SubgroupId,
        notes: Option<String>,
        expires_at: Option<Timestamp>,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| {
            Ok(roles::update_assignment(
                y,
                role_id,
                subgroup_id,
                notes,
                expires_at,
            )?)
        })
        .await
    }

    pub async fn remove_role_from_subgroup(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
        subgroup_id: &SubgroupId,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| {
            Ok(roles::remove_from_subgroup(y, role_id, subgroup_id))
        })
        .await
    }

    pub async fn create_role(&self, group_id: &GroupId, role: Role) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, config| {
            Ok(roles::create_role(y, &config.policy, role)?)
        })
        .await
    }

    pub async fn update_role(&self, group_id: &GroupId, role: Role) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, config| {
            Ok(roles::update_role(y, &config.policy, role)?)
        })
        .await
    }

    /// Deletes a role, releasing every member and subgroup it is assigned to.
    pub async fn delete_role(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| Ok(roles::delete_role(y, role_id)?))
            .await
    }

    // Topics

    pub async fn create_topic(
        &self,
        group_id: &GroupId,
        topic: Topic,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| Ok(topics::create_topic(y, topic)?))
            .await
    }

    pub async fn set_topic_global_audience(
        &self,
        group_id: &GroupId,
        topic_id: &TopicId,
        is_global: bool,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| {
            Ok(topics::set_global_audience(y, topic_id, is_global)?)
        })
        .await
    }

    pub async fn set_topic_status(
        &self,
        group_id: &GroupId,
        topic_id: &TopicId,
        status: TopicStatus,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| {
            Ok(topics::set_topic_status(y, topic_id, status)?)
        })
        .await
    }

    // Invitations

    pub async fn invite(
        &self,
        group_id: &GroupId,
        request: InvitationRequest,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, config| {
            Ok(lifecycle::invite(y, request, config.invitation_lifetime)?)
        })
        .await
    }

    /// Accepts a pending invitation and adds the invited account as member.
    ///
    /// Accepting an invitation which ran out marks all expired invitations of the group as
    /// such before the error is returned.
    pub async fn accept_invitation(
        &self,
        group_id: &GroupId,
        invitation_id: &InvitationId,
    ) -> Result<(), EngineError<E>> {
        let result = self
            .mutate(group_id, |y, _| Ok(lifecycle::accept(y, invitation_id)?))
            .await;

        if let Err(EngineError::Invitation(InvitationError::Expired(_))) = &result {
            self.expire_invitations(group_id).await?;
        }

        result
    }

    pub async fn reject_invitation(
        &self,
        group_id: &GroupId,
        invitation_id: &InvitationId,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| Ok(lifecycle::reject(y, invitation_id)?))
            .await
    }

    pub async fn expire_invitations(&self, group_id: &GroupId) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| Ok(lifecycle::expire_invitations(y)))
            .await
    }

    pub async fn leave_group(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<(), EngineError<E>> {
        self.mutate(group_id, |y, _| Ok(lifecycle::leave(y, member_id)))
            .await
    }

    // Processing

    async fn writer(&self, group_id: &GroupId) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().await;
        writers.entry(group_id.clone()).or_default().clone()
    }

    /// Computes a state transition against the current records of a group and applies it.
    ///
    /// Holds the writer lock of the group from fetching the records until the cache reflects the
    /// applied changes, checks and writes can not interleave with another state change. Repairs of
    /// malformed records found while fetching are written in the same transaction.
    async fn mutate<F>(&self, group_id: &GroupId, f: F) -> Result<(), EngineError<E>>
    where
        F: FnOnce(&GroupContext, &EngineConfig) -> Result<Transition, EngineError<E>>,
    {
        let writer = self.writer(group_id).await;
        let _guard = writer.lock().await;

        let Fetched {
            context: mut y,
            repairs,
        } = fetch_context(&self.store, group_id).await?;
        let transition = f(&y, &self.config)?;
        if transition.is_empty() {
            return Ok(());
        }
        let transition: Transition = repairs
            .into_iter()
            .chain(transition.changes().iter().cloned())
            .collect();

        self.commit(group_id, &transition).await?;

        for change in transition.changes() {
            y.apply(change)?;
        }
        self.cache
            .replace(group_id, y, transition.invalidates())
            .await;

        debug!(
            group = %group_id,
            changes = transition.changes().len(),
            "applied state transition"
        );

        Ok(())
    }

    /// Writes all changes of a transition inside one store transaction.
    async fn commit(
        &self,
        group_id: &GroupId,
        transition: &Transition,
    ) -> Result<(), EngineError<E>> {
        let permit = self.store.begin().await.map_err(EngineError::Store)?;

        for change in transition.changes() {
            if let Err(err) = self.store.apply(group_id, change).await {
                debug!(group = %group_id, ?change, %err, "write failed, rolling back");
                if let Err(rollback_err) = self.store.rollback(permit).await {
                    warn!(group = %group_id, %rollback_err, "rollback failed");
                    // The cached context may no longer match the store.
                    self.cache.drop_group(group_id).await;
                }
                return Err(EngineError::Store(err));
            }
        }

        self.store.commit(permit).await.map_err(EngineError::Store)
    }
}
