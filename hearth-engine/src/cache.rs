// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-group cache of fetched contexts and the views derived from them.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use hearth_auth::{MembershipTree, RoleCapacity};
use hearth_core::{
    CapabilitySet, DerivedView, GroupContext, GroupId, MemberId, RoleId, Scope, SubgroupId,
    Timestamp, Topic,
};
use tokio::sync::RwLock;
use tracing::trace;

/// Views derived from the cached context of a group.
#[derive(Debug, Default)]
pub(crate) struct Views {
    pub membership: HashMap<Option<SubgroupId>, Arc<MembershipTree>>,
    pub visible_topics: HashMap<Scope, Arc<Vec<Topic>>>,
    pub capabilities: HashMap<(MemberId, Scope), CapabilitySet>,
    pub role_capacity: HashMap<RoleId, RoleCapacity>,
}

impl Views {
    fn invalidate(&mut self, view: DerivedView) {
        match view {
            DerivedView::Membership => self.membership.clear(),
            DerivedView::VisibleTopics => self.visible_topics.clear(),
            DerivedView::Capabilities => self.capabilities.clear(),
            DerivedView::RoleCapacity => self.role_capacity.clear(),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    /// Bumped every time the context is replaced or dropped.
    generation: u64,
    context: Option<Arc<GroupContext>>,
    views: Views,
}

/// Snapshot of a group context together with the generation it was cached under.
#[derive(Clone, Debug)]
pub(crate) struct Snapshot {
    pub context: Arc<GroupContext>,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Cache {
    groups: RwLock<HashMap<GroupId, Entry>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached context of a group, if any.
    pub async fn snapshot(&self, group_id: &GroupId) -> Option<Snapshot> {
        let groups = self.groups.read().await;
        let entry = groups.get(group_id)?;
        entry.context.as_ref().map(|context| Snapshot {
            context: context.clone(),
            generation: entry.generation,
        })
    }

    pub async fn generation(&self, group_id: &GroupId) -> u64 {
        let groups = self.groups.read().await;
        groups.get(group_id).map_or(0, |entry| entry.generation)
    }

    /// Caches a freshly fetched context.
    ///
    /// The context is discarded when the group changed since `generation` was read, the returned
    /// snapshot is then not backed by the cache.
    pub async fn fill(
        &self,
        group_id: &GroupId,
        context: GroupContext,
        generation: u64,
    ) -> Snapshot {
        let context = Arc::new(context);
        let mut groups = self.groups.write().await;
        let entry = groups.entry(group_id.clone()).or_default();
        if entry.generation == generation && entry.context.is_none() {
            trace!(group = %group_id, generation, "cache group context");
            entry.context = Some(context.clone());
        }
        Snapshot {
            context,
            generation,
        }
    }

    /// Replaces the context of a group after a state transition, dropping the invalidated views.
    pub async fn replace(
        &self,
        group_id: &GroupId,
        context: GroupContext,
        invalidates: &BTreeSet<DerivedView>,
    ) {
        let mut groups = self.groups.write().await;
        let entry = groups.entry(group_id.clone()).or_default();
        entry.generation += 1;
        entry.context = Some(Arc::new(context));
        for view in invalidates {
            entry.views.invalidate(*view);
        }
        trace!(
            group = %group_id,
            generation = entry.generation,
            ?invalidates,
            "replace group context"
        );
    }

    /// Moves the cached context of a group forward in time, dropping capability views.
    ///
    /// When the group changed since `snapshot` was read the advanced context is returned without
    /// being cached.
    pub async fn advance(
        &self,
        group_id: &GroupId,
        snapshot: Snapshot,
        now: Timestamp,
    ) -> Snapshot {
        let mut context = GroupContext::clone(&snapshot.context);
        context.as_of = now;
        let context = Arc::new(context);

        let mut groups = self.groups.write().await;
        match groups.get_mut(group_id) {
            Some(entry) if entry.generation == snapshot.generation => {
                entry.generation += 1;
                entry.context = Some(context.clone());
                entry.views.invalidate(DerivedView::Capabilities);
                trace!(
                    group = %group_id,
                    %now,
                    generation = entry.generation,
                    "advance group context"
                );
                Snapshot {
                    context,
                    generation: entry.generation,
                }
            }
            _ => Snapshot {
                context,
                generation: snapshot.generation,
            },
        }
    }

    /// Drops the context and all views of a group.
    pub async fn drop_group(&self, group_id: &GroupId) {
        let mut groups = self.groups.write().await;
        let entry = groups.entry(group_id.clone()).or_default();
        entry.generation += 1;
        entry.context = None;
        entry.views = Views::default();
        trace!(group = %group_id, generation = entry.generation, "drop group context");
    }

    /// Looks up a derived view.
    pub async fn view<T>(
        &self,
        group_id: &GroupId,
        f: impl FnOnce(&Views) -> Option<T>,
    ) -> Option<T> {
        let groups = self.groups.read().await;
        f(&groups.get(group_id)?.views)
    }

    /// Stores a derived view computed from the snapshot of `generation`.
    ///
    /// Views computed from an outdated snapshot are not stored.
    pub async fn store_view(
        &self,
        group_id: &GroupId,
        generation: u64,
        f: impl FnOnce(&mut Views),
    ) {
        let mut groups = self.groups.write().await;
        if let Some(entry) = groups.get_mut(group_id) {
            if entry.generation == generation && entry.context.is_some() {
                f(&mut entry.views);
            }
        }
    }
}
