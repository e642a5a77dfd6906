// SPDX-License-Identifier: MIT OR Apache-2.0

//! Navigating between the main group and its subgroups.
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use hearth_auth::{MembershipTree, membership, visible_topics};
use hearth_core::{GroupId, Scope, Topic};
use hearth_store::GroupStore;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{EngineError, Input};
use crate::fetch::{normalize_members, normalize_topics, tagged};

/// Identifies a context switch, later switches carry larger tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Members and topics of the scope a session switched to.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopedView {
    pub token: RequestToken,
    pub scope: Scope,
    pub members: MembershipTree,
    pub topics: Vec<Topic>,
}

/// Current scope of a user within a group.
///
/// Switching scopes refetches the scoped members and topics. When switches overlap only the
/// latest one is applied, the result of every earlier switch is discarded on arrival with
/// [`EngineError::StaleContext`].
#[derive(Debug)]
pub struct Session<'a, S> {
    store: &'a S,
    group_id: GroupId,
    latest: AtomicU64,
    in_flight: AtomicBool,
    current: RwLock<Option<ScopedView>>,
}

impl<'a, S> Session<'a, S>
where
    S: GroupStore,
    S::Error: 'static,
{
    pub fn new(store: &'a S, group_id: GroupId) -> Self {
        Self {
            store,
            group_id,
            latest: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            current: RwLock::new(None),
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Returns true while a switch is waiting for its records.
    pub fn is_switching(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the view applied by the latest completed switch.
    pub async fn current(&self) -> Option<ScopedView> {
        self.current.read().await.clone()
    }

    /// Switches to a scope and applies its members and topics.
    ///
    /// Returns [`EngineError::StaleContext`] when another switch was issued while this one was
    /// fetching, callers are expected to drop that error silently.
    pub async fn switch_to(&self, scope: Scope) -> Result<ScopedView, EngineError<S::Error>> {
        let token = RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1);
        self.in_flight.store(true, Ordering::SeqCst);
        debug!(group = %self.group_id, %scope, %token, "switch context");

        let fetched = self.fetch(&scope).await;

        let mut current = self.current.write().await;
        if self.latest.load(Ordering::SeqCst) != token.0 {
            debug!(group = %self.group_id, %scope, %token, "drop stale context");
            return Err(EngineError::StaleContext);
        }
        self.in_flight.store(false, Ordering::SeqCst);

        let (members, topics) = fetched?;
        let view = ScopedView {
            token,
            scope,
            members,
            topics,
        };
        *current = Some(view.clone());
        Ok(view)
    }

    async fn fetch(
        &self,
        scope: &Scope,
    ) -> Result<(MembershipTree, Vec<Topic>), EngineError<S::Error>> {
        let group_id = &self.group_id;
        let subgroup_id = scope.subgroup_id();

        // Subgroup scopes also see the global-audience topics of the main group.
        let subgroup_topics = async {
            match subgroup_id {
                Some(id) => {
                    let input = Input::Topics(Some(id.clone()));
                    tagged(input, self.store.topics(group_id, Some(id))).await
                }
                None => Ok(Vec::new()),
            }
        };

        let (accounts, mut members, main_topics, subgroup_topics) = tokio::try_join!(
            tagged(Input::Accounts, self.store.accounts(group_id)),
            tagged(
                Input::Members(subgroup_id.cloned()),
                self.store.members(group_id, subgroup_id)
            ),
            tagged(Input::Topics(None), self.store.topics(group_id, None)),
            subgroup_topics,
        )?;

        // Repairs are left to the next state change, sessions only read.
        let mut topics = main_topics;
        topics.extend(subgroup_topics);
        normalize_topics(&mut topics);
        let visible = visible_topics(&topics, scope).into_iter().cloned().collect();

        normalize_members(&accounts, &mut members);
        Ok((membership::pair_members(&accounts, &members), visible))
    }
}
