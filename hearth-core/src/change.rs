// SPDX-License-Identifier: MIT OR Apache-2.0

//! Writes produced by state transitions.
//!
//! Transitions never touch storage directly. They return a [`Transition`]: the ordered list of
//! [`Change`]s a store has to apply atomically, together with the derived views those changes
//! make stale.
use std::collections::BTreeSet;

use crate::ids::{InvitationId, MemberId, RoleId, SubgroupId, TopicId};
use crate::invitation::{Invitation, InvitationStatus};
use crate::member::Member;
use crate::role::{Role, RoleAssignment};
use crate::topic::Topic;

/// A single write against one group's records.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Change {
    SetMemberRole {
        member_id: MemberId,
        role_id: Option<RoleId>,
    },

    /// Insert a role-to-subgroup assignment or replace the one for the same pair.
    SetRoleAssignment(RoleAssignment),

    ClearRoleAssignment {
        role_id: RoleId,
        subgroup_id: SubgroupId,
    },

    SetTopicGlobalAudience {
        topic_id: TopicId,
        is_global: bool,
    },

    PutRole(Role),

    RemoveRole(RoleId),

    PutTopic(Topic),

    PutMember(Member),

    RemoveMember(MemberId),

    PutInvitation(Invitation),

    SetInvitationStatus {
        invitation_id: InvitationId,
        status: InvitationStatus,
    },
}

impl Change {
    /// Derived views which can not be trusted anymore once this change is applied.
    pub fn invalidates(&self) -> &'static [DerivedView] {
        match self {
            Change::SetMemberRole { .. } => &[
                DerivedView::Membership,
                DerivedView::Capabilities,
                DerivedView::RoleCapacity,
            ],
            Change::PutRole(_) | Change::RemoveRole(_) => {
                &[DerivedView::Capabilities, DerivedView::RoleCapacity]
            }
            Change::SetRoleAssignment(_) | Change::ClearRoleAssignment { .. } => {
                &[DerivedView::Capabilities]
            }
            Change::SetTopicGlobalAudience { .. } | Change::PutTopic(_) => {
                &[DerivedView::VisibleTopics]
            }
            Change::PutMember(_) | Change::RemoveMember(_) => &[
                DerivedView::Membership,
                DerivedView::Capabilities,
                DerivedView::RoleCapacity,
            ],
            Change::PutInvitation(_) | Change::SetInvitationStatus { .. } => &[],
        }
    }
}

/// Cached results computed from a group's records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DerivedView {
    Membership,
    VisibleTopics,
    Capabilities,
    RoleCapacity,
}

/// Ordered writes of one state transition plus the views they invalidate.
///
/// An empty transition is a valid result and means the operation was a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transition {
    changes: Vec<Change>,
    invalidates: BTreeSet<DerivedView>,
}

impl Transition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.invalidates.extend(change.invalidates().iter().copied());
        self.changes.push(change);
    }

    pub fn with(mut self, change: Change) -> Self {
        self.push(change);
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn invalidates(&self) -> &BTreeSet<DerivedView> {
        &self.invalidates
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl FromIterator<Change> for Transition {
    fn from_iter<T: IntoIterator<Item = Change>>(iter: T) -> Self {
        let mut transition = Transition::new();
        for change in iter {
            transition.push(change);
        }
        transition
    }
}
