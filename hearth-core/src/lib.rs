// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed records of a hearth community group.
//!
//! Accounts are a closed set of kinds (adults, kids and parent shadow accounts supervising one
//! kid each). Members link accounts to a group, may be pinned to a subgroup and may hold one
//! capacity-limited custom role. A [`GroupContext`] bundles all records of one group into a
//! snapshot which the resolvers in `hearth-auth` operate on.
pub mod account;
pub mod change;
pub mod context;
pub mod entity;
pub mod ids;
pub mod invitation;
pub mod member;
pub mod role;
pub mod scope;
pub mod subgroup;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod topic;

pub use account::{
    Account, AccountError, AccountKind, InvalidKindReason, pair_kid_for, validate_member,
};
pub use change::{Change, DerivedView, Transition};
pub use context::GroupContext;
pub use entity::{Entity, UnknownEntity};
pub use ids::{
    AccountId, GroupId, InvitationId, MemberId, RoleId, SubgroupId, Timestamp, TopicId,
};
pub use invitation::{Invitation, InvitationStatus};
pub use member::{Member, MemberTier, ShadowAccess};
pub use role::{Capability, CapabilitySet, DEFAULT_MAX_ASSIGNEES, Role, RoleAssignment};
pub use scope::Scope;
pub use subgroup::Subgroup;
pub use topic::{PostingFlags, Topic, TopicStatus};
