// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership and access resolution for hearth community groups.
//!
//! Everything in this crate is a pure function over a [`GroupContext`](hearth_core::GroupContext)
//! snapshot. Queries never fail and degrade on malformed records. State changes return a
//! [`Transition`](hearth_core::Transition) describing the writes to apply, leaving storage and
//! atomicity to the caller.
pub mod gate;
pub mod identity;
pub mod lifecycle;
pub mod membership;
mod policy;
pub mod roles;
pub mod topics;

pub use gate::{Action, Author, Decision, DenyReason, UnknownAction, authorize, authorize_post};
pub use identity::{PostingIdentity, posting_identity};
pub use lifecycle::{InvitationError, InvitationRequest};
pub use membership::{MemberPair, MembershipTree, ResidualKind, ResidualMember};
pub use policy::Policy;
pub use roles::{RoleCapacity, RoleError, effective_capabilities};
pub use topics::{TopicError, visible_topics};
