// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::ids::{AccountId, InvitationId, MemberId, RoleId, SubgroupId, TopicId};

/// Reference to a record by kind and id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    Account(AccountId),
    Member(MemberId),
    Role(RoleId),
    RoleAssignment(RoleId, SubgroupId),
    Subgroup(SubgroupId),
    Topic(TopicId),
    Invitation(InvitationId),
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Account(id) => write!(f, "account {id}"),
            Entity::Member(id) => write!(f, "member {id}"),
            Entity::Role(id) => write!(f, "role {id}"),
            Entity::RoleAssignment(role_id, subgroup_id) => {
                write!(f, "assignment of role {role_id} to subgroup {subgroup_id}")
            }
            Entity::Subgroup(id) => write!(f, "subgroup {id}"),
            Entity::Topic(id) => write!(f, "topic {id}"),
            Entity::Invitation(id) => write!(f, "invitation {id}"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown {0}")]
pub struct UnknownEntity(pub Entity);
