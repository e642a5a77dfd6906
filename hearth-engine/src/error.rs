// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;
use std::fmt;

use hearth_auth::{InvitationError, RoleError, TopicError};
use hearth_core::{SubgroupId, UnknownEntity};
use thiserror::Error;

/// Record list requested from the store while assembling a group context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Accounts,
    Members(Option<SubgroupId>),
    Roles,
    Subgroups,
    Topics(Option<SubgroupId>),
    RoleAssignments,
    Invitations,
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Accounts => write!(f, "accounts"),
            Input::Members(None) => write!(f, "members"),
            Input::Members(Some(subgroup_id)) => write!(f, "members of {subgroup_id}"),
            Input::Roles => write!(f, "roles"),
            Input::Subgroups => write!(f, "subgroups"),
            Input::Topics(None) => write!(f, "main-group topics"),
            Input::Topics(Some(subgroup_id)) => write!(f, "topics of {subgroup_id}"),
            Input::RoleAssignments => write!(f, "role assignments"),
            Input::Invitations => write!(f, "invitations"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError<E>
where
    E: Error + 'static,
{
    #[error(transparent)]
    Role(#[from] RoleError),

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Invitation(#[from] InvitationError),

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntity),

    #[error("failed fetching {input}: {source}")]
    Fetch {
        input: Input,
        #[source]
        source: E,
    },

    #[error("store error: {0}")]
    Store(#[source] E),

    /// The result of a context switch arrived after a newer switch was issued.
    #[error("context switch was superseded by a newer one")]
    StaleContext,
}
