// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};

use crate::ids::{AccountId, GroupId, InvitationId, RoleId, SubgroupId, Timestamp};
use crate::member::ShadowAccess;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl Display for InvitationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
            InvitationStatus::Expired => "expired",
        };

        write!(f, "{}", s)
    }
}

/// An invitation for an account to join a group or one of its subgroups.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Invitation {
    pub id: InvitationId,
    pub group_id: GroupId,
    pub subgroup_id: Option<SubgroupId>,
    pub invited_account_id: AccountId,

    /// Role the inviter acted as, if any.
    pub invited_by_role_id: Option<RoleId>,
    pub status: InvitationStatus,
    pub expires_at: Timestamp,

    /// Access level granted when a parent shadow accepts.
    pub shadow_access: ShadowAccess,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}
