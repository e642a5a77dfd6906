// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};

use crate::ids::{AccountId, GroupId, MemberId, RoleId, SubgroupId};

/// Built-in tier a member holds in the main group, independent of custom roles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberTier {
    #[default]
    Member,
    Moderator,
    Admin,
    Owner,
}

impl MemberTier {
    /// Admins and owners keep their tier privileges whatever custom role they hold.
    pub fn is_admin(&self) -> bool {
        matches!(self, MemberTier::Admin | MemberTier::Owner)
    }
}

impl Display for MemberTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemberTier::Member => "member",
            MemberTier::Moderator => "moderator",
            MemberTier::Admin => "admin",
            MemberTier::Owner => "owner",
        };

        write!(f, "{}", s)
    }
}

/// Access level of a parent shadow account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShadowAccess {
    /// May only look at members and topics.
    ReadOnly,

    /// May post, comment and vote on behalf of the paired kid.
    #[default]
    Participant,
}

/// A membership record linking an account to a group.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Member {
    pub id: MemberId,
    pub group_id: GroupId,
    pub account_id: AccountId,

    /// Subgroup this membership was created for, if any.
    pub subgroup_id: Option<SubgroupId>,

    /// Custom role held by the member. A member holds at most one custom role at a time.
    pub assigned_role_id: Option<RoleId>,

    /// When set, the member may only act inside this subgroup.
    pub restricted_to_subgroup_id: Option<SubgroupId>,

    pub tier: MemberTier,

    /// Only consulted for parent shadow accounts.
    pub shadow_access: ShadowAccess,
}

impl Member {
    pub fn new(id: MemberId, group_id: GroupId, account_id: AccountId) -> Self {
        Self {
            id,
            group_id,
            account_id,
            subgroup_id: None,
            assigned_role_id: None,
            restricted_to_subgroup_id: None,
            tier: MemberTier::default(),
            shadow_access: ShadowAccess::default(),
        }
    }

    pub fn in_subgroup(mut self, subgroup_id: SubgroupId) -> Self {
        self.subgroup_id = Some(subgroup_id);
        self
    }

    pub fn with_role(mut self, role_id: RoleId) -> Self {
        self.assigned_role_id = Some(role_id);
        self
    }

    pub fn with_tier(mut self, tier: MemberTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_shadow_access(mut self, access: ShadowAccess) -> Self {
        self.shadow_access = access;
        self
    }

    /// Pin the member to one subgroup.
    ///
    /// The membership is also moved into that subgroup.
    pub fn restricted_to(mut self, subgroup_id: SubgroupId) -> Self {
        self.subgroup_id = Some(subgroup_id.clone());
        self.restricted_to_subgroup_id = Some(subgroup_id);
        self
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted_to_subgroup_id.is_some()
    }

    pub fn holds_role(&self, role_id: &RoleId) -> bool {
        self.assigned_role_id.as_ref() == Some(role_id)
    }
}
