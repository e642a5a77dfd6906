// SPDX-License-Identifier: MIT OR Apache-2.0

//! Custom roles, their capabilities and their subgroup assignments.
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::ids::{GroupId, RoleId, SubgroupId, Timestamp};

/// How many members may hold the same custom role at once.
pub const DEFAULT_MAX_ASSIGNEES: usize = 3;

/// A single thing a member may be allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Capability {
    ViewMembers,
    ViewTopics,
    Post,
    Comment,
    Vote,
    CreateTopics,
    PostAnnouncements,
    ModerateContent,
    InviteUsers,
    ManageMembers,
    ManageRoles,
    ManageSubgroups,

    /// The role applies in every subgroup, not only the ones it is assigned to.
    AccessAllSubgroups,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::ViewMembers,
        Capability::ViewTopics,
        Capability::Post,
        Capability::Comment,
        Capability::Vote,
        Capability::CreateTopics,
        Capability::PostAnnouncements,
        Capability::ModerateContent,
        Capability::InviteUsers,
        Capability::ManageMembers,
        Capability::ManageRoles,
        Capability::ManageSubgroups,
        Capability::AccessAllSubgroups,
    ];
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Capability::ViewMembers => "view members",
            Capability::ViewTopics => "view topics",
            Capability::Post => "post",
            Capability::Comment => "comment",
            Capability::Vote => "vote",
            Capability::CreateTopics => "create topics",
            Capability::PostAnnouncements => "post announcements",
            Capability::ModerateContent => "moderate content",
            Capability::InviteUsers => "invite users",
            Capability::ManageMembers => "manage members",
            Capability::ManageRoles => "manage roles",
            Capability::ManageSubgroups => "manage subgroups",
            Capability::AccessAllSubgroups => "access all subgroups",
        };

        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn all() -> Self {
        Self::from_iter(Capability::ALL)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn remove(&mut self, capability: Capability) -> bool {
        self.0.remove(&capability)
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn union(&self, other: &CapabilitySet) -> CapabilitySet {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A custom, capacity-limited role within a group, for example "Math Tutor".
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    pub id: RoleId,
    pub group_id: GroupId,
    pub name: String,

    /// Name shown instead of the role name when posting as this role.
    pub alias: Option<String>,
    pub capabilities: CapabilitySet,
    pub max_assignees: usize,

    /// Show the real username of the member underneath the role name when posting.
    pub show_real_username: bool,
}

impl Role {
    pub fn new(id: RoleId, group_id: GroupId, name: &str, capabilities: CapabilitySet) -> Self {
        Self {
            id,
            group_id,
            name: name.to_owned(),
            alias: None,
            capabilities,
            max_assignees: DEFAULT_MAX_ASSIGNEES,
            show_real_username: false,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_owned());
        self
    }

    pub fn with_real_username(mut self) -> Self {
        self.show_real_username = true;
        self
    }

    pub fn can_access_all_subgroups(&self) -> bool {
        self.capabilities.contains(Capability::AccessAllSubgroups)
    }

    /// Name used when a member posts as this role.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Attaches a role to a subgroup.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoleAssignment {
    pub role_id: RoleId,
    pub subgroup_id: SubgroupId,
    pub expires_at: Option<Timestamp>,
    pub notes: Option<String>,
}

impl RoleAssignment {
    pub fn new(role_id: RoleId, subgroup_id: SubgroupId) -> Self {
        Self {
            role_id,
            subgroup_id,
            expires_at: None,
            notes: None,
        }
    }

    pub fn matches(&self, role_id: &RoleId, subgroup_id: &SubgroupId) -> bool {
        &self.role_id == role_id && &self.subgroup_id == subgroup_id
    }

    /// An assignment without expiry never lapses.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

#[cfg(test)]
mod tests {
    use crate::ids::{GroupId, RoleId, SubgroupId, Timestamp};

    use super::{Capability, CapabilitySet, Role, RoleAssignment};

    #[test]
    fn display_name_prefers_alias() {
        let role = Role::new(
            RoleId::new("r"),
            GroupId::new("g"),
            "Math Tutor",
            CapabilitySet::empty(),
        );
        assert_eq!(role.display_name(), "Math Tutor");
        assert_eq!(role.with_alias("Mr. Numbers").display_name(), "Mr. Numbers");
    }

    #[test]
    fn capability_set_union() {
        let a = CapabilitySet::from_iter([Capability::Post, Capability::Vote]);
        let b = CapabilitySet::empty().with(Capability::ManageRoles);
        let union = a.union(&b);
        assert_eq!(union.len(), 3);
        assert!(union.contains(Capability::ManageRoles));
        assert!(!a.contains(Capability::ManageRoles));
        assert_eq!(CapabilitySet::all().len(), Capability::ALL.len());
    }

    #[test]
    fn assignment_expiry() {
        let mut assignment = RoleAssignment::new(RoleId::new("r"), SubgroupId::new("s"));
        assert!(assignment.is_active(Timestamp::new(u64::MAX)));

        assignment.expires_at = Some(Timestamp::new(100));
        assert!(assignment.is_active(Timestamp::new(99)));
        assert!(!assignment.is_active(Timestamp::new(100)));
    }
}
