// SPDX-License-Identifier: MIT OR Apache-2.0

//! Baseline capabilities and hard limits of a group.
use hearth_core::{
    Account, AccountKind, Capability, CapabilitySet, DEFAULT_MAX_ASSIGNEES, Member, MemberTier,
};

/// Capabilities members have when no custom role applies to them.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Policy {
    pub(crate) max_role_assignees: usize,
    pub(crate) member: CapabilitySet,
    pub(crate) moderator: CapabilitySet,
    pub(crate) kid: CapabilitySet,
    pub(crate) parent_shadow: CapabilitySet,
}

impl Default for Policy {
    fn default() -> Self {
        let participant = CapabilitySet::from_iter([
            Capability::ViewMembers,
            Capability::ViewTopics,
            Capability::Post,
            Capability::Comment,
            Capability::Vote,
        ]);
        let moderator = participant
            .clone()
            .with(Capability::CreateTopics)
            .with(Capability::ModerateContent);

        Self {
            max_role_assignees: DEFAULT_MAX_ASSIGNEES,
            member: participant.clone(),
            moderator,
            kid: participant.clone(),
            parent_shadow: participant,
        }
    }
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound for the capacity of any custom role.
    pub fn max_role_assignees(&self) -> usize {
        self.max_role_assignees
    }

    pub fn with_max_role_assignees(mut self, max: usize) -> Self {
        self.max_role_assignees = max;
        self
    }

    pub fn with_member_baseline(mut self, capabilities: CapabilitySet) -> Self {
        self.member = capabilities;
        self
    }

    pub fn with_moderator_baseline(mut self, capabilities: CapabilitySet) -> Self {
        self.moderator = capabilities;
        self
    }

    pub fn with_kid_baseline(mut self, capabilities: CapabilitySet) -> Self {
        self.kid = capabilities;
        self
    }

    pub fn with_parent_shadow_baseline(mut self, capabilities: CapabilitySet) -> Self {
        self.parent_shadow = capabilities;
        self
    }

    /// Built-in capabilities of a member, depending on account kind and tier.
    ///
    /// Kids and parent shadows always get their kind's baseline, the tier only matters for
    /// adults.
    pub fn baseline(&self, account: &Account, member: &Member) -> CapabilitySet {
        match account.kind {
            AccountKind::Kid => self.kid.clone(),
            AccountKind::ParentShadow { .. } => self.parent_shadow.clone(),
            AccountKind::Adult => match member.tier {
                MemberTier::Member => self.member.clone(),
                MemberTier::Moderator => self.moderator.clone(),
                MemberTier::Admin | MemberTier::Owner => CapabilitySet::all(),
            },
        }
    }
}
