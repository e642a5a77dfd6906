// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
//!
//! Fixtures use the account id as member id, so tests can refer to both by the same name.
use crate::account::{Account, AccountKind};
use crate::context::GroupContext;
use crate::ids::{AccountId, GroupId, MemberId, RoleId, SubgroupId, Timestamp, TopicId};
use crate::invitation::Invitation;
use crate::member::{Member, MemberTier, ShadowAccess};
use crate::role::{Capability, CapabilitySet, Role, RoleAssignment};
use crate::subgroup::Subgroup;
use crate::topic::Topic;

/// Default snapshot time of fixtures.
pub const TEST_NOW: Timestamp = Timestamp::new(1_000_000);

/// Builder for a [`GroupContext`] fixture.
pub struct TestGroup {
    ctx: GroupContext,
}

impl TestGroup {
    pub fn new(group_id: &str) -> Self {
        Self {
            ctx: GroupContext::new(GroupId::new(group_id), TEST_NOW),
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.ctx.group_id.clone()
    }

    pub fn as_of(mut self, secs: u64) -> Self {
        self.ctx.as_of = Timestamp::new(secs);
        self
    }

    pub fn subgroup(mut self, id: &str) -> Self {
        let subgroup = Subgroup::new(SubgroupId::new(id), self.group_id(), id);
        self.ctx.subgroups.push(subgroup);
        self
    }

    /// Add an account without a membership record.
    pub fn account(mut self, account: Account) -> Self {
        self.ctx.accounts.insert(account.id.clone(), account);
        self
    }

    /// Add an account together with its membership record.
    pub fn member(mut self, account: Account, member: Member) -> Self {
        self.ctx.accounts.insert(account.id.clone(), account);
        self.ctx.members.push(member);
        self
    }

    fn member_record(&self, id: &str) -> Member {
        Member::new(MemberId::new(id), self.group_id(), AccountId::new(id))
    }

    pub fn adult(self, id: &str) -> Self {
        let member = self.member_record(id);
        self.member(Account::new(id, AccountKind::Adult, id), member)
    }

    pub fn adult_in(self, id: &str, subgroup_id: &str) -> Self {
        let member = self
            .member_record(id)
            .in_subgroup(SubgroupId::new(subgroup_id));
        self.member(Account::new(id, AccountKind::Adult, id), member)
    }

    pub fn with_tier(self, id: &str, tier: MemberTier) -> Self {
        let member = self.member_record(id).with_tier(tier);
        self.member(Account::new(id, AccountKind::Adult, id), member)
    }

    pub fn kid(self, id: &str) -> Self {
        let member = self.member_record(id);
        self.member(Account::new(id, AccountKind::Kid, id), member)
    }

    pub fn restricted_kid(self, id: &str, subgroup_id: &str) -> Self {
        let member = self
            .member_record(id)
            .restricted_to(SubgroupId::new(subgroup_id));
        self.member(Account::new(id, AccountKind::Kid, id), member)
    }

    pub fn shadow(self, id: &str, kid_id: &str) -> Self {
        let member = self.member_record(id);
        self.member(shadow_account(id, kid_id), member)
    }

    pub fn restricted_shadow(
        self,
        id: &str,
        kid_id: &str,
        subgroup_id: &str,
        access: ShadowAccess,
    ) -> Self {
        let member = self
            .member_record(id)
            .restricted_to(SubgroupId::new(subgroup_id))
            .with_shadow_access(access);
        self.member(shadow_account(id, kid_id), member)
    }

    pub fn restricted_adult(self, id: &str, subgroup_id: &str) -> Self {
        let member = self
            .member_record(id)
            .restricted_to(SubgroupId::new(subgroup_id));
        self.member(Account::new(id, AccountKind::Adult, id), member)
    }

    pub fn role(self, id: &str, capabilities: &[Capability]) -> Self {
        let role = Role::new(
            RoleId::new(id),
            self.group_id(),
            id,
            CapabilitySet::from_iter(capabilities.iter().copied()),
        );
        self.role_with(role)
    }

    pub fn role_with(mut self, role: Role) -> Self {
        self.ctx.roles.push(role);
        self
    }

    /// Let a member hold a role without any capacity or account-kind checks.
    pub fn holds(mut self, member_id: &str, role_id: &str) -> Self {
        if let Some(member) = self
            .ctx
            .members
            .iter_mut()
            .find(|member| member.id.as_str() == member_id)
        {
            member.assigned_role_id = Some(RoleId::new(role_id));
        }
        self
    }

    pub fn assign_role(self, role_id: &str, subgroup_id: &str) -> Self {
        let assignment = RoleAssignment::new(RoleId::new(role_id), SubgroupId::new(subgroup_id));
        self.assignment(assignment)
    }

    pub fn assignment(mut self, assignment: RoleAssignment) -> Self {
        self.ctx.role_assignments.push(assignment);
        self
    }

    pub fn topic(self, id: &str) -> Self {
        let topic = Topic::new(TopicId::new(id), self.group_id(), id);
        self.topic_with(topic)
    }

    pub fn global_topic(self, id: &str) -> Self {
        let topic = Topic::new(TopicId::new(id), self.group_id(), id).global();
        self.topic_with(topic)
    }

    pub fn subgroup_topic(self, id: &str, subgroup_id: &str) -> Self {
        let topic = Topic::new(TopicId::new(id), self.group_id(), id)
            .in_subgroup(SubgroupId::new(subgroup_id));
        self.topic_with(topic)
    }

    pub fn topic_with(mut self, topic: Topic) -> Self {
        self.ctx.topics.push(topic);
        self
    }

    pub fn invitation(mut self, invitation: Invitation) -> Self {
        self.ctx.invitations.push(invitation);
        self
    }

    pub fn build(self) -> GroupContext {
        self.ctx
    }
}

pub fn shadow_account(id: &str, kid_id: &str) -> Account {
    Account::new(
        id,
        AccountKind::ParentShadow {
            paired_kid_id: AccountId::new(kid_id),
        },
        id,
    )
}
