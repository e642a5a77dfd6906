// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapshot of everything known about one group at a point in time.
use std::collections::HashMap;

use crate::account::Account;
use crate::change::Change;
use crate::entity::{Entity, UnknownEntity};
use crate::ids::{
    AccountId, GroupId, InvitationId, MemberId, RoleId, SubgroupId, Timestamp, TopicId,
};
use crate::invitation::Invitation;
use crate::member::Member;
use crate::role::{Role, RoleAssignment};
use crate::subgroup::Subgroup;
use crate::topic::Topic;

/// Records of one group as fetched from the group-data service.
///
/// All lists keep the order the service returned them in, which is creation order. Resolvers
/// rely on that order for their output.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupContext {
    pub group_id: GroupId,

    /// Time the snapshot was taken, used for expiry checks.
    pub as_of: Timestamp,
    pub accounts: HashMap<AccountId, Account>,
    pub members: Vec<Member>,
    pub roles: Vec<Role>,
    pub subgroups: Vec<Subgroup>,
    pub role_assignments: Vec<RoleAssignment>,
    pub topics: Vec<Topic>,
    pub invitations: Vec<Invitation>,
}

impl GroupContext {
    pub fn new(group_id: GroupId, as_of: Timestamp) -> Self {
        Self {
            group_id,
            as_of,
            accounts: HashMap::new(),
            members: Vec::new(),
            roles: Vec::new(),
            subgroups: Vec::new(),
            role_assignments: Vec::new(),
            topics: Vec::new(),
            invitations: Vec::new(),
        }
    }

    pub fn member(&self, member_id: &MemberId) -> Option<&Member> {
        self.members.iter().find(|member| &member.id == member_id)
    }

    pub fn member_by_account(&self, account_id: &AccountId) -> Option<&Member> {
        self.members
            .iter()
            .find(|member| &member.account_id == account_id)
    }

    pub fn account(&self, account_id: &AccountId) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn account_for(&self, member: &Member) -> Option<&Account> {
        self.accounts.get(&member.account_id)
    }

    pub fn role(&self, role_id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|role| &role.id == role_id)
    }

    pub fn subgroup(&self, subgroup_id: &SubgroupId) -> Option<&Subgroup> {
        self.subgroups
            .iter()
            .find(|subgroup| &subgroup.id == subgroup_id)
    }

    pub fn topic(&self, topic_id: &TopicId) -> Option<&Topic> {
        self.topics.iter().find(|topic| &topic.id == topic_id)
    }

    pub fn invitation(&self, invitation_id: &InvitationId) -> Option<&Invitation> {
        self.invitations
            .iter()
            .find(|invitation| &invitation.id == invitation_id)
    }

    pub fn assignment(
        &self,
        role_id: &RoleId,
        subgroup_id: &SubgroupId,
    ) -> Option<&RoleAssignment> {
        self.role_assignments
            .iter()
            .find(|assignment| assignment.matches(role_id, subgroup_id))
    }

    /// Members currently holding a role, in member-list order.
    pub fn assignees<'a>(&'a self, role_id: &'a RoleId) -> impl Iterator<Item = &'a Member> + 'a {
        self.members
            .iter()
            .filter(move |member| member.holds_role(role_id))
    }

    /// Earliest expiry of a role assignment which is still active at `as_of`.
    pub fn next_expiry(&self) -> Option<Timestamp> {
        self.role_assignments
            .iter()
            .filter_map(|assignment| assignment.expires_at)
            .filter(|expires_at| *expires_at > self.as_of)
            .min()
    }

    /// Members belonging to a subgroup, or every member of the group for `None`.
    pub fn members_in<'a>(
        &'a self,
        subgroup_id: Option<&'a SubgroupId>,
    ) -> impl Iterator<Item = &'a Member> + 'a {
        self.members.iter().filter(move |member| match subgroup_id {
            Some(id) => member.subgroup_id.as_ref() == Some(id),
            None => true,
        })
    }

    /// Apply a single change to the snapshot.
    ///
    /// Changes referencing records which do not exist fail and leave the snapshot untouched.
    pub fn apply(&mut self, change: &Change) -> Result<(), UnknownEntity> {
        match change {
            Change::SetMemberRole { member_id, role_id } => {
                let member = self
                    .members
                    .iter_mut()
                    .find(|member| &member.id == member_id)
                    .ok_or_else(|| UnknownEntity(Entity::Member(member_id.clone())))?;
                member.assigned_role_id = role_id.clone();
            }
            Change::SetRoleAssignment(assignment) => {
                if self.role(&assignment.role_id).is_none() {
                    return Err(UnknownEntity(Entity::Role(assignment.role_id.clone())));
                }
                if self.subgroup(&assignment.subgroup_id).is_none() {
                    return Err(UnknownEntity(Entity::Subgroup(
                        assignment.subgroup_id.clone(),
                    )));
                }
                upsert(&mut self.role_assignments, assignment.clone(), |a| {
                    a.matches(&assignment.role_id, &assignment.subgroup_id)
                });
            }
            Change::ClearRoleAssignment {
                role_id,
                subgroup_id,
            } => {
                self.role_assignments
                    .retain(|assignment| !assignment.matches(role_id, subgroup_id));
            }
            Change::SetTopicGlobalAudience {
                topic_id,
                is_global,
            } => {
                let topic = self
                    .topics
                    .iter_mut()
                    .find(|topic| &topic.id == topic_id)
                    .ok_or_else(|| UnknownEntity(Entity::Topic(topic_id.clone())))?;
                topic.is_global_audience = *is_global;
            }
            Change::PutRole(role) => upsert(&mut self.roles, role.clone(), |r| r.id == role.id),
            Change::RemoveRole(role_id) => {
                if self.role(role_id).is_none() {
                    return Err(UnknownEntity(Entity::Role(role_id.clone())));
                }
                self.roles.retain(|role| &role.id != role_id);
            }
            Change::PutTopic(topic) => {
                upsert(&mut self.topics, topic.clone(), |t| t.id == topic.id)
            }
            Change::PutMember(member) => {
                upsert(&mut self.members, member.clone(), |m| m.id == member.id)
            }
            Change::RemoveMember(member_id) => {
                self.members.retain(|member| &member.id != member_id);
            }
            Change::PutInvitation(invitation) => upsert(
                &mut self.invitations,
                invitation.clone(),
                |i| i.id == invitation.id,
            ),
            Change::SetInvitationStatus {
                invitation_id,
                status,
            } => {
                let invitation = self
                    .invitations
                    .iter_mut()
                    .find(|invitation| &invitation.id == invitation_id)
                    .ok_or_else(|| UnknownEntity(Entity::Invitation(invitation_id.clone())))?;
                invitation.status = *status;
            }
        }

        Ok(())
    }
}

/// Replace the first matching item in place, or append it.
fn upsert<T>(items: &mut Vec<T>, item: T, matches: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| matches(existing)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}
