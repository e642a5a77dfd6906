// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the service holding group records.
use std::collections::HashMap;
use std::error::Error;

use hearth_core::{
    Account, AccountId, Change, GroupId, Invitation, InvitationId, InvitationStatus, Member,
    MemberId, Role, RoleAssignment, RoleId, Subgroup, SubgroupId, Topic, TopicId,
};

/// Read access to the records of a group.
///
/// All lists are returned in creation order.
pub trait GroupStore {
    type Error: Error;

    /// Returns the accounts of every member and invitee of the group.
    fn accounts(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<HashMap<AccountId, Account>, Self::Error>>;

    /// Returns the members of a subgroup, or of the whole group for `None`.
    fn members(
        &self,
        group_id: &GroupId,
        subgroup_id: Option<&SubgroupId>,
    ) -> impl Future<Output = Result<Vec<Member>, Self::Error>>;

    fn roles(&self, group_id: &GroupId) -> impl Future<Output = Result<Vec<Role>, Self::Error>>;

    fn subgroups(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<Subgroup>, Self::Error>>;

    /// Returns the topics created in a subgroup, or the main-group topics for `None`.
    fn topics(
        &self,
        group_id: &GroupId,
        subgroup_id: Option<&SubgroupId>,
    ) -> impl Future<Output = Result<Vec<Topic>, Self::Error>>;

    fn role_assignments(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<RoleAssignment>, Self::Error>>;

    fn invitations(
        &self,
        group_id: &GroupId,
    ) -> impl Future<Output = Result<Vec<Invitation>, Self::Error>>;
}

/// Write access to the records of a group.
///
/// Writes referencing records which do not exist fail, except for removals and clears which
/// succeed when there is nothing to remove.
pub trait GroupWriter {
    type Error: Error;

    /// Sets or clears the custom role a member holds.
    fn set_member_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        role_id: Option<&RoleId>,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Inserts a role-to-subgroup assignment or replaces the existing one for the same pair.
    fn set_role_subgroup_assignment(
        &self,
        group_id: &GroupId,
        assignment: &RoleAssignment,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn clear_role_subgroup_assignment(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
        subgroup_id: &SubgroupId,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn set_topic_global_audience(
        &self,
        group_id: &GroupId,
        topic_id: &TopicId,
        is_global: bool,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Inserts or replaces a role.
    fn put_role(
        &self,
        group_id: &GroupId,
        role: &Role,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn remove_role(
        &self,
        group_id: &GroupId,
        role_id: &RoleId,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Inserts or replaces a topic.
    fn put_topic(
        &self,
        group_id: &GroupId,
        topic: &Topic,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Inserts or replaces a member.
    fn put_member(
        &self,
        group_id: &GroupId,
        member: &Member,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn remove_member(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Inserts or replaces an invitation.
    fn put_invitation(
        &self,
        group_id: &GroupId,
        invitation: &Invitation,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn set_invitation_status(
        &self,
        group_id: &GroupId,
        invitation_id: &InvitationId,
        status: InvitationStatus,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Dispatches a change to the matching write.
    fn apply(
        &self,
        group_id: &GroupId,
        change: &Change,
    ) -> impl Future<Output = Result<(), Self::Error>> {
        async move {
            match change {
                Change::SetMemberRole { member_id, role_id } => {
                    self.set_member_role(group_id, member_id, role_id.as_ref())
                        .await
                }
                Change::SetRoleAssignment(assignment) => {
                    self.set_role_subgroup_assignment(group_id, assignment)
                        .await
                }
                Change::ClearRoleAssignment {
                    role_id,
                    subgroup_id,
                } => {
                    self.clear_role_subgroup_assignment(group_id, role_id, subgroup_id)
                        .await
                }
                Change::SetTopicGlobalAudience {
                    topic_id,
                    is_global,
                } => {
                    self.set_topic_global_audience(group_id, topic_id, *is_global)
                        .await
                }
                Change::PutRole(role) => self.put_role(group_id, role).await,
                Change::RemoveRole(role_id) => self.remove_role(group_id, role_id).await,
                Change::PutTopic(topic) => self.put_topic(group_id, topic).await,
                Change::PutMember(member) => self.put_member(group_id, member).await,
                Change::RemoveMember(member_id) => self.remove_member(group_id, member_id).await,
                Change::PutInvitation(invitation) => {
                    self.put_invitation(group_id, invitation).await
                }
                Change::SetInvitationStatus {
                    invitation_id,
                    status,
                } => {
                    self.set_invitation_status(group_id, invitation_id, *status)
                        .await
                }
            }
        }
    }
}

/// All-or-nothing application of several writes.
///
/// `begin` hands out a permit which has to be passed back to `commit` or `rollback`. Writes
/// issued while the permit is held belong to that transaction.
pub trait Transaction {
    type Error: Error;

    type Permit;

    /// Begins a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Permit, Self::Error>>;

    /// Rolls back the transaction and with that all uncommitted writes.
    fn rollback(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;

    /// Commits the transaction.
    fn commit(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;
}
