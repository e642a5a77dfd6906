// SPDX-License-Identifier: MIT OR Apache-2.0

//! Custom role assignment.
//!
//! Every operation is a pure function from the current [`GroupContext`] to the [`Transition`]
//! which needs to be written to reach the next state. Checks and the resulting writes are
//! computed from the same snapshot, so applying a transition under the group's writer lock makes
//! the capacity check and the write one step.
use hearth_core::{
    Capability, CapabilitySet, Change, Entity, GroupContext, Member, MemberId, Role,
    RoleAssignment, RoleId, Scope, ShadowAccess, SubgroupId, Timestamp, Transition, UnknownEntity,
};
use thiserror::Error;
use tracing::debug;

use crate::policy::Policy;

#[derive(Debug, Error, PartialEq)]
pub enum RoleError {
    #[error("kid accounts cannot hold a role: {0}")]
    KidAccountCannotHoldRole(MemberId),

    #[error("role is full: {role} already has {max} assignees")]
    RoleCapacityExceeded { role: RoleId, max: usize },

    #[error("role {0} is already assigned to subgroup {1}")]
    DuplicateAssignment(RoleId, SubgroupId),

    #[error("role already exists: {0}")]
    DuplicateRole(RoleId),

    #[error("capacity of role {role} must be between {min} and {max}, got {requested}")]
    InvalidCapacity {
        role: RoleId,
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntity),
}

fn unknown_role(role_id: &RoleId) -> RoleError {
    RoleError::UnknownEntity(UnknownEntity(Entity::Role(role_id.clone())))
}

fn unknown_member(member_id: &MemberId) -> RoleError {
    RoleError::UnknownEntity(UnknownEntity(Entity::Member(member_id.clone())))
}

/// Number of members holding a role and how many may hold it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoleCapacity {
    pub assigned: usize,
    pub max: usize,
}

impl RoleCapacity {
    pub fn is_full(&self) -> bool {
        self.assigned >= self.max
    }
}

/// Let a member hold a role.
///
/// Any role the member held before is replaced, a member holds at most one custom role at a time.
/// Assigning a role the member already holds is a no-op and returns an empty transition.
pub fn assign_member(
    y: &GroupContext,
    role_id: &RoleId,
    member_id: &MemberId,
) -> Result<Transition, RoleError> {
    // Ensure that role, member and account are known to the group.
    let role = y.role(role_id).ok_or_else(|| unknown_role(role_id))?;
    let member = y.member(member_id).ok_or_else(|| unknown_member(member_id))?;
    let account = y.account_for(member).ok_or_else(|| {
        RoleError::UnknownEntity(UnknownEntity(Entity::Account(member.account_id.clone())))
    })?;

    if account.is_kid() {
        return Err(RoleError::KidAccountCannotHoldRole(member_id.clone()));
    }

    if member.holds_role(role_id) {
        return Ok(Transition::new());
    }

    // Compare against the assignee count of the same snapshot the write is derived from.
    let capacity = role_capacity(y, role_id)?;
    if capacity.assigned >= role.max_assignees {
        return Err(RoleError::RoleCapacityExceeded {
            role: role_id.clone(),
            max: role.max_assignees,
        });
    }

    debug!(
        role = %role_id,
        member = %member_id,
        previous = ?member.assigned_role_id,
        assigned = capacity.assigned + 1,
        "assign member to role"
    );

    Ok(Transition::new().with(Change::SetMemberRole {
        member_id: member_id.clone(),
        role_id: Some(role_id.clone()),
    }))
}

/// Take a role away from a member.
///
/// Returns an empty transition when the member is unknown or does not hold the role.
pub fn remove_member(y: &GroupContext, role_id: &RoleId, member_id: &MemberId) -> Transition {
    match y.member(member_id) {
        Some(member) if member.holds_role(role_id) => {
            debug!(role = %role_id, member = %member_id, "remove member from role");
            Transition::new().with(Change::SetMemberRole {
                member_id: member_id.clone(),
                role_id: None,
            })
        }
        _ => Transition::new(),
    }
}

/// Attach a role to a subgroup.
///
/// Existing assignments need to be changed with [`update_assignment`].
pub fn assign_to_subgroup(
    y: &GroupContext,
    role_id: &RoleId,
    subgroup_id: &SubgroupId,
    notes: Option<String>,
    expires_at: Option<Timestamp>,
) -> Result<Transition, RoleError> {
    y.role(role_id).ok_or_else(|| unknown_role(role_id))?;
    y.subgroup(subgroup_id).ok_or_else(|| {
        RoleError::UnknownEntity(UnknownEntity(Entity::Subgroup(subgroup_id.clone())))
    })?;

    if y.assignment(role_id, subgroup_id).is_some() {
        return Err(RoleError::DuplicateAssignment(
            role_id.clone(),
            subgroup_id.clone(),
        ));
    }

    debug!(role = %role_id, subgroup = %subgroup_id, ?expires_at, "assign role to subgroup");

    Ok(Transition::new().with(Change::SetRoleAssignment(RoleAssignment {
        role_id: role_id.clone(),
        subgroup_id: subgroup_id.clone(),
        expires_at,
        notes,
    })))
}

/// Change notes or expiry of an existing role-to-subgroup assignment.
pub fn update_assignment(
    y: &GroupContext,
    role_id: &RoleId,
    subgroup_id: &SubgroupId,
    notes: Option<String>,
    expires_at: Option<Timestamp>,
) -> Result<Transition, RoleError> {
    let Some(existing) = y.assignment(role_id, subgroup_id) else {
        return Err(RoleError::UnknownEntity(UnknownEntity(
            Entity::RoleAssignment(role_id.clone(), subgroup_id.clone()),
        )));
    };

    let updated = RoleAssignment {
        notes,
        expires_at,
        ..existing.clone()
    };
    if &updated == existing {
        return Ok(Transition::new());
    }

    debug!(role = %role_id, subgroup = %subgroup_id, ?expires_at, "update role assignment");

    Ok(Transition::new().with(Change::SetRoleAssignment(updated)))
}

/// Detach a role from a subgroup. No-op if it was never attached.
pub fn remove_from_subgroup(
    y: &GroupContext,
    role_id: &RoleId,
    subgroup_id: &SubgroupId,
) -> Transition {
    if y.assignment(role_id, subgroup_id).is_none() {
        return Transition::new();
    }

    debug!(role = %role_id, subgroup = %subgroup_id, "remove role from subgroup");

    Transition::new().with(Change::ClearRoleAssignment {
        role_id: role_id.clone(),
        subgroup_id: subgroup_id.clone(),
    })
}

fn check_capacity(role: &Role, min: usize, policy: &Policy) -> Result<(), RoleError> {
    let max = policy.max_role_assignees();
    if role.max_assignees < min || role.max_assignees > max {
        return Err(RoleError::InvalidCapacity {
            role: role.id.clone(),
            requested: role.max_assignees,
            min,
            max,
        });
    }
    Ok(())
}

pub fn create_role(y: &GroupContext, policy: &Policy, role: Role) -> Result<Transition, RoleError> {
    if y.role(&role.id).is_some() {
        return Err(RoleError::DuplicateRole(role.id));
    }
    check_capacity(&role, 1, policy)?;

    debug!(role = %role.id, name = %role.name, max = role.max_assignees, "create role");

    Ok(Transition::new().with(Change::PutRole(role)))
}

/// Replace name, alias, capabilities or capacity of a role.
///
/// The capacity can not be lowered below the number of members currently holding the role.
pub fn update_role(y: &GroupContext, policy: &Policy, role: Role) -> Result<Transition, RoleError> {
    let existing = y.role(&role.id).ok_or_else(|| unknown_role(&role.id))?;
    let assigned = y.assignees(&role.id).count();
    check_capacity(&role, assigned.max(1), policy)?;

    if existing == &role {
        return Ok(Transition::new());
    }

    debug!(role = %role.id, name = %role.name, max = role.max_assignees, "update role");

    Ok(Transition::new().with(Change::PutRole(role)))
}

/// Delete a role together with everything referencing it.
///
/// The transition first clears the role on every member holding it, then removes every
/// subgroup assignment and finally the role itself. It must be applied as a whole.
pub fn delete_role(y: &GroupContext, role_id: &RoleId) -> Result<Transition, RoleError> {
    y.role(role_id).ok_or_else(|| unknown_role(role_id))?;

    let mut transition = Transition::new();
    for member in y.assignees(role_id) {
        transition.push(Change::SetMemberRole {
            member_id: member.id.clone(),
            role_id: None,
        });
    }
    for assignment in y
        .role_assignments
        .iter()
        .filter(|assignment| &assignment.role_id == role_id)
    {
        transition.push(Change::ClearRoleAssignment {
            role_id: role_id.clone(),
            subgroup_id: assignment.subgroup_id.clone(),
        });
    }
    transition.push(Change::RemoveRole(role_id.clone()));

    debug!(role = %role_id, writes = transition.changes().len(), "delete role");

    Ok(transition)
}

pub fn role_capacity(y: &GroupContext, role_id: &RoleId) -> Result<RoleCapacity, RoleError> {
    let role = y.role(role_id).ok_or_else(|| unknown_role(role_id))?;
    Ok(RoleCapacity {
        assigned: y.assignees(role_id).count(),
        max: role.max_assignees,
    })
}

/// Return the role a member acts as in the given scope, if any.
///
/// A role applies in the main group, in subgroups it has an active assignment for and, with
/// the "access all subgroups" capability, in every subgroup. Kid accounts never act as a role,
/// even when the records say they hold one.
pub fn applicable_role<'a>(
    y: &'a GroupContext,
    member: &Member,
    scope: &Scope,
) -> Option<&'a Role> {
    let role = y.role(member.assigned_role_id.as_ref()?)?;

    if y.account_for(member).is_none_or(|account| account.is_kid()) {
        return None;
    }

    let applies = match scope {
        Scope::MainGroup => true,
        Scope::Subgroup(subgroup_id) => {
            role.can_access_all_subgroups()
                || y
                    .assignment(&role.id, subgroup_id)
                    .is_some_and(|assignment| assignment.is_active(y.as_of))
        }
    };

    applies.then_some(role)
}

/// Capabilities a member has in the given scope.
///
/// The applicable role's capabilities replace the member's baseline, except for admins and
/// owners who keep their tier capabilities on top. Members with unknown accounts have none, so
/// have members restricted to a subgroup outside of it.
pub fn effective_capabilities(
    y: &GroupContext,
    policy: &Policy,
    member: &Member,
    scope: &Scope,
) -> CapabilitySet {
    let Some(account) = y.account_for(member) else {
        return CapabilitySet::empty();
    };

    let outside_restriction = member
        .restricted_to_subgroup_id
        .as_ref()
        .is_some_and(|subgroup_id| scope.subgroup_id() != Some(subgroup_id));
    if outside_restriction {
        return CapabilitySet::empty();
    }

    let baseline = policy.baseline(account, member);
    let mut capabilities = match applicable_role(y, member, scope) {
        Some(role) if member.tier.is_admin() => role.capabilities.union(&baseline),
        Some(role) => role.capabilities.clone(),
        None => baseline,
    };

    if account.is_kid() {
        for capability in [
            Capability::ManageMembers,
            Capability::ManageRoles,
            Capability::InviteUsers,
        ] {
            capabilities.remove(capability);
        }
    }

    if account.is_parent_shadow() && member.shadow_access == ShadowAccess::ReadOnly {
        capabilities = capabilities
            .iter()
            .filter(|capability| {
                matches!(capability, Capability::ViewMembers | Capability::ViewTopics)
            })
            .collect();
    }

    capabilities
}
