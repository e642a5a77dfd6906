// SPDX-License-Identifier: MIT OR Apache-2.0

//! Joining and leaving a group.
//!
//! Members are created when an invitation is accepted and removed when they leave. Accepting a
//! subgroup invitation as a kid or parent shadow pins the new member to that subgroup. The pin is
//! set once and no operation here lifts it again.
use std::time::Duration;

use hearth_core::{
    AccountError, AccountId, Change, Entity, GroupContext, Invitation, InvitationId,
    InvitationStatus, Member, MemberId, RoleId, ShadowAccess, SubgroupId, Transition,
    UnknownEntity,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum InvitationError {
    #[error("invitation {0} is {1}, not pending")]
    NotPending(InvitationId, InvitationStatus),

    #[error("invitation {0} has expired")]
    Expired(InvitationId),

    #[error("account {0} is already a member of the group")]
    AlreadyMember(AccountId),

    #[error("account {0} already has a pending invitation")]
    DuplicateInvitation(AccountId),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntity),
}

/// Who to invite where.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InvitationRequest {
    pub id: InvitationId,
    pub account_id: AccountId,
    pub subgroup_id: Option<SubgroupId>,
    pub invited_by_role_id: Option<RoleId>,
    pub shadow_access: ShadowAccess,
}

impl InvitationRequest {
    pub fn new(id: impl Into<InvitationId>, account_id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            subgroup_id: None,
            invited_by_role_id: None,
            shadow_access: ShadowAccess::default(),
        }
    }

    pub fn to_subgroup(mut self, subgroup_id: SubgroupId) -> Self {
        self.subgroup_id = Some(subgroup_id);
        self
    }

    pub fn by_role(mut self, role_id: RoleId) -> Self {
        self.invited_by_role_id = Some(role_id);
        self
    }

    pub fn with_shadow_access(mut self, access: ShadowAccess) -> Self {
        self.shadow_access = access;
        self
    }
}

/// Create a pending invitation which expires after `lifetime`.
pub fn invite(
    y: &GroupContext,
    request: InvitationRequest,
    lifetime: Duration,
) -> Result<Transition, InvitationError> {
    let account = y
        .account(&request.account_id)
        .ok_or_else(|| UnknownEntity(Entity::Account(request.account_id.clone())))?;
    account.validate()?;

    if let Some(subgroup_id) = &request.subgroup_id {
        y.subgroup(subgroup_id)
            .ok_or_else(|| UnknownEntity(Entity::Subgroup(subgroup_id.clone())))?;
    }

    if let Some(role_id) = &request.invited_by_role_id {
        y.role(role_id)
            .ok_or_else(|| UnknownEntity(Entity::Role(role_id.clone())))?;
    }

    if y.member_by_account(&request.account_id).is_some() {
        return Err(InvitationError::AlreadyMember(request.account_id));
    }

    let duplicate = y.invitations.iter().any(|invitation| {
        invitation.id == request.id
            || (invitation.is_pending()
                && invitation.invited_account_id == request.account_id
                && invitation.subgroup_id == request.subgroup_id)
    });
    if duplicate {
        return Err(InvitationError::DuplicateInvitation(request.account_id));
    }

    let invitation = Invitation {
        id: request.id,
        group_id: y.group_id.clone(),
        subgroup_id: request.subgroup_id,
        invited_account_id: request.account_id,
        invited_by_role_id: request.invited_by_role_id,
        status: InvitationStatus::Pending,
        expires_at: y.as_of.saturating_add(lifetime),
        shadow_access: request.shadow_access,
    };

    debug!(
        invitation = %invitation.id,
        account = %invitation.invited_account_id,
        subgroup = ?invitation.subgroup_id,
        expires_at = %invitation.expires_at,
        "invite"
    );

    Ok(Transition::new().with(Change::PutInvitation(invitation)))
}

fn pending<'a>(
    y: &'a GroupContext,
    invitation_id: &InvitationId,
) -> Result<&'a Invitation, InvitationError> {
    let invitation = y
        .invitation(invitation_id)
        .ok_or_else(|| UnknownEntity(Entity::Invitation(invitation_id.clone())))?;

    if !invitation.is_pending() {
        return Err(InvitationError::NotPending(
            invitation_id.clone(),
            invitation.status,
        ));
    }

    Ok(invitation)
}

/// Accept a pending invitation and create the membership.
///
/// Fails with [`InvitationError::Expired`] once the invitation is past its expiry. The caller is
/// expected to record that with [`expire_invitations`].
pub fn accept(
    y: &GroupContext,
    invitation_id: &InvitationId,
) -> Result<Transition, InvitationError> {
    let invitation = pending(y, invitation_id)?;

    if invitation.is_expired_at(y.as_of) {
        return Err(InvitationError::Expired(invitation_id.clone()));
    }

    let account = y
        .account(&invitation.invited_account_id)
        .ok_or_else(|| UnknownEntity(Entity::Account(invitation.invited_account_id.clone())))?;
    account.validate()?;

    if y.member_by_account(&account.id).is_some() {
        return Err(InvitationError::AlreadyMember(account.id.clone()));
    }

    let member_id = MemberId::for_account(&y.group_id, &account.id);
    let mut member = Member::new(member_id, y.group_id.clone(), account.id.clone());

    if let Some(subgroup_id) = &invitation.subgroup_id {
        member = if account.is_kid() || account.is_parent_shadow() {
            member.restricted_to(subgroup_id.clone())
        } else {
            member.in_subgroup(subgroup_id.clone())
        };
    }

    if account.is_parent_shadow() {
        member = member.with_shadow_access(invitation.shadow_access);
    }

    debug!(
        invitation = %invitation_id,
        member = %member.id,
        restricted_to = ?member.restricted_to_subgroup_id,
        "accept invitation"
    );

    Ok(Transition::new()
        .with(Change::PutMember(member))
        .with(Change::SetInvitationStatus {
            invitation_id: invitation_id.clone(),
            status: InvitationStatus::Accepted,
        }))
}

pub fn reject(
    y: &GroupContext,
    invitation_id: &InvitationId,
) -> Result<Transition, InvitationError> {
    pending(y, invitation_id)?;

    debug!(invitation = %invitation_id, "reject invitation");

    Ok(Transition::new().with(Change::SetInvitationStatus {
        invitation_id: invitation_id.clone(),
        status: InvitationStatus::Rejected,
    }))
}

/// Mark every pending invitation past its expiry as expired.
pub fn expire_invitations(y: &GroupContext) -> Transition {
    y.invitations
        .iter()
        .filter(|invitation| invitation.is_pending() && invitation.is_expired_at(y.as_of))
        .map(|invitation| {
            debug!(invitation = %invitation.id, "expire invitation");
            Change::SetInvitationStatus {
                invitation_id: invitation.id.clone(),
                status: InvitationStatus::Expired,
            }
        })
        .collect()
}

/// Remove a member from the group. No-op if they are not a member.
pub fn leave(y: &GroupContext, member_id: &MemberId) -> Transition {
    if y.member(member_id).is_none() {
        return Transition::new();
    }

    debug!(member = %member_id, "leave group");

    Transition::new().with(Change::RemoveMember(member_id.clone()))
}
