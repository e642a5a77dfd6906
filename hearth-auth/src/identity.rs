// SPDX-License-Identifier: MIT OR Apache-2.0

use hearth_core::{
    Account, AccountId, Entity, GroupContext, MemberId, RoleId, Scope, UnknownEntity,
};

use crate::roles::applicable_role;

/// Who a post or vote is shown as coming from.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PostingIdentity {
    /// A parent shadow acting for the kid it supervises.
    OnBehalfOfKid { parent: Account, kid: Account },

    /// A member acting as the custom role they hold.
    AsRole {
        role_id: RoleId,
        display_name: String,

        /// Set when the role is configured to reveal who is behind it.
        real_username: Option<String>,
    },

    AsMember {
        account_id: AccountId,
        display_name: String,
    },
}

impl PostingIdentity {
    pub fn display_name(&self) -> &str {
        match self {
            PostingIdentity::OnBehalfOfKid { kid, .. } => &kid.display_name,
            PostingIdentity::AsRole { display_name, .. } => display_name,
            PostingIdentity::AsMember { display_name, .. } => display_name,
        }
    }
}

/// Resolve the identity a member posts under in a scope.
///
/// Parent shadows post on behalf of their kid if that kid is a member of the group. Adults post
/// as the role which applies to them in the scope, otherwise as themselves.
pub fn posting_identity(
    y: &GroupContext,
    member_id: &MemberId,
    scope: &Scope,
) -> Result<PostingIdentity, UnknownEntity> {
    let member = y
        .member(member_id)
        .ok_or_else(|| UnknownEntity(Entity::Member(member_id.clone())))?;
    let account = y
        .account_for(member)
        .ok_or_else(|| UnknownEntity(Entity::Account(member.account_id.clone())))?;

    if let Some(kid_id) = account.paired_kid_id() {
        let kid = y
            .member_by_account(kid_id)
            .and_then(|kid_member| y.account_for(kid_member))
            .filter(|kid| kid.is_kid());
        if let Some(kid) = kid {
            return Ok(PostingIdentity::OnBehalfOfKid {
                parent: account.clone(),
                kid: kid.clone(),
            });
        }
    }

    if let Some(role) = applicable_role(y, member, scope) {
        return Ok(PostingIdentity::AsRole {
            role_id: role.id.clone(),
            display_name: role.display_name().to_owned(),
            real_username: role.show_real_username.then(|| account.username.clone()),
        });
    }

    Ok(PostingIdentity::AsMember {
        account_id: account.id.clone(),
        display_name: account.display_name.clone(),
    })
}
