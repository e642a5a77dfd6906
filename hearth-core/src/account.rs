// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account kinds and their relationships.
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::ids::AccountId;
use crate::member::Member;

/// The closed set of account kinds a member can have.
///
/// Parent shadow accounts exist inside a group purely to supervise one linked kid account, which
/// is why the pairing is part of the variant rather than an optional field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccountKind {
    Adult,
    Kid,
    ParentShadow { paired_kid_id: AccountId },
}

impl Display for AccountKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountKind::Adult => "adult",
            AccountKind::Kid => "kid",
            AccountKind::ParentShadow { .. } => "parent shadow",
        };

        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    pub id: AccountId,
    pub kind: AccountKind,
    pub username: String,
    pub display_name: String,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, kind: AccountKind, username: &str) -> Self {
        Self {
            id: id.into(),
            kind,
            username: username.to_owned(),
            display_name: username.to_owned(),
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_owned();
        self
    }

    pub fn is_adult(&self) -> bool {
        matches!(self.kind, AccountKind::Adult)
    }

    pub fn is_kid(&self) -> bool {
        matches!(self.kind, AccountKind::Kid)
    }

    pub fn is_parent_shadow(&self) -> bool {
        matches!(self.kind, AccountKind::ParentShadow { .. })
    }

    /// Return the id of the kid account a parent shadow is paired with.
    pub fn paired_kid_id(&self) -> Option<&AccountId> {
        match &self.kind {
            AccountKind::ParentShadow { paired_kid_id } => Some(paired_kid_id),
            _ => None,
        }
    }

    /// Check the account on its own.
    ///
    /// A parent shadow must reference a kid account other than itself.
    pub fn validate(&self) -> Result<(), AccountError> {
        if let AccountKind::ParentShadow { paired_kid_id } = &self.kind {
            if paired_kid_id.is_empty() || paired_kid_id == &self.id {
                return Err(AccountError::InvalidAccountKind {
                    account: self.id.clone(),
                    reason: InvalidKindReason::UnpairedShadow,
                });
            }
        }

        Ok(())
    }
}

/// Check an account together with the membership record it backs.
///
/// Kid accounts never hold a role directly.
pub fn validate_member(account: &Account, member: &Member) -> Result<(), AccountError> {
    account.validate()?;

    if account.is_kid() && member.assigned_role_id.is_some() {
        return Err(AccountError::InvalidAccountKind {
            account: account.id.clone(),
            reason: InvalidKindReason::KidWithRole,
        });
    }

    Ok(())
}

/// Look up the kid account a parent shadow is paired with.
///
/// Returns `None` when the account is not a parent shadow, when the paired account is unknown,
/// or when the paired account is not a kid.
pub fn pair_kid_for<'a>(
    parent_shadow: &Account,
    accounts: &'a HashMap<AccountId, Account>,
) -> Option<&'a Account> {
    let kid_id = parent_shadow.paired_kid_id()?;
    accounts.get(kid_id).filter(|account| account.is_kid())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidKindReason {
    KidWithRole,
    UnpairedShadow,
}

impl Display for InvalidKindReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvalidKindReason::KidWithRole => "kid accounts cannot hold a role",
            InvalidKindReason::UnpairedShadow => "parent shadow account is not paired with a kid",
        };

        write!(f, "{}", s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("invalid account kind for {account}: {reason}")]
    InvalidAccountKind {
        account: AccountId,
        reason: InvalidKindReason,
    },
}
