// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};

use crate::ids::SubgroupId;

/// Context a query or action is evaluated in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scope {
    #[default]
    MainGroup,
    Subgroup(SubgroupId),
}

impl Scope {
    pub fn subgroup_id(&self) -> Option<&SubgroupId> {
        match self {
            Scope::MainGroup => None,
            Scope::Subgroup(id) => Some(id),
        }
    }

    pub fn is_main_group(&self) -> bool {
        matches!(self, Scope::MainGroup)
    }
}

impl From<Option<SubgroupId>> for Scope {
    fn from(value: Option<SubgroupId>) -> Self {
        match value {
            Some(id) => Scope::Subgroup(id),
            None => Scope::MainGroup,
        }
    }
}

impl From<SubgroupId> for Scope {
    fn from(value: SubgroupId) -> Self {
        Scope::Subgroup(value)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::MainGroup => write!(f, "main group"),
            Scope::Subgroup(id) => write!(f, "subgroup {id}"),
        }
    }
}
