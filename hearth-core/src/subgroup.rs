// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::ids::{GroupId, SubgroupId};

/// A nested unit inside a group, for example a class or a family circle.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subgroup {
    pub id: SubgroupId,
    pub group_id: GroupId,
    pub name: String,
    pub is_active: bool,
}

impl Subgroup {
    pub fn new(id: SubgroupId, group_id: GroupId, name: &str) -> Self {
        Self {
            id,
            group_id,
            name: name.to_owned(),
            is_active: true,
        }
    }
}
