// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discussion topics and who may post into them.
use std::fmt::{Display, Formatter};

use crate::ids::{GroupId, SubgroupId, TopicId};

/// Which kinds of authors may open a post in a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostingFlags {
    pub allow_member_posts: bool,
    pub allow_kid_posts: bool,
    pub allow_parent_posts: bool,
    pub allow_role_posts: bool,

    /// Only authors with the announcement capability may post.
    pub is_announcement_only: bool,
}

impl Default for PostingFlags {
    fn default() -> Self {
        Self {
            allow_member_posts: true,
            allow_kid_posts: true,
            allow_parent_posts: true,
            allow_role_posts: true,
            is_announcement_only: false,
        }
    }
}

impl PostingFlags {
    pub fn announcements() -> Self {
        Self {
            is_announcement_only: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TopicStatus {
    #[default]
    Active,
    Paused,
    Archived,
}

impl Display for TopicStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TopicStatus::Active => "active",
            TopicStatus::Paused => "paused",
            TopicStatus::Archived => "archived",
        };

        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topic {
    pub id: TopicId,
    pub group_id: GroupId,

    /// `None` for main-group topics.
    pub subgroup_id: Option<SubgroupId>,
    pub name: String,

    /// Main-group topic shown in every subgroup. Always `false` on subgroup topics.
    pub is_global_audience: bool,
    pub posting: PostingFlags,
    pub status: TopicStatus,
}

impl Topic {
    pub fn new(id: TopicId, group_id: GroupId, name: &str) -> Self {
        Self {
            id,
            group_id,
            subgroup_id: None,
            name: name.to_owned(),
            is_global_audience: false,
            posting: PostingFlags::default(),
            status: TopicStatus::default(),
        }
    }

    pub fn in_subgroup(mut self, subgroup_id: SubgroupId) -> Self {
        self.subgroup_id = Some(subgroup_id);
        self
    }

    pub fn global(mut self) -> Self {
        self.is_global_audience = true;
        self
    }

    pub fn with_posting(mut self, posting: PostingFlags) -> Self {
        self.posting = posting;
        self
    }

    pub fn with_status(mut self, status: TopicStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_main_group(&self) -> bool {
        self.subgroup_id.is_none()
    }

    pub fn is_open(&self) -> bool {
        self.status == TopicStatus::Active
    }
}
