// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic audiences.
//!
//! A main-group topic flagged as global audience shows up in every subgroup. It stays a single
//! record: subgroup views borrow it from the same list instead of holding copies, so edits to it
//! are visible everywhere at once.
use hearth_core::{
    Change, Entity, GroupContext, Scope, Topic, TopicId, TopicStatus, Transition, UnknownEntity,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("only main-group topics can have a global audience: {0}")]
    InvalidGlobalAudienceFlag(TopicId),

    #[error("topic already exists: {0}")]
    DuplicateTopic(TopicId),

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntity),
}

/// Topics visible inside a scope.
///
/// The main group sees its own topics. A subgroup sees its own topics followed by the global
/// audience topics of the main group, both in creation order.
pub fn visible_topics<'a>(topics: &'a [Topic], scope: &Scope) -> Vec<&'a Topic> {
    match scope {
        Scope::MainGroup => topics.iter().filter(|topic| topic.is_main_group()).collect(),
        Scope::Subgroup(subgroup_id) => {
            let local = topics
                .iter()
                .filter(|topic| topic.subgroup_id.as_ref() == Some(subgroup_id));
            let global = topics
                .iter()
                .filter(|topic| topic.is_main_group() && topic.is_global_audience);
            local.chain(global).collect()
        }
    }
}

fn unknown_topic(topic_id: &TopicId) -> TopicError {
    TopicError::UnknownEntity(UnknownEntity(Entity::Topic(topic_id.clone())))
}

/// Toggle whether a main-group topic is shown in every subgroup.
pub fn set_global_audience(
    y: &GroupContext,
    topic_id: &TopicId,
    is_global: bool,
) -> Result<Transition, TopicError> {
    let topic = y.topic(topic_id).ok_or_else(|| unknown_topic(topic_id))?;

    if !topic.is_main_group() {
        return Err(TopicError::InvalidGlobalAudienceFlag(topic_id.clone()));
    }

    if topic.is_global_audience == is_global {
        return Ok(Transition::new());
    }

    debug!(topic = %topic_id, is_global, "set global audience");

    Ok(Transition::new().with(Change::SetTopicGlobalAudience {
        topic_id: topic_id.clone(),
        is_global,
    }))
}

pub fn create_topic(y: &GroupContext, topic: Topic) -> Result<Transition, TopicError> {
    if y.topic(&topic.id).is_some() {
        return Err(TopicError::DuplicateTopic(topic.id));
    }

    if let Some(subgroup_id) = &topic.subgroup_id {
        if topic.is_global_audience {
            return Err(TopicError::InvalidGlobalAudienceFlag(topic.id));
        }

        if y.subgroup(subgroup_id).is_none() {
            return Err(TopicError::UnknownEntity(UnknownEntity(Entity::Subgroup(
                subgroup_id.clone(),
            ))));
        }
    }

    debug!(
        topic = %topic.id,
        subgroup = ?topic.subgroup_id,
        is_global = topic.is_global_audience,
        "create topic"
    );

    Ok(Transition::new().with(Change::PutTopic(topic)))
}

/// Pause, archive or reopen a topic.
pub fn set_topic_status(
    y: &GroupContext,
    topic_id: &TopicId,
    status: TopicStatus,
) -> Result<Transition, TopicError> {
    let topic = y.topic(topic_id).ok_or_else(|| unknown_topic(topic_id))?;

    if topic.status == status {
        return Ok(Transition::new());
    }

    debug!(topic = %topic_id, %status, "set topic status");

    Ok(Transition::new().with(Change::PutTopic(topic.clone().with_status(status))))
}
