// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembling group contexts from concurrent store reads.
use std::collections::HashMap;
use std::error::Error;

use futures_util::future::try_join_all;
use hearth_core::{
    Account, AccountId, Change, GroupContext, GroupId, Member, Timestamp, Topic,
};
use hearth_store::GroupStore;
use tracing::{debug, warn};

use crate::error::{EngineError, Input};

/// Attaches the requested input to a failed store read.
pub(crate) async fn tagged<T, E>(
    input: Input,
    read: impl Future<Output = Result<T, E>>,
) -> Result<T, EngineError<E>>
where
    E: Error + 'static,
{
    read.await
        .map_err(|source| EngineError::Fetch { input, source })
}

/// Records of a group together with the writes repairing malformed ones.
#[derive(Debug)]
pub(crate) struct Fetched {
    /// Normalised records.
    pub context: GroupContext,

    /// Writes which bring the stored records in line with `context`.
    pub repairs: Vec<Change>,
}

/// Fetches all records of a group.
///
/// Every list is requested concurrently. The first failing read aborts the whole fetch, no
/// context is ever assembled from a partial set of inputs.
pub(crate) async fn fetch_context<S>(
    store: &S,
    group_id: &GroupId,
) -> Result<Fetched, EngineError<S::Error>>
where
    S: GroupStore,
    S::Error: 'static,
{
    let (accounts, mut members, roles, subgroups, main_topics, role_assignments, invitations) =
        tokio::try_join!(
            tagged(Input::Accounts, store.accounts(group_id)),
            tagged(Input::Members(None), store.members(group_id, None)),
            tagged(Input::Roles, store.roles(group_id)),
            tagged(Input::Subgroups, store.subgroups(group_id)),
            tagged(Input::Topics(None), store.topics(group_id, None)),
            tagged(Input::RoleAssignments, store.role_assignments(group_id)),
            tagged(Input::Invitations, store.invitations(group_id)),
        )?;

    let subgroup_topics = try_join_all(subgroups.iter().map(|subgroup| {
        tagged(
            Input::Topics(Some(subgroup.id.clone())),
            store.topics(group_id, Some(&subgroup.id)),
        )
    }))
    .await?;

    let mut topics = main_topics;
    topics.extend(subgroup_topics.into_iter().flatten());

    let mut repairs = normalize_members(&accounts, &mut members);
    repairs.extend(normalize_topics(&mut topics));

    let mut y = GroupContext::new(group_id.clone(), Timestamp::now());
    y.members = members;
    y.topics = topics;
    y.accounts = accounts;
    y.roles = roles;
    y.subgroups = subgroups;
    y.role_assignments = role_assignments;
    y.invitations = invitations;

    debug!(
        group = %group_id,
        members = y.members.len(),
        roles = y.roles.len(),
        topics = y.topics.len(),
        repairs = repairs.len(),
        "fetched group context"
    );

    Ok(Fetched {
        context: y,
        repairs,
    })
}

/// Clears the global-audience flag of subgroup topics.
pub(crate) fn normalize_topics(topics: &mut [Topic]) -> Vec<Change> {
    let mut repairs = Vec::new();
    for topic in topics.iter_mut() {
        if topic.is_global_audience && !topic.is_main_group() {
            warn!(topic = %topic.id, "subgroup topic flagged as global audience, ignoring flag");
            topic.is_global_audience = false;
            repairs.push(Change::SetTopicGlobalAudience {
                topic_id: topic.id.clone(),
                is_global: false,
            });
        }
    }
    repairs
}

/// Drops custom roles held by kid accounts.
pub(crate) fn normalize_members(
    accounts: &HashMap<AccountId, Account>,
    members: &mut [Member],
) -> Vec<Change> {
    let mut repairs = Vec::new();
    for member in members.iter_mut() {
        let is_kid = accounts
            .get(&member.account_id)
            .is_some_and(|account| account.is_kid());
        if is_kid && member.assigned_role_id.is_some() {
            warn!(member = %member.id, "kid account holds a role, ignoring role");
            member.assigned_role_id = None;
            repairs.push(Change::SetMemberRole {
                member_id: member.id.clone(),
                role_id: None,
            });
        }
    }
    repairs
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use hearth_core::test_utils::TestGroup;
    use hearth_core::{Change, MemberId, Topic, TopicId};

    use super::{normalize_members, normalize_topics};

    #[test]
    fn normalize_malformed_records() {
        let y = TestGroup::new("g")
            .subgroup("a")
            .role("r", &[])
            .adult("ada")
            .kid("kai")
            .holds("ada", "r")
            .build();

        // Records coming from the store may violate invariants the builder enforces.
        let mut members = y.members.clone();
        for member in members.iter_mut() {
            member.assigned_role_id = Some("r".into());
        }
        let repairs = normalize_members(&y.accounts, &mut members);
        let ada = members.iter().find(|m| m.id == MemberId::new("ada"));
        let kai = members.iter().find(|m| m.id == MemberId::new("kai"));
        assert!(ada.is_some_and(|m| m.assigned_role_id.is_some()));
        assert!(kai.is_some_and(|m| m.assigned_role_id.is_none()));
        assert_matches!(
            repairs.as_slice(),
            [Change::SetMemberRole { member_id, role_id: None }] if member_id.as_str() == "kai"
        );

        let mut homework =
            Topic::new("homework".into(), y.group_id.clone(), "Homework").in_subgroup("a".into());
        homework.is_global_audience = true;
        let welcome = Topic::new("welcome".into(), y.group_id.clone(), "Welcome").global();
        let mut topics = vec![homework, welcome];
        let repairs = normalize_topics(&mut topics);
        assert!(!topics[0].is_global_audience);
        assert!(topics[1].is_global_audience);
        assert_eq!(topics[1].id, TopicId::new("welcome"));
        assert_eq!(repairs.len(), 1);
    }
}
