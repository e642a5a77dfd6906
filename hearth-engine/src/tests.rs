// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use hearth_auth::{Action, Decision, DenyReason, InvitationError, InvitationRequest, RoleError};
use hearth_core::test_utils::TestGroup;
use hearth_core::{
    Account, AccountId, AccountKind, Capability, GroupId, Invitation, InvitationId,
    InvitationStatus, Member, MemberId, Role, RoleAssignment, RoleId, Scope, Subgroup,
    SubgroupId, Timestamp, Topic, TopicId,
};
use hearth_store::{GroupStore, MemoryStore, MemoryStoreError};
use tokio::sync::Notify;

use crate::{Engine, EngineConfig, EngineError, Input, Session};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

async fn engine_with(group: TestGroup) -> (Engine<MemoryStore>, GroupId) {
    setup_logging();
    let group_id = group.group_id();
    let store = MemoryStore::new();
    store.insert_group(group.build()).await;
    (Engine::new(store, EngineConfig::default()), group_id)
}

/// Role "r" held by two members and attached to two subgroups.
fn cascade_group() -> TestGroup {
    TestGroup::new("g")
        .subgroup("s1")
        .subgroup("s2")
        .role("r", &[Capability::ManageSubgroups])
        .adult("ada")
        .adult("bob")
        .holds("ada", "r")
        .holds("bob", "r")
        .assign_role("r", "s1")
        .assign_role("r", "s2")
}

#[tokio::test]
async fn fourth_moderator_is_rejected() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .role("moderator", &[Capability::ModerateContent])
            .adult("ada")
            .adult("bob")
            .adult("cat")
            .adult("dan")
            .holds("ada", "moderator")
            .holds("bob", "moderator")
            .holds("cat", "moderator"),
    )
    .await;
    let moderator = RoleId::new("moderator");

    let result = engine
        .assign_member_to_role(&group_id, &moderator, &MemberId::new("dan"))
        .await;
    assert_matches!(
        result,
        Err(EngineError::Role(RoleError::RoleCapacityExceeded { max: 3, .. }))
    );

    // Assigning a current holder again changes nothing.
    engine
        .assign_member_to_role(&group_id, &moderator, &MemberId::new("ada"))
        .await
        .unwrap();

    let capacity = engine.role_capacity(&group_id, &moderator).await.unwrap();
    assert_eq!(capacity.assigned, 3);
    assert!(capacity.is_full());

    let y = engine.store().group(&group_id).await.unwrap();
    let holders: Vec<&str> = y.assignees(&moderator).map(|m| m.id.as_str()).collect();
    assert_eq!(holders, vec!["ada", "bob", "cat"]);
}

#[tokio::test]
async fn kid_cannot_hold_role() {
    let (engine, group_id) =
        engine_with(TestGroup::new("g").role("r", &[]).kid("kai")).await;

    let result = engine
        .assign_member_to_role(&group_id, &RoleId::new("r"), &MemberId::new("kai"))
        .await;
    assert_matches!(
        result,
        Err(EngineError::Role(RoleError::KidAccountCannotHoldRole(_)))
    );

    let y = engine.store().group(&group_id).await.unwrap();
    assert!(y.member(&MemberId::new("kai")).unwrap().assigned_role_id.is_none());
}

#[tokio::test]
async fn global_topic_visible_in_every_subgroup() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .subgroup("a")
            .subgroup("b")
            .global_topic("welcome")
            .topic("news")
            .subgroup_topic("homework", "a"),
    )
    .await;

    for subgroup in ["a", "b"] {
        let scope = Scope::Subgroup(SubgroupId::new(subgroup));
        let topics = engine.resolve_visible_topics(&group_id, &scope).await.unwrap();
        let welcome = topics
            .iter()
            .filter(|topic| topic.id == TopicId::new("welcome"))
            .count();
        assert_eq!(welcome, 1);
        assert!(topics.iter().all(|topic| topic.id != TopicId::new("news")));
    }

    let scope = Scope::Subgroup(SubgroupId::new("a"));
    let topics = engine.resolve_visible_topics(&group_id, &scope).await.unwrap();
    assert_eq!(topics.len(), 2);

    // Withdrawing the flag drops the topic from every subgroup.
    engine
        .set_topic_global_audience(&group_id, &TopicId::new("welcome"), false)
        .await
        .unwrap();
    let scope = Scope::Subgroup(SubgroupId::new("b"));
    let topics = engine.resolve_visible_topics(&group_id, &scope).await.unwrap();
    assert!(topics.is_empty());
}

#[tokio::test]
async fn restricted_member_denied_in_main_group() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .subgroup("s1")
            .restricted_adult("sam", "s1"),
    )
    .await;
    let sam = MemberId::new("sam");

    let decision = engine
        .authorize(&group_id, &sam, Action::ViewMembers, &Scope::MainGroup)
        .await
        .unwrap();
    assert_matches!(
        &decision,
        Decision::Denied(DenyReason::RestrictedToSubgroup(id)) if id == &SubgroupId::new("s1")
    );
    assert_eq!(decision.reason().unwrap().to_string(), "restricted to subgroup");

    let scope = Scope::Subgroup(SubgroupId::new("s1"));
    let decision = engine
        .authorize(&group_id, &sam, Action::ViewMembers, &scope)
        .await
        .unwrap();
    assert!(decision.is_allowed());

    // Capabilities agree with the decisions above.
    let capabilities = engine
        .resolve_capabilities(&group_id, &sam, &Scope::MainGroup)
        .await
        .unwrap();
    assert!(capabilities.is_empty());
    let capabilities = engine
        .resolve_capabilities(&group_id, &sam, &scope)
        .await
        .unwrap();
    assert!(capabilities.contains(Capability::ViewMembers));
}

#[tokio::test]
async fn delete_role_cascades() {
    let (engine, group_id) = engine_with(cascade_group()).await;
    let r = RoleId::new("r");

    assert_eq!(engine.role_capacity(&group_id, &r).await.unwrap().assigned, 2);

    engine.delete_role(&group_id, &r).await.unwrap();

    let y = engine.store().group(&group_id).await.unwrap();
    assert!(y.role(&r).is_none());
    for member in ["ada", "bob"] {
        let member = y.member(&MemberId::new(member)).unwrap();
        assert!(member.assigned_role_id.is_none());
    }
    assert!(y.role_assignments.iter().all(|a| a.role_id != r));

    // Cached capacity was invalidated with the role.
    assert_matches!(
        engine.role_capacity(&group_id, &r).await,
        Err(EngineError::Role(RoleError::UnknownEntity(_)))
    );
}

#[tokio::test]
async fn delete_role_refreshes_membership() {
    let (engine, group_id) = engine_with(cascade_group()).await;

    let tree = engine.resolve_membership(&group_id, None).await.unwrap();
    let holders = tree
        .residual
        .iter()
        .filter(|residual| residual.member.assigned_role_id.is_some())
        .count();
    assert_eq!(holders, 2);

    engine.delete_role(&group_id, &RoleId::new("r")).await.unwrap();

    let tree = engine.resolve_membership(&group_id, None).await.unwrap();
    assert_eq!(tree.residual.len(), 2);
    assert!(
        tree.residual
            .iter()
            .all(|residual| residual.member.assigned_role_id.is_none())
    );
}

#[tokio::test]
async fn delete_role_clears_kid_records() {
    // Stored kid record still names the role, which reads never expose.
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .role("r", &[])
            .adult("ada")
            .kid("kai")
            .holds("ada", "r")
            .holds("kai", "r"),
    )
    .await;
    let r = RoleId::new("r");
    let kai = MemberId::new("kai");

    let y = engine.context(&group_id).await.unwrap();
    assert!(y.member(&kai).unwrap().assigned_role_id.is_none());

    engine.delete_role(&group_id, &r).await.unwrap();

    let y = engine.store().group(&group_id).await.unwrap();
    assert!(y.role(&r).is_none());
    assert!(y.member(&kai).unwrap().assigned_role_id.is_none());
    assert!(y.member(&MemberId::new("ada")).unwrap().assigned_role_id.is_none());
}

#[tokio::test]
async fn concurrent_assignments_respect_capacity() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .role("moderator", &[Capability::ModerateContent])
            .adult("ada")
            .adult("bob")
            .adult("cat")
            .adult("dan")
            .holds("ada", "moderator")
            .holds("bob", "moderator"),
    )
    .await;
    let moderator = RoleId::new("moderator");
    let cat = MemberId::new("cat");
    let dan = MemberId::new("dan");

    let (first, second) = tokio::join!(
        engine.assign_member_to_role(&group_id, &moderator, &cat),
        engine.assign_member_to_role(&group_id, &moderator, &dan),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(EngineError::Role(RoleError::RoleCapacityExceeded { max: 3, .. }))
    )));

    let y = engine.store().group(&group_id).await.unwrap();
    assert_eq!(y.assignees(&moderator).count(), 3);
}

#[tokio::test]
async fn expired_assignment_stops_applying() {
    let expires_at = Timestamp::now().saturating_add(Duration::from_secs(2));
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .subgroup("a")
            .role("coach", &[Capability::ManageSubgroups])
            .adult("ada")
            .holds("ada", "coach")
            .assignment(RoleAssignment {
                expires_at: Some(expires_at),
                ..RoleAssignment::new(RoleId::new("coach"), SubgroupId::new("a"))
            }),
    )
    .await;
    let ada = MemberId::new("ada");
    let in_a = Scope::Subgroup(SubgroupId::new("a"));

    let capabilities = engine
        .resolve_capabilities(&group_id, &ada, &in_a)
        .await
        .unwrap();
    assert!(capabilities.contains(Capability::ManageSubgroups));

    tokio::time::sleep(Duration::from_secs(3)).await;

    let capabilities = engine
        .resolve_capabilities(&group_id, &ada, &in_a)
        .await
        .unwrap();
    assert!(!capabilities.contains(Capability::ManageSubgroups));
    let decision = engine
        .authorize(&group_id, &ada, Action::ManageSubgroups, &in_a)
        .await
        .unwrap();
    assert!(!decision.is_allowed());
}

#[tokio::test]
async fn failed_write_rolls_back_cascade() {
    let (engine, group_id) = engine_with(cascade_group()).await;
    let r = RoleId::new("r");
    let before = engine.store().group(&group_id).await.unwrap();

    // The cascade needs five writes.
    engine.store().fail_after(3);
    let result = engine.delete_role(&group_id, &r).await;
    assert_matches!(result, Err(EngineError::Store(MemoryStoreError::WriteRejected)));
    assert_eq!(engine.store().group(&group_id).await.unwrap(), before);

    let capacity = engine.role_capacity(&group_id, &r).await.unwrap();
    assert_eq!(capacity.assigned, 2);

    engine.store().fail_after(usize::MAX);
    engine.delete_role(&group_id, &r).await.unwrap();
    assert!(engine.store().group(&group_id).await.unwrap().role(&r).is_none());
}

#[tokio::test]
async fn role_changes_invalidate_capabilities() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .subgroup("a")
            .role("coach", &[Capability::ManageSubgroups])
            .adult("ada"),
    )
    .await;
    let ada = MemberId::new("ada");
    let coach = RoleId::new("coach");
    let in_a = Scope::Subgroup(SubgroupId::new("a"));

    let capabilities = engine
        .resolve_capabilities(&group_id, &ada, &Scope::MainGroup)
        .await
        .unwrap();
    assert!(!capabilities.contains(Capability::ManageSubgroups));

    engine
        .assign_member_to_role(&group_id, &coach, &ada)
        .await
        .unwrap();
    let capabilities = engine
        .resolve_capabilities(&group_id, &ada, &Scope::MainGroup)
        .await
        .unwrap();
    assert!(capabilities.contains(Capability::ManageSubgroups));

    // The role only applies in subgroups it is assigned to.
    let capabilities = engine
        .resolve_capabilities(&group_id, &ada, &in_a)
        .await
        .unwrap();
    assert!(!capabilities.contains(Capability::ManageSubgroups));

    engine
        .assign_role_to_subgroup(&group_id, &coach, &SubgroupId::new("a"), None, None)
        .await
        .unwrap();
    let capabilities = engine
        .resolve_capabilities(&group_id, &ada, &in_a)
        .await
        .unwrap();
    assert!(capabilities.contains(Capability::ManageSubgroups));

    let capabilities = engine
        .resolve_capabilities(&group_id, &MemberId::new("ghost"), &in_a)
        .await
        .unwrap();
    assert!(capabilities.is_empty());
}

#[tokio::test]
async fn create_and_update_roles() {
    let (engine, group_id) = engine_with(TestGroup::new("g").adult("ada")).await;
    let role = Role::new(
        RoleId::new("helper"),
        group_id.clone(),
        "Helper",
        [Capability::Post].into_iter().collect(),
    );

    engine.create_role(&group_id, role.clone()).await.unwrap();
    assert_matches!(
        engine.create_role(&group_id, role.clone()).await,
        Err(EngineError::Role(RoleError::DuplicateRole(_)))
    );

    let mut wider = role.clone();
    wider.max_assignees = 10;
    assert_matches!(
        engine.update_role(&group_id, wider).await,
        Err(EngineError::Role(RoleError::InvalidCapacity { requested: 10, .. }))
    );

    let renamed = role.with_alias("Buddy");
    engine.update_role(&group_id, renamed).await.unwrap();
    let y = engine.context(&group_id).await.unwrap();
    assert_eq!(y.role(&RoleId::new("helper")).unwrap().display_name(), "Buddy");
}

#[tokio::test]
async fn subgroup_assignment_updates() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .subgroup("a")
            .role("r", &[]),
    )
    .await;
    let r = RoleId::new("r");
    let a = SubgroupId::new("a");

    engine
        .assign_role_to_subgroup(&group_id, &r, &a, None, None)
        .await
        .unwrap();
    assert_matches!(
        engine.assign_role_to_subgroup(&group_id, &r, &a, None, None).await,
        Err(EngineError::Role(RoleError::DuplicateAssignment(_, _)))
    );

    let notes = Some("weekend shifts".to_string());
    engine
        .update_role_assignment(&group_id, &r, &a, notes.clone(), None)
        .await
        .unwrap();
    let y = engine.store().group(&group_id).await.unwrap();
    assert_eq!(y.assignment(&r, &a).unwrap().notes, notes);

    engine.remove_role_from_subgroup(&group_id, &r, &a).await.unwrap();
    engine.remove_role_from_subgroup(&group_id, &r, &a).await.unwrap();
    let y = engine.store().group(&group_id).await.unwrap();
    assert!(y.assignment(&r, &a).is_none());
}

#[tokio::test]
async fn subgroup_topics_are_never_global() {
    let (engine, group_id) = engine_with(TestGroup::new("g").subgroup("a")).await;

    let topic = Topic::new("homework".into(), group_id.clone(), "Homework")
        .in_subgroup(SubgroupId::new("a"))
        .global();
    assert_matches!(
        engine.create_topic(&group_id, topic).await,
        Err(EngineError::Topic(_))
    );

    let topic = Topic::new("homework".into(), group_id.clone(), "Homework")
        .in_subgroup(SubgroupId::new("a"));
    engine.create_topic(&group_id, topic).await.unwrap();
    assert_matches!(
        engine
            .set_topic_global_audience(&group_id, &TopicId::new("homework"), true)
            .await,
        Err(EngineError::Topic(_))
    );

    let y = engine.store().group(&group_id).await.unwrap();
    assert!(y.topics.iter().all(|topic| !topic.is_global_audience));
}

#[tokio::test]
async fn kid_invitation_restricts_membership() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .subgroup("a")
            .account(Account::new("kai", AccountKind::Kid, "kai")),
    )
    .await;
    let invitation_id = InvitationId::new("inv");

    let request = InvitationRequest::new("inv", "kai").to_subgroup(SubgroupId::new("a"));
    engine.invite(&group_id, request).await.unwrap();
    engine
        .accept_invitation(&group_id, &invitation_id)
        .await
        .unwrap();

    let member_id = MemberId::for_account(&group_id, &AccountId::new("kai"));
    let y = engine.store().group(&group_id).await.unwrap();
    let member = y.member(&member_id).unwrap();
    assert_eq!(member.restricted_to_subgroup_id, Some(SubgroupId::new("a")));
    assert_eq!(
        y.invitation(&invitation_id).unwrap().status,
        InvitationStatus::Accepted
    );

    let tree = engine
        .resolve_membership(&group_id, Some(&SubgroupId::new("a")))
        .await
        .unwrap();
    assert_eq!(tree.len(), 1);

    // Leaving twice is fine.
    engine.leave_group(&group_id, &member_id).await.unwrap();
    engine.leave_group(&group_id, &member_id).await.unwrap();
    let tree = engine
        .resolve_membership(&group_id, Some(&SubgroupId::new("a")))
        .await
        .unwrap();
    assert!(tree.is_empty());
}

#[tokio::test]
async fn expired_invitation_is_marked() {
    setup_logging();
    let store = MemoryStore::new();
    let group = TestGroup::new("g").account(Account::new("eve", AccountKind::Adult, "eve"));
    let group_id = group.group_id();
    store.insert_group(group.build()).await;

    let config = EngineConfig::new().with_invitation_lifetime(Duration::ZERO);
    let engine = Engine::new(store, config);
    let invitation_id = InvitationId::new("inv");

    engine
        .invite(&group_id, InvitationRequest::new("inv", "eve"))
        .await
        .unwrap();
    assert_matches!(
        engine.accept_invitation(&group_id, &invitation_id).await,
        Err(EngineError::Invitation(InvitationError::Expired(_)))
    );

    let y = engine.store().group(&group_id).await.unwrap();
    assert_eq!(
        y.invitation(&invitation_id).unwrap().status,
        InvitationStatus::Expired
    );
    assert!(y.member_by_account(&AccountId::new("eve")).is_none());

    assert_matches!(
        engine.reject_invitation(&group_id, &invitation_id).await,
        Err(EngineError::Invitation(InvitationError::NotPending(_, _)))
    );
}

#[tokio::test]
async fn failed_fetch_names_its_input() {
    let (engine, _) = engine_with(TestGroup::new("g")).await;

    let result = engine.resolve_membership(&GroupId::new("nope"), None).await;
    assert_matches!(
        result,
        Err(EngineError::Fetch {
            input: Input::Accounts,
            source: MemoryStoreError::UnknownGroup(_),
        })
    );
}

#[tokio::test]
async fn refresh_picks_up_external_changes() {
    let (engine, group_id) = engine_with(TestGroup::new("g").adult("ada")).await;

    let tree = engine.resolve_membership(&group_id, None).await.unwrap();
    assert_eq!(tree.len(), 1);

    // Written past the engine.
    engine
        .store()
        .insert_group(TestGroup::new("g").adult("ada").adult("bob").build())
        .await;
    let tree = engine.resolve_membership(&group_id, None).await.unwrap();
    assert_eq!(tree.len(), 1);

    engine.refresh(&group_id).await;
    let tree = engine.resolve_membership(&group_id, None).await.unwrap();
    assert_eq!(tree.len(), 2);
}

/// Store whose member reads for one subgroup block until released.
struct GatedStore {
    inner: MemoryStore,
    gated: SubgroupId,
    gate: Arc<Notify>,
}

impl GroupStore for GatedStore {
    type Error = MemoryStoreError;

    async fn accounts(
        &self,
        group_id: &GroupId,
    ) -> Result<HashMap<AccountId, Account>, Self::Error> {
        self.inner.accounts(group_id).await
    }

    async fn members(
        &self,
        group_id: &GroupId,
        subgroup_id: Option<&SubgroupId>,
    ) -> Result<Vec<Member>, Self::Error> {
        if subgroup_id == Some(&self.gated) {
            self.gate.notified().await;
        }
        self.inner.members(group_id, subgroup_id).await
    }

    async fn roles(&self, group_id: &GroupId) -> Result<Vec<Role>, Self::Error> {
        self.inner.roles(group_id).await
    }

    async fn subgroups(&self, group_id: &GroupId) -> Result<Vec<Subgroup>, Self::Error> {
        self.inner.subgroups(group_id).await
    }

    async fn topics(
        &self,
        group_id: &GroupId,
        subgroup_id: Option<&SubgroupId>,
    ) -> Result<Vec<Topic>, Self::Error> {
        self.inner.topics(group_id, subgroup_id).await
    }

    async fn role_assignments(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<RoleAssignment>, Self::Error> {
        self.inner.role_assignments(group_id).await
    }

    async fn invitations(&self, group_id: &GroupId) -> Result<Vec<Invitation>, Self::Error> {
        self.inner.invitations(group_id).await
    }
}

#[tokio::test]
async fn superseded_switch_is_dropped() {
    setup_logging();
    let group = TestGroup::new("g")
        .subgroup("a")
        .subgroup("b")
        .adult_in("ada", "a")
        .adult_in("bob", "b")
        .global_topic("welcome")
        .subgroup_topic("homework", "b");
    let group_id = group.group_id();
    let inner = MemoryStore::new();
    inner.insert_group(group.build()).await;

    let gate = Arc::new(Notify::new());
    let store = GatedStore {
        inner,
        gated: SubgroupId::new("a"),
        gate: gate.clone(),
    };
    let session = Session::new(&store, group_id);

    let (first, second) = tokio::join!(
        session.switch_to(Scope::Subgroup(SubgroupId::new("a"))),
        async {
            // Wait until the switch to "a" is blocked on its member list.
            while !session.is_switching() {
                tokio::task::yield_now().await;
            }
            let view = session.switch_to(Scope::Subgroup(SubgroupId::new("b"))).await;
            gate.notify_one();
            view
        }
    );

    assert_matches!(first, Err(EngineError::StaleContext));
    let second = second.unwrap();
    assert_eq!(second.token.as_u64(), 2);
    assert!(!session.is_switching());

    let current = session.current().await.unwrap();
    assert_eq!(current, second);
    assert_eq!(current.scope, Scope::Subgroup(SubgroupId::new("b")));
    assert_eq!(current.members.len(), 1);
    let topics: Vec<&str> = current.topics.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(topics, vec!["homework", "welcome"]);
}

#[tokio::test]
async fn engine_session_switches() {
    let (engine, group_id) = engine_with(
        TestGroup::new("g")
            .subgroup("a")
            .adult("ada")
            .adult_in("bob", "a")
            .topic("news"),
    )
    .await;

    let session = engine.session(&group_id);
    assert!(session.current().await.is_none());

    let main = session.switch_to(Scope::MainGroup).await.unwrap();
    assert_eq!(main.members.len(), 2);
    assert_eq!(main.topics.len(), 1);

    let sub = session
        .switch_to(Scope::Subgroup(SubgroupId::new("a")))
        .await
        .unwrap();
    assert!(sub.token > main.token);
    assert_eq!(sub.members.len(), 1);
    assert!(sub.topics.is_empty());
    assert_eq!(session.current().await.unwrap(), sub);
}
