// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single decision point for "may this member do that here".
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use hearth_core::{
    AccountKind, Capability, GroupContext, MemberId, Scope, ShadowAccess, SubgroupId, TopicId,
    TopicStatus,
};
use thiserror::Error;
use tracing::trace;

use crate::policy::Policy;
use crate::roles::{applicable_role, effective_capabilities};
use crate::topics::visible_topics;

/// Something a member asks to do within a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    ViewMembers,
    ViewTopics,
    Post,
    Comment,
    Vote,
    CreateTopics,
    PostAnnouncements,
    ModerateContent,
    InviteUsers,
    ManageMembers,
    ManageRoles,
    ManageSubgroups,
}

impl Action {
    pub fn required_capability(&self) -> Capability {
        match self {
            Action::ViewMembers => Capability::ViewMembers,
            Action::ViewTopics => Capability::ViewTopics,
            Action::Post => Capability::Post,
            Action::Comment => Capability::Comment,
            Action::Vote => Capability::Vote,
            Action::CreateTopics => Capability::CreateTopics,
            Action::PostAnnouncements => Capability::PostAnnouncements,
            Action::ModerateContent => Capability::ModerateContent,
            Action::InviteUsers => Capability::InviteUsers,
            Action::ManageMembers => Capability::ManageMembers,
            Action::ManageRoles => Capability::ManageRoles,
            Action::ManageSubgroups => Capability::ManageSubgroups,
        }
    }

    /// Actions which only look at the group.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Action::ViewMembers | Action::ViewTopics)
    }

    /// Actions kid accounts are denied whatever role or tier the records give them.
    pub fn is_denied_to_kids(&self) -> bool {
        matches!(
            self,
            Action::ManageMembers | Action::ManageRoles | Action::InviteUsers
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            Action::ViewMembers => "viewMembers",
            Action::ViewTopics => "viewTopics",
            Action::Post => "post",
            Action::Comment => "comment",
            Action::Vote => "vote",
            Action::CreateTopics => "createTopics",
            Action::PostAnnouncements => "postAnnouncements",
            Action::ModerateContent => "moderateContent",
            Action::InviteUsers => "inviteUsers",
            Action::ManageMembers => "manageMembers",
            Action::ManageRoles => "manageRoles",
            Action::ManageSubgroups => "manageSubgroups",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown action: {0}")]
pub struct UnknownAction(String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [
            Action::ViewMembers,
            Action::ViewTopics,
            Action::Post,
            Action::Comment,
            Action::Vote,
            Action::CreateTopics,
            Action::PostAnnouncements,
            Action::ModerateContent,
            Action::InviteUsers,
            Action::ManageMembers,
            Action::ManageRoles,
            Action::ManageSubgroups,
        ]
        .into_iter()
        .find(|action| action.as_str() == value)
        .ok_or_else(|| UnknownAction(value.to_owned()))
    }
}

/// Kind of author a topic's posting flags are checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Author {
    Member,
    Kid,
    Parent,
    Role,
}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Author::Member => "members",
            Author::Kid => "kids",
            Author::Parent => "parents",
            Author::Role => "roles",
        };

        write!(f, "{}", s)
    }
}

/// Why an action was denied. Renders as a message which can be shown to the member.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DenyReason {
    UnknownMember(MemberId),
    KidAccount(Action),
    RestrictedToSubgroup(SubgroupId),
    ReadOnlyAccess,
    MissingCapability(Capability),
    TopicNotVisible(TopicId),
    TopicClosed(TopicStatus),
    AnnouncementOnly,
    PostingNotAllowed(Author),
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::UnknownMember(_) => write!(f, "not a member of this group"),
            DenyReason::KidAccount(action) => {
                let what = match action {
                    Action::ManageMembers => "manage members",
                    Action::ManageRoles => "manage roles",
                    Action::InviteUsers => "invite users",
                    other => other.as_str(),
                };
                write!(f, "kid accounts cannot {what}")
            }
            DenyReason::RestrictedToSubgroup(_) => write!(f, "restricted to subgroup"),
            DenyReason::ReadOnlyAccess => write!(f, "read-only access in this subgroup"),
            DenyReason::MissingCapability(capability) => {
                write!(f, "missing permission to {capability}")
            }
            DenyReason::TopicNotVisible(_) => write!(f, "topic is not visible here"),
            DenyReason::TopicClosed(status) => write!(f, "topic is {status}"),
            DenyReason::AnnouncementOnly => write!(f, "topic is for announcements only"),
            DenyReason::PostingNotAllowed(author) => {
                write!(f, "posting is not allowed for {author} in this topic")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn reason(&self) -> Option<&DenyReason> {
        match self {
            Decision::Allowed => None,
            Decision::Denied(reason) => Some(reason),
        }
    }
}

/// Decide whether a member may perform an action in a scope.
///
/// Checks run in order of precedence and the first failing one decides:
///
/// 1. hard restrictions of the account kind (kids never manage members, roles or invitations)
/// 2. subgroup restriction of the member, then the access level of parent shadows
/// 3. capabilities of the role applying in the scope, or the member's baseline
pub fn authorize(
    y: &GroupContext,
    policy: &Policy,
    member_id: &MemberId,
    action: Action,
    scope: &Scope,
) -> Decision {
    let decision = decide(y, policy, member_id, action, scope);
    trace!(member = %member_id, %action, %scope, ?decision, "authorize");
    decision
}

fn decide(
    y: &GroupContext,
    policy: &Policy,
    member_id: &MemberId,
    action: Action,
    scope: &Scope,
) -> Decision {
    let Some((member, account)) = y
        .member(member_id)
        .and_then(|member| Some((member, y.account_for(member)?)))
    else {
        return Decision::Denied(DenyReason::UnknownMember(member_id.clone()));
    };

    if account.is_kid() && action.is_denied_to_kids() {
        return Decision::Denied(DenyReason::KidAccount(action));
    }

    if let Some(restricted_to) = &member.restricted_to_subgroup_id {
        if scope.subgroup_id() != Some(restricted_to) {
            return Decision::Denied(DenyReason::RestrictedToSubgroup(restricted_to.clone()));
        }
    }

    if account.is_parent_shadow()
        && member.shadow_access == ShadowAccess::ReadOnly
        && !action.is_read_only()
    {
        return Decision::Denied(DenyReason::ReadOnlyAccess);
    }

    let capability = action.required_capability();
    if effective_capabilities(y, policy, member, scope).contains(capability) {
        Decision::Allowed
    } else {
        Decision::Denied(DenyReason::MissingCapability(capability))
    }
}

/// Decide whether a member may open a post in a topic.
///
/// On top of [`authorize`] for [`Action::Post`] the topic has to be visible in the scope and
/// open, announcement topics need the announcement capability and the topic's posting flags
/// have to admit the kind of author.
pub fn authorize_post(
    y: &GroupContext,
    policy: &Policy,
    member_id: &MemberId,
    topic_id: &TopicId,
    scope: &Scope,
) -> Decision {
    let Some(topic) = visible_topics(&y.topics, scope)
        .into_iter()
        .find(|topic| &topic.id == topic_id)
    else {
        return Decision::Denied(DenyReason::TopicNotVisible(topic_id.clone()));
    };

    let decision = authorize(y, policy, member_id, Action::Post, scope);
    if !decision.is_allowed() {
        return decision;
    }

    if !topic.is_open() {
        return Decision::Denied(DenyReason::TopicClosed(topic.status));
    }

    let Some((member, account)) = y
        .member(member_id)
        .and_then(|member| Some((member, y.account_for(member)?)))
    else {
        return Decision::Denied(DenyReason::UnknownMember(member_id.clone()));
    };

    if topic.posting.is_announcement_only
        && !effective_capabilities(y, policy, member, scope).contains(Capability::PostAnnouncements)
    {
        return Decision::Denied(DenyReason::AnnouncementOnly);
    }

    let flags = &topic.posting;
    let (author, allowed) = match account.kind {
        AccountKind::Kid => (Author::Kid, flags.allow_kid_posts),
        AccountKind::ParentShadow { .. } => (Author::Parent, flags.allow_parent_posts),
        AccountKind::Adult if applicable_role(y, member, scope).is_some() => (
            Author::Role,
            flags.allow_role_posts || flags.allow_member_posts,
        ),
        AccountKind::Adult => (Author::Member, flags.allow_member_posts),
    };

    if allowed {
        Decision::Allowed
    } else {
        Decision::Denied(DenyReason::PostingNotAllowed(author))
    }
}

#[cfg(test)]
mod tests {
    use hearth_core::test_utils::TestGroup;
    use hearth_core::{
        Capability, GroupContext, GroupId, MemberId, PostingFlags, Scope, ShadowAccess,
        SubgroupId, Topic, TopicId, TopicStatus,
    };

    use crate::policy::Policy;

    use super::{Action, Author, Decision, DenyReason, authorize, authorize_post};

    fn sub(id: &str) -> Scope {
        Scope::Subgroup(SubgroupId::new(id))
    }

    fn check(y: &GroupContext, member: &str, action: &str, scope: &Scope) -> Decision {
        let action = action.parse::<Action>().unwrap();
        authorize(y, &Policy::default(), &MemberId::new(member), action, scope)
    }

    #[test]
    fn parses_actions() {
        assert_eq!("viewMembers".parse::<Action>(), Ok(Action::ViewMembers));
        assert_eq!("manageRoles".parse::<Action>(), Ok(Action::ManageRoles));
        assert!("fly".parse::<Action>().is_err());
        assert_eq!(Action::InviteUsers.to_string(), "inviteUsers");
    }

    #[test]
    fn restricted_member_cannot_view_main_group() {
        let y = TestGroup::new("g")
            .subgroup("s1")
            .subgroup("s2")
            .restricted_adult("r", "s1")
            .build();

        let decision = check(&y, "r", "viewMembers", &Scope::MainGroup);
        assert_eq!(
            decision,
            Decision::Denied(DenyReason::RestrictedToSubgroup(SubgroupId::new("s1")))
        );
        assert_eq!(
            decision.reason().map(|reason| reason.to_string()),
            Some("restricted to subgroup".to_string())
        );

        assert!(!check(&y, "r", "viewMembers", &sub("s2")).is_allowed());
        assert!(check(&y, "r", "viewMembers", &sub("s1")).is_allowed());
    }

    #[test]
    fn kids_never_manage() {
        let y = TestGroup::new("g")
            .role("boss", &[Capability::ManageMembers])
            .kid("k")
            .holds("k", "boss")
            .build();

        let decision = check(&y, "k", "manageMembers", &Scope::MainGroup);
        assert_eq!(decision, Decision::Denied(DenyReason::KidAccount(Action::ManageMembers)));
        assert_eq!(
            decision.reason().unwrap().to_string(),
            "kid accounts cannot manage members"
        );
        assert!(check(&y, "k", "post", &Scope::MainGroup).is_allowed());
    }

    #[test]
    fn kid_check_precedes_restriction() {
        let y = TestGroup::new("g")
            .subgroup("s1")
            .restricted_kid("k", "s1")
            .build();

        assert_eq!(
            check(&y, "k", "inviteUsers", &Scope::MainGroup),
            Decision::Denied(DenyReason::KidAccount(Action::InviteUsers))
        );
    }

    #[test]
    fn read_only_shadows() {
        let y = TestGroup::new("g")
            .subgroup("s1")
            .restricted_kid("k", "s1")
            .restricted_shadow("p", "k", "s1", ShadowAccess::ReadOnly)
            .build();

        assert!(check(&y, "p", "viewTopics", &sub("s1")).is_allowed());
        let decision = check(&y, "p", "vote", &sub("s1"));
        assert_eq!(decision, Decision::Denied(DenyReason::ReadOnlyAccess));
        assert_eq!(decision.reason().unwrap().to_string(), "read-only access in this subgroup");

        // Restriction is checked before the access level.
        assert_eq!(
            check(&y, "p", "viewTopics", &Scope::MainGroup),
            Decision::Denied(DenyReason::RestrictedToSubgroup(SubgroupId::new("s1")))
        );
    }

    #[test]
    fn restriction_beats_access_all_subgroups() {
        let y = TestGroup::new("g")
            .subgroup("s1")
            .subgroup("s2")
            .role("roamer", &[Capability::AccessAllSubgroups, Capability::ViewMembers])
            .restricted_adult("r", "s1")
            .holds("r", "roamer")
            .build();

        assert!(!check(&y, "r", "viewMembers", &sub("s2")).is_allowed());
        assert!(check(&y, "r", "viewMembers", &sub("s1")).is_allowed());
    }

    #[test]
    fn missing_capabilities_and_unknown_members() {
        let y = TestGroup::new("g").adult("ada").build();
        assert_eq!(
            check(&y, "ada", "manageRoles", &Scope::MainGroup),
            Decision::Denied(DenyReason::MissingCapability(Capability::ManageRoles))
        );
        assert_eq!(
            check(&y, "ghost", "viewTopics", &Scope::MainGroup),
            Decision::Denied(DenyReason::UnknownMember(MemberId::new("ghost")))
        );
    }

    fn topic(id: &str) -> Topic {
        Topic::new(TopicId::new(id), GroupId::new("g"), id)
    }

    fn post(y: &GroupContext, member: &str, topic: &str, scope: &Scope) -> Decision {
        authorize_post(
            y,
            &Policy::default(),
            &MemberId::new(member),
            &TopicId::new(topic),
            scope,
        )
    }

    #[test]
    fn posting_gate() {
        let no_kids = PostingFlags {
            allow_kid_posts: false,
            ..PostingFlags::default()
        };
        let roles_only = PostingFlags {
            allow_member_posts: false,
            ..PostingFlags::default()
        };

        let y = TestGroup::new("g")
            .subgroup("a")
            .role("tutor", &[Capability::Post, Capability::PostAnnouncements])
            .adult("ada")
            .adult("tina")
            .kid("k")
            .holds("tina", "tutor")
            .topic_with(topic("news").with_posting(PostingFlags::announcements()))
            .topic_with(topic("grownups").with_posting(no_kids))
            .topic_with(topic("staff").with_posting(roles_only))
            .topic_with(topic("old").with_status(TopicStatus::Archived))
            .subgroup_topic("homework", "a")
            .build();

        let main = Scope::MainGroup;
        assert_eq!(post(&y, "ada", "news", &main), Decision::Denied(DenyReason::AnnouncementOnly));
        assert!(post(&y, "tina", "news", &main).is_allowed());

        assert_eq!(
            post(&y, "k", "grownups", &main),
            Decision::Denied(DenyReason::PostingNotAllowed(Author::Kid))
        );
        assert!(post(&y, "ada", "grownups", &main).is_allowed());

        assert_eq!(
            post(&y, "ada", "staff", &main),
            Decision::Denied(DenyReason::PostingNotAllowed(Author::Member))
        );
        assert!(post(&y, "tina", "staff", &main).is_allowed());

        assert_eq!(
            post(&y, "ada", "old", &main),
            Decision::Denied(DenyReason::TopicClosed(TopicStatus::Archived))
        );

        // Subgroup topics are not visible from the main group.
        assert_eq!(
            post(&y, "ada", "homework", &main),
            Decision::Denied(DenyReason::TopicNotVisible(TopicId::new("homework")))
        );
    }
}
