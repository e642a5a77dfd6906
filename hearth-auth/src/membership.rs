// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pair parent shadow accounts with the kids they supervise.
//!
//! The resolver never fails: members with unknown accounts, shadows whose kid is not part of the
//! list and kids without a supervising shadow all end up as residual entries.
use std::collections::{HashMap, HashSet};

use hearth_core::{Account, AccountId, AccountKind, GroupContext, Member, MemberId, SubgroupId};

/// Why a member was not placed into a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResidualKind {
    Regular,
    UnpairedKid,
    UnpairedParent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberPair {
    pub parent: Member,
    pub kids: Vec<Member>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResidualMember {
    pub member: Member,
    pub kind: ResidualKind,
}

/// Members of a group or subgroup, nested by parent/kid pairing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MembershipTree {
    /// Pairs in the order their parent appears in the member list.
    pub pairs: Vec<MemberPair>,

    /// Unpaired members in member-list order.
    pub residual: Vec<ResidualMember>,
}

impl MembershipTree {
    /// Total number of members in the tree, paired or not.
    pub fn len(&self) -> usize {
        let paired: usize = self.pairs.iter().map(|pair| 1 + pair.kids.len()).sum();
        paired + self.residual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.residual.is_empty()
    }

    /// Return the pair a parent shadow member heads, if any.
    pub fn pair_of(&self, parent_id: &MemberId) -> Option<&MemberPair> {
        self.pairs.iter().find(|pair| &pair.parent.id == parent_id)
    }
}

/// Resolve the membership tree of a group, or of one subgroup when an id is given.
pub fn resolve(y: &GroupContext, subgroup_id: Option<&SubgroupId>) -> MembershipTree {
    let members: Vec<Member> = y.members_in(subgroup_id).cloned().collect();
    pair_members(&y.accounts, &members)
}

/// Pair parent shadows with kids in two passes over a flat member list.
pub fn pair_members(accounts: &HashMap<AccountId, Account>, members: &[Member]) -> MembershipTree {
    let mut consumed: HashSet<&MemberId> = HashSet::new();
    let mut pairs = Vec::new();

    // First pass: every parent shadow claims the first unclaimed kid member it is paired with.
    for parent in members {
        let Some(kid_account_id) = accounts
            .get(&parent.account_id)
            .and_then(|account| account.paired_kid_id())
        else {
            continue;
        };

        let kid = members.iter().find(|candidate| {
            &candidate.account_id == kid_account_id
                && !consumed.contains(&candidate.id)
                && accounts
                    .get(&candidate.account_id)
                    .is_some_and(|account| account.is_kid())
        });

        if let Some(kid) = kid {
            consumed.insert(&parent.id);
            consumed.insert(&kid.id);
            pairs.push(MemberPair {
                parent: parent.clone(),
                kids: vec![kid.clone()],
            });
        }
    }

    // Second pass: everything not paired stays a standalone entry.
    let residual = members
        .iter()
        .filter(|member| !consumed.contains(&member.id))
        .map(|member| {
            let kind = match accounts.get(&member.account_id).map(|account| &account.kind) {
                Some(AccountKind::Kid) => ResidualKind::UnpairedKid,
                Some(AccountKind::ParentShadow { .. }) => ResidualKind::UnpairedParent,
                Some(AccountKind::Adult) | None => ResidualKind::Regular,
            };
            ResidualMember {
                member: member.clone(),
                kind,
            }
        })
        .collect();

    MembershipTree { pairs, residual }
}
