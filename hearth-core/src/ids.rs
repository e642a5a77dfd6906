// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers and timestamps.
//!
//! Ids are opaque strings handed to us by the external group-data service. Each entity gets its
//! own newtype so a `RoleId` can never be passed where a `MemberId` is expected.
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the id is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = Infallible;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Ok(Self(value.to_owned()))
            }
        }
    };
}

string_id!(
    /// Identifier of a top-level community group.
    GroupId
);

string_id!(
    /// Identifier of an account (adult, kid or parent shadow).
    AccountId
);

string_id!(
    /// Identifier of a membership record, one per account per group.
    MemberId
);

string_id!(
    /// Identifier of a custom group role, for example "Math Tutor".
    RoleId
);

string_id!(SubgroupId);

string_id!(TopicId);

string_id!(InvitationId);

impl MemberId {
    /// Derive the membership id for an account joining a group.
    pub fn for_account(group_id: &GroupId, account_id: &AccountId) -> Self {
        Self(format!("{group_id}/{account_id}"))
    }
}

/// Seconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            // Clocks before 1970 are treated as the epoch itself.
            .unwrap_or_default();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_secs()))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self(secs)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AccountId, GroupId, MemberId, Timestamp};

    #[test]
    fn member_id_for_account() {
        let member_id = MemberId::for_account(&GroupId::new("school"), &AccountId::new("ada"));
        assert_eq!(member_id.as_str(), "school/ada");
    }

    #[test]
    fn timestamp_ordering() {
        let earlier = Timestamp::new(10);
        let later = earlier.saturating_add(Duration::from_secs(5));
        assert!(earlier < later);
        assert_eq!(later.as_secs(), 15);

        let saturated = Timestamp::new(u64::MAX).saturating_add(Duration::from_secs(1));
        assert_eq!(saturated.as_secs(), u64::MAX);
    }
}
