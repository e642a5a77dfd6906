// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use hearth_auth::Policy;
use serde::{Deserialize, Serialize};

/// Configuration for an engine instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Baseline capabilities and the upper bound for role capacities.
    pub(crate) policy: Policy,

    /// When a pending invitation should be considered expired.
    pub(crate) invitation_lifetime: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            invitation_lifetime: Duration::from_secs(60 * 60 * 24 * 7), // 7 days
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_invitation_lifetime(mut self, lifetime: Duration) -> Self {
        self.invitation_lifetime = lifetime;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn invitation_lifetime(&self) -> Duration {
        self.invitation_lifetime
    }
}
