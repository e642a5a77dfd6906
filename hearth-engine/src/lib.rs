// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access engine for hearth community groups.
//!
//! [`Engine`] answers membership, capability, topic and authorization queries for the groups
//! held by a store and applies role, topic and invitation changes to them. Records are fetched
//! concurrently and cached per group together with the views derived from them, every state
//! change drops exactly the views it affects.
//!
//! A [`Session`] follows one user navigating between the main group and its subgroups, keeping
//! only the result of the latest context switch.
mod cache;
mod config;
mod engine;
mod error;
mod fetch;
mod session;
#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Input};
pub use session::{RequestToken, ScopedView, Session};
