// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage interfaces for hearth group records.
//!
//! Records are owned by an external group-data service. [`GroupStore`] covers the reads the
//! resolvers need, [`GroupWriter`] the writes state transitions produce and [`Transaction`] lets
//! a set of writes be applied all-or-nothing.
#[cfg(feature = "memory")]
pub mod memory;
pub mod traits;

#[cfg(feature = "memory")]
pub use memory::{MemoryPermit, MemoryStore, MemoryStoreError};
pub use traits::{GroupStore, GroupWriter, Transaction};
