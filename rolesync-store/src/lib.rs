// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the policy store holding roles, filters and filter members.
//!
//! The `memory` feature (on by default) provides [`MemoryPolicyStore`], a namespace-partitioned
//! in-memory implementation with an administrative API which enforces the policy invariants.
#[cfg(feature = "memory")]
pub mod memory;
mod traits;

use rolesync_core::RoleUpdateError;
use thiserror::Error;

#[cfg(feature = "memory")]
pub use memory::MemoryPolicyStore;
pub use traits::{FilterMembership, PolicyStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("filter `{0}` already exists")]
    FilterExists(String),

    #[error("filter `{0}` doesn't exist")]
    FilterNotFound(String),

    #[error("filter `{0}` is not empty")]
    FilterNotEmpty(String),

    #[error("`{0}` is a reserved filter name")]
    ReservedFilterName(String),

    #[error("filter `{filter}` is still used by role `{role}`")]
    FilterInUse { filter: String, role: String },

    /// A role can't use the wildcard for both of its filters.
    #[error("role `{0}` needs at least one named filter")]
    InvalidRoleDefinition(String),

    #[error("role `{0}` already exists")]
    RoleExists(String),

    #[error("role `{0}` doesn't exist")]
    RoleNotFound(String),

    #[error(transparent)]
    RoleUpdate(#[from] RoleUpdateError),

    /// Error raised by the storage backend itself.
    #[error("policy store backend error: {0}")]
    Backend(String),
}
