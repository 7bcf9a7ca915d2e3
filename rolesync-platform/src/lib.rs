// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to the external chat platform whose roles are kept in line with policy.
//!
//! [`PlatformGateway`] is the raw interface to the platform API. [`PlatformMirror`] builds on it
//! to take consistent snapshots (all roles, all members across pages) and to issue mutations
//! with per-call timeouts. The `memory` feature (on by default) provides [`MemoryPlatform`], an
//! in-memory platform used for dry runs and tests.
#[cfg(feature = "memory")]
pub mod memory;
mod mirror;
mod traits;

use std::collections::BTreeSet;
use std::fmt::Display;
use std::time::Duration;

use rolesync_core::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "memory")]
pub use memory::{MemoryPlatform, Mutation};
pub use mirror::{CreateOutcome, MAX_PAGE_SIZE, PlatformMirror, PlatformRoles};
pub use traits::PlatformGateway;

/// Name of the role every guild member implicitly has.
pub const EVERYONE_ROLE: &str = "@everyone";

/// Identifier the platform assigned to a role.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role as the platform reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRole {
    pub id: RoleId,
    pub name: String,
}

/// A guild member and the names of the roles currently assigned to them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMember {
    pub user_id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role_names: BTreeSet<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform refused to create a role because the name is taken.
    #[error("The role '{0}' already exists")]
    RoleExists(String),

    #[error("role '{0}' not found")]
    RoleNotFound(String),

    #[error("member '{0}' not found")]
    MemberNotFound(UserId),

    /// No response within the deadline of this call.
    #[error("platform request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure reported by the platform or the transport.
    #[error("platform request failed: {0}")]
    Request(String),
}

impl PlatformError {
    /// Classify an error message received from a remote gateway.
    ///
    /// Gateways which only hand out error strings report duplicate roles as
    /// `The role '<name>' already exists`, this is turned into [`PlatformError::RoleExists`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let name = message
            .strip_prefix("The role '")
            .and_then(|rest| rest.strip_suffix("' already exists"));

        match name {
            Some(name) => PlatformError::RoleExists(name.to_string()),
            None => PlatformError::Request(message),
        }
    }
}
