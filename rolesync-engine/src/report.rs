// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use rolesync_core::{MembershipError, UserId};
use rolesync_platform::PlatformError;
use rolesync_store::StoreError;
use thiserror::Error;

/// The two halves of a reconciliation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    RoleDefinitions,
    Membership,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::RoleDefinitions => write!(f, "Role Sync"),
            Phase::Membership => write!(f, "Member Sync"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// A role uses the wildcard for both of its filters.
    #[error("invalid definition of role `{0}`")]
    InvalidRoleDefinition(String),

    #[error("filter `{0}` doesn't exist")]
    FilterNotFound(String),

    /// The platform rejected a call in a way which resolves itself, the cycle carries on.
    #[error("{0}")]
    PlatformTransient(PlatformError),

    /// The platform rejected a call, the current phase can't continue.
    #[error("{0}")]
    PlatformFatal(PlatformError),

    /// Updating the roles of one member failed, the other members are still updated.
    #[error("failed to update roles of member {user}: {source}")]
    PartialMemberUpdateFailure {
        user: UserId,
        #[source]
        source: PlatformError,
    },

    #[error(transparent)]
    PolicyStore(#[from] StoreError),
}

impl SyncError {
    /// Returns `true` if this error aborts the phase it occurred in.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::PlatformTransient(_) | SyncError::PartialMemberUpdateFailure { .. }
        )
    }
}

impl From<MembershipError> for SyncError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::InvalidRoleDefinition(role) => SyncError::InvalidRoleDefinition(role),
            MembershipError::FilterNotFound(filter) => SyncError::FilterNotFound(filter),
        }
    }
}

impl From<PlatformError> for SyncError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::RoleExists(_) => SyncError::PlatformTransient(err),
            err => SyncError::PlatformFatal(err),
        }
    }
}

/// Outcome of a reconciliation cycle.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Roles created on the platform.
    pub added_roles: Vec<String>,

    /// Roles deleted from the platform.
    pub removed_roles: Vec<String>,

    /// Roles whose attributes were overwritten with the policy's.
    pub updated_roles: Vec<String>,

    /// Members whose role set was replaced.
    pub updated_users: Vec<UserId>,

    /// No-sync members whose roles differ from the policy but were left alone.
    pub skipped_users: Vec<UserId>,

    /// Non-fatal errors, in the order they occurred.
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    /// Returns `true` if no role was created or deleted and no member was updated.
    ///
    /// Role edits are issued on every cycle and don't count.
    pub fn is_noop(&self) -> bool {
        self.added_roles.is_empty()
            && self.removed_roles.is_empty()
            && self.updated_users.is_empty()
    }
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "added {} roles, removed {}, updated {}, updated {} users, skipped {}, {} errors",
            self.added_roles.len(),
            self.removed_roles.len(),
            self.updated_roles.len(),
            self.updated_users.len(),
            self.skipped_users.len(),
            self.errors.len()
        )
    }
}

/// A reconciliation cycle which was aborted.
///
/// Carries whatever was done before the failure, mutations already applied to the platform are
/// not rolled back.
#[derive(Debug, Error)]
#[error("{phase} failed: {error}")]
pub struct CycleError {
    pub phase: Phase,
    #[source]
    pub error: SyncError,
    pub report: SyncReport,
}
