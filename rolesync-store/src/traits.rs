// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use rolesync_core::{MemberSet, Namespace, Role, UserId};

use crate::StoreError;

/// Read access to a community's policy: roles, filters and filter members.
///
/// Every lookup is partitioned by a [`Namespace`]. Implementations are expected to be safe to
/// share between tasks, the reconciliation engine holds them behind an `Arc`.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Returns all roles of a namespace, in no particular order.
    async fn list_roles(&self, namespace: &Namespace) -> Result<Vec<Role>, StoreError>;

    /// Returns the members of a filter.
    ///
    /// A filter without any members and a filter which doesn't exist both yield an empty set,
    /// use [`PolicyStore::filter_exists`] to tell them apart.
    async fn filter_members(
        &self,
        namespace: &Namespace,
        filter: &str,
    ) -> Result<MemberSet, StoreError>;

    /// Returns `true` if a description entry exists for this filter.
    async fn filter_exists(&self, namespace: &Namespace, filter: &str) -> Result<bool, StoreError>;

    /// Returns a single role by its short name.
    async fn role(&self, namespace: &Namespace, short_name: &str) -> Result<Role, StoreError> {
        self.list_roles(namespace)
            .await?
            .into_iter()
            .find(|role| role.short_name == short_name)
            .ok_or_else(|| StoreError::RoleNotFound(short_name.to_string()))
    }
}

/// Write access to filter member sets.
///
/// Used by commands which let users manage their own memberships, like joining a SIG. The
/// reconciliation engine itself never writes to the policy store.
#[async_trait]
pub trait FilterMembership: Send + Sync {
    /// Adds users to a filter. Fails if the filter doesn't exist.
    async fn add_members(
        &self,
        namespace: &Namespace,
        filter: &str,
        members: &[UserId],
    ) -> Result<(), StoreError>;

    /// Removes users from a filter. Fails if the filter doesn't exist.
    async fn remove_members(
        &self,
        namespace: &Namespace,
        filter: &str,
        members: &[UserId],
    ) -> Result<(), StoreError>;

    /// Removes every user from a filter and returns how many there were.
    async fn clear_members(&self, namespace: &Namespace, filter: &str) -> Result<usize, StoreError>;
}
