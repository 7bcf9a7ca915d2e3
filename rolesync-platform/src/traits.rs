// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use rolesync_core::{RoleAttributes, UserId};

use crate::{PlatformError, PlatformMember, PlatformRole, RoleId};

/// Interface to the external chat platform.
///
/// Calls map one-to-one onto platform API requests. Implementations don't retry or time out on
/// their own, [`PlatformMirror`](crate::PlatformMirror) wraps them with per-call timeouts.
#[async_trait]
pub trait PlatformGateway: Send + Sync {
    /// Returns every role of the guild, including platform-managed ones like `@everyone`.
    async fn list_roles(&self) -> Result<Vec<PlatformRole>, PlatformError>;

    /// Returns up to `page_size` members with an id larger than `after`, ordered by id.
    async fn list_members_page(
        &self,
        after: Option<&UserId>,
        page_size: u16,
    ) -> Result<Vec<PlatformMember>, PlatformError>;

    /// Returns a single member, or `None` if the user isn't in the guild.
    async fn member(&self, user: &UserId) -> Result<Option<PlatformMember>, PlatformError>;

    /// Creates a role with default attributes.
    ///
    /// Fails with [`PlatformError::RoleExists`] if a role with that name already exists.
    async fn create_role(&self, name: &str) -> Result<(), PlatformError>;

    async fn delete_role(&self, name: &str) -> Result<(), PlatformError>;

    /// Overwrites the attributes of the role named `attributes.name`.
    async fn edit_role(&self, attributes: &RoleAttributes) -> Result<(), PlatformError>;

    /// Replaces the complete role set of a member.
    async fn set_member_roles(&self, user: &UserId, roles: &[RoleId]) -> Result<(), PlatformError>;
}
