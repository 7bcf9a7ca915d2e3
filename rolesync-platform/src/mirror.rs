// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rolesync_core::{RoleAttributes, UserId};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::{PlatformError, PlatformGateway, PlatformMember, RoleId};

/// Largest member page the platform hands out per request.
pub const MAX_PAGE_SIZE: u16 = 1000;

const EDIT_ROLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const MEMBER_TIMEOUT: Duration = Duration::from_secs(20);

/// Snapshot of the platform's roles, mapping role names to ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformRoles(BTreeMap<String, RoleId>);

impl PlatformRoles {
    pub fn id(&self, name: &str) -> Option<&RoleId> {
        self.0.get(name)
    }

    /// Role names, leaving out the ones on the ignore list.
    pub fn names_excluding(&self, ignored: &BTreeSet<String>) -> BTreeSet<String> {
        self.0
            .keys()
            .filter(|name| !ignored.contains(*name))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, RoleId)> for PlatformRoles {
    fn from_iter<T: IntoIterator<Item = (String, RoleId)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of asking the platform to create a role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,

    /// The platform already had a role with this name. Usually the role list we diffed against
    /// was served from a cache which didn't contain it yet.
    AlreadyExists,
}

/// Reads snapshots from and writes mutations to the platform through a [`PlatformGateway`].
///
/// Role edits can be slow on the platform side and get a generous timeout, member page fetches
/// and member updates a short one. There is no deadline spanning several calls.
#[derive(Debug)]
pub struct PlatformMirror<G> {
    gateway: Arc<G>,
    page_size: u16,
    edit_role_timeout: Duration,
    member_timeout: Duration,
}

impl<G> Clone for PlatformMirror<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            page_size: self.page_size,
            edit_role_timeout: self.edit_role_timeout,
            member_timeout: self.member_timeout,
        }
    }
}

impl<G> PlatformMirror<G>
where
    G: PlatformGateway,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            page_size: MAX_PAGE_SIZE,
            edit_role_timeout: EDIT_ROLE_TIMEOUT,
            member_timeout: MEMBER_TIMEOUT,
        }
    }

    /// Define the number of members requested per page, capped at [`MAX_PAGE_SIZE`].
    pub fn page_size(mut self, page_size: u16) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Define the timeout for a single role edit.
    pub fn edit_role_timeout(mut self, duration: Duration) -> Self {
        self.edit_role_timeout = duration;
        self
    }

    /// Define the timeout for a single member page fetch or member update.
    pub fn member_timeout(mut self, duration: Duration) -> Self {
        self.member_timeout = duration;
        self
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Fetch all roles and map their names to ids.
    pub async fn roles(&self) -> Result<PlatformRoles, PlatformError> {
        let roles = self.gateway.list_roles().await?;
        Ok(roles.into_iter().map(|role| (role.name, role.id)).collect())
    }

    /// Fetch every member of the guild.
    ///
    /// Pages are requested with the largest user id seen so far until the platform returns a
    /// page smaller than the page size.
    pub async fn members(&self) -> Result<Vec<PlatformMember>, PlatformError> {
        let mut members: BTreeMap<UserId, PlatformMember> = BTreeMap::new();
        let mut after: Option<UserId> = None;

        loop {
            let page = with_timeout(
                self.member_timeout,
                self.gateway.list_members_page(after.as_ref(), self.page_size),
            )
            .await?;
            let page_len = page.len();
            trace!(page_len, after = ?after, "fetched member page");

            let last = page.iter().map(|member| &member.user_id).max().cloned();
            for member in page {
                members.insert(member.user_id.clone(), member);
            }

            if page_len < self.page_size as usize {
                break;
            }

            match last {
                // A full page which doesn't move the cursor forward would have us loop forever.
                Some(last) if after.as_ref().is_none_or(|after| &last > after) => {
                    after = Some(last);
                }
                _ => {
                    return Err(PlatformError::Request(
                        "member pagination did not advance".into(),
                    ));
                }
            }
        }

        debug!(members = members.len(), "fetched all platform members");
        Ok(members.into_values().collect())
    }

    /// Look up a single member.
    pub async fn member(&self, user: &UserId) -> Result<PlatformMember, PlatformError> {
        with_timeout(self.member_timeout, self.gateway.member(user))
            .await?
            .ok_or_else(|| PlatformError::MemberNotFound(user.clone()))
    }

    /// Look up several members, in the order given. Users who aren't in the guild are left out.
    pub async fn lookup_members(
        &self,
        users: &[UserId],
    ) -> Result<Vec<PlatformMember>, PlatformError> {
        let mut members = Vec::with_capacity(users.len());
        for user in users {
            match self.member(user).await {
                Ok(member) => members.push(member),
                Err(PlatformError::MemberNotFound(_)) => {
                    trace!(%user, "member not in guild");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(members)
    }

    /// Create a role. A name clash is reported as [`CreateOutcome::AlreadyExists`].
    pub async fn create_role(&self, name: &str) -> Result<CreateOutcome, PlatformError> {
        match self.gateway.create_role(name).await {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(PlatformError::RoleExists(_)) => Ok(CreateOutcome::AlreadyExists),
            Err(err) => Err(err),
        }
    }

    pub async fn delete_role(&self, name: &str) -> Result<(), PlatformError> {
        self.gateway.delete_role(name).await
    }

    pub async fn edit_role(&self, attributes: &RoleAttributes) -> Result<(), PlatformError> {
        with_timeout(self.edit_role_timeout, self.gateway.edit_role(attributes)).await
    }

    pub async fn set_member_roles(
        &self,
        user: &UserId,
        roles: &[RoleId],
    ) -> Result<(), PlatformError> {
        with_timeout(self.member_timeout, self.gateway.set_member_roles(user, roles)).await
    }
}

async fn with_timeout<T>(
    duration: Duration,
    request: impl Future<Output = Result<T, PlatformError>>,
) -> Result<T, PlatformError> {
    timeout(duration, request)
        .await
        .map_err(|_| PlatformError::Timeout(duration))?
}
