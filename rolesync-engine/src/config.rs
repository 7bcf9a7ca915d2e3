// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use rolesync_core::UserId;
use rolesync_platform::{EVERYONE_ROLE, MAX_PAGE_SIZE};
use serde::{Deserialize, Deserializer};
use tokio::time::Duration;

const EDIT_ROLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const MEMBER_TIMEOUT: Duration = Duration::from_secs(20);
const QUEUE_CAPACITY: usize = 1;

/// Configuration parameters of a reconciliation cycle and the queue in front of it.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Platform role of the bot itself, left alone by role-definition sync.
    ///
    /// Default: none.
    pub(crate) bot_role: Option<String>,

    /// Further platform roles which are neither created, deleted nor edited.
    ///
    /// Default: empty.
    pub(crate) ignored_roles: BTreeSet<String>,

    /// Users whose platform roles are never changed, the guild owner for example.
    ///
    /// Default: empty.
    pub(crate) no_sync_users: BTreeSet<UserId>,

    /// Number of members fetched per page, capped at the platform maximum.
    ///
    /// Default: 1000.
    pub(crate) page_size: u16,

    /// Timeout of a single role edit on the platform.
    ///
    /// Default: 5 minutes.
    #[serde(rename = "edit_role_timeout_secs", deserialize_with = "seconds")]
    pub(crate) edit_role_timeout: Duration,

    /// Timeout of a single member page fetch or member update.
    ///
    /// Default: 20 seconds.
    #[serde(rename = "member_timeout_secs", deserialize_with = "seconds")]
    pub(crate) member_timeout: Duration,

    /// Number of sync requests which may wait while a cycle is running.
    ///
    /// Default: 1.
    pub(crate) queue_capacity: usize,
}

impl SyncConfig {
    /// Return a default instance of `SyncConfig`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Define the platform role of the bot.
    pub fn bot_role(mut self, name: impl Into<String>) -> Self {
        self.bot_role = Some(name.into());
        self
    }

    /// Add a platform role which is never touched.
    pub fn ignore_role(mut self, name: impl Into<String>) -> Self {
        self.ignored_roles.insert(name.into());
        self
    }

    /// Exclude a user from membership sync.
    pub fn no_sync_user(mut self, user: impl Into<UserId>) -> Self {
        self.no_sync_users.insert(user.into());
        self
    }

    /// Define the number of members fetched per page.
    pub fn page_size(mut self, page_size: u16) -> Self {
        self.page_size = page_size;
        self
    }

    /// Define the timeout of a single role edit.
    pub fn edit_role_timeout(mut self, duration: Duration) -> Self {
        self.edit_role_timeout = duration;
        self
    }

    /// Define the timeout of a single member page fetch or member update.
    pub fn member_timeout(mut self, duration: Duration) -> Self {
        self.member_timeout = duration;
        self
    }

    /// Define how many sync requests may wait in the queue.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Platform role names a sync never creates, deletes, edits or assigns.
    pub fn ignored_role_names(&self) -> BTreeSet<String> {
        let mut ignored = self.ignored_roles.clone();
        ignored.insert(EVERYONE_ROLE.to_string());
        if let Some(bot_role) = &self.bot_role {
            ignored.insert(bot_role.clone());
        }
        ignored
    }

    pub fn no_sync_users(&self) -> &BTreeSet<UserId> {
        &self.no_sync_users
    }

    pub(crate) fn effective_page_size(&self) -> u16 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub(crate) fn effective_queue_capacity(&self) -> usize {
        // tokio channels need room for at least one message.
        self.queue_capacity.max(1)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            bot_role: None,
            ignored_roles: BTreeSet::new(),
            no_sync_users: BTreeSet::new(),
            page_size: MAX_PAGE_SIZE,
            edit_role_timeout: EDIT_ROLE_TIMEOUT,
            member_timeout: MEMBER_TIMEOUT,
            queue_capacity: QUEUE_CAPACITY,
        }
    }
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}
