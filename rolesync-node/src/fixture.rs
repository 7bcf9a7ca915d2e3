// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use rolesync_core::{Filter, Namespace, Role, UserId};
use rolesync_engine::SyncConfig;
use rolesync_platform::{MemoryPlatform, PlatformRole};
use rolesync_store::{FilterMembership, MemoryPolicyStore};
use serde::Deserialize;

/// A filter together with its members.
#[derive(Debug, Deserialize)]
pub struct FilterFixture {
    #[serde(flatten)]
    pub filter: Filter,
    #[serde(default)]
    pub members: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct MemberFixture {
    pub user_id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

/// What the platform looks like before the sync.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlatformFixture {
    pub roles: Vec<PlatformRole>,
    pub members: Vec<MemberFixture>,
}

/// Policy and platform state of a single community.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub namespace: Namespace,
    #[serde(default)]
    pub config: Option<SyncConfig>,
    #[serde(default)]
    pub filters: Vec<FilterFixture>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub platform: PlatformFixture,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parsing fixture {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the policy into the store and the platform state into the platform.
    pub async fn seed(&self, store: &MemoryPolicyStore, platform: &MemoryPlatform) -> Result<()> {
        for fixture in &self.filters {
            let name = &fixture.filter.name;
            store
                .add_filter(&self.namespace, fixture.filter.clone())
                .await
                .with_context(|| format!("adding filter {name}"))?;
            store
                .add_members(&self.namespace, name, &fixture.members)
                .await
                .with_context(|| format!("adding members to filter {name}"))?;
        }

        for role in &self.roles {
            store
                .add_role(&self.namespace, role.clone())
                .await
                .with_context(|| format!("adding role {}", role.short_name))?;
        }

        for role in &self.platform.roles {
            platform.create_role_with_id(&role.name, role.id.as_str()).await;
        }

        for member in &self.platform.members {
            platform
                .add_member(member.user_id.clone(), member.username.clone())
                .await;
            for role in &member.roles {
                platform
                    .assign(&member.user_id, role)
                    .await
                    .with_context(|| format!("assigning {role} to {}", member.user_id))?;
            }
        }

        Ok(())
    }
}
