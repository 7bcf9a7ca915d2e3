// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use rolesync_core::{Filter, FilterRef, Namespace, Role, UserId};
use rolesync_platform::MemoryPlatform;
use rolesync_store::{FilterMembership, MemoryPolicyStore};

use crate::{ReconciliationEngine, SyncConfig};

/// Install a log subscriber when `RUST_LOG` is set.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

pub type MemoryEngine = ReconciliationEngine<MemoryPolicyStore, MemoryPlatform>;

/// Policy store, platform and an engine wired to both.
pub struct TestCommunity {
    pub namespace: Namespace,
    pub store: Arc<MemoryPolicyStore>,
    pub platform: Arc<MemoryPlatform>,
    pub engine: Arc<MemoryEngine>,
}

impl TestCommunity {
    pub fn new(config: SyncConfig) -> Self {
        let store = Arc::new(MemoryPolicyStore::new());
        let platform = Arc::new(MemoryPlatform::new());
        let engine = Arc::new(ReconciliationEngine::new(
            store.clone(),
            platform.clone(),
            config,
        ));

        Self {
            namespace: Namespace::from("corp"),
            store,
            platform,
            engine,
        }
    }

    /// Create a filter holding the given users.
    pub async fn filter(&self, name: &str, members: &[&str]) {
        self.store
            .add_filter(&self.namespace, Filter::new(name, format!("{name} filter")))
            .await
            .expect("add filter");
        let members: Vec<UserId> = members.iter().map(|id| UserId::from(*id)).collect();
        self.store
            .add_members(&self.namespace, name, &members)
            .await
            .expect("add members");
    }

    /// Create a sync-enabled role driven by a single filter.
    pub async fn synced_role(&self, name: &str, filter: &str) {
        let role = Role::new(
            name.to_lowercase(),
            name,
            FilterRef::named(filter),
            FilterRef::Wildcard,
        )
        .with_sync(true);
        self.store
            .add_role(&self.namespace, role)
            .await
            .expect("add role");
    }

    /// Add users to the platform, named after their ids.
    pub async fn platform_members(&self, ids: &[&str]) {
        for id in ids {
            self.platform
                .add_member(UserId::from(*id), format!("user{id}"))
                .await;
        }
    }
}
