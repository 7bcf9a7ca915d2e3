// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rolesync_core::membership::referenced_filters;
use rolesync_core::{Filter, MemberSet, Namespace, Role, RoleKey, UserId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{FilterMembership, PolicyStore, StoreError};

#[derive(Debug, Default)]
struct Policy {
    filters: BTreeMap<String, Filter>,
    members: BTreeMap<String, MemberSet>,
    roles: BTreeMap<String, Role>,
}

impl Policy {
    fn ensure_filter(&self, name: &str) -> Result<(), StoreError> {
        if self.filters.contains_key(name) {
            Ok(())
        } else {
            Err(StoreError::FilterNotFound(name.to_string()))
        }
    }

    /// Checks that a role names at least one filter and that the filters it names exist.
    fn check_role(&self, role: &Role) -> Result<(), StoreError> {
        if role.filter_a.is_wildcard() && role.filter_b.is_wildcard() {
            return Err(StoreError::InvalidRoleDefinition(role.short_name.clone()));
        }

        for filter in referenced_filters(role) {
            self.ensure_filter(filter)?;
        }
        Ok(())
    }
}

/// In-memory policy store.
///
/// Cloning the store hands out another reference to the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryPolicyStore {
    namespaces: Arc<RwLock<BTreeMap<Namespace, Policy>>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter with an empty member set.
    pub async fn add_filter(&self, namespace: &Namespace, filter: Filter) -> Result<(), StoreError> {
        if filter.name.is_empty() {
            return Err(StoreError::MissingField("name"));
        }

        if filter.description.is_empty() {
            return Err(StoreError::MissingField("description"));
        }

        if Filter::is_reserved_name(&filter.name) {
            return Err(StoreError::ReservedFilterName(filter.name));
        }

        let mut namespaces = self.namespaces.write().await;
        let policy = namespaces.entry(namespace.clone()).or_default();
        if policy.filters.contains_key(&filter.name) {
            return Err(StoreError::FilterExists(filter.name));
        }

        debug!(%namespace, filter = %filter.name, "add filter");
        policy.members.insert(filter.name.clone(), MemberSet::new());
        policy.filters.insert(filter.name.clone(), filter);
        Ok(())
    }

    /// Removes a filter. Filters which still have members or are used by a role can't be
    /// removed.
    pub async fn remove_filter(&self, namespace: &Namespace, name: &str) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().await;
        let policy = namespaces
            .get_mut(namespace)
            .ok_or_else(|| StoreError::FilterNotFound(name.to_string()))?;
        policy.ensure_filter(name)?;

        if policy.members.get(name).is_some_and(|members| !members.is_empty()) {
            return Err(StoreError::FilterNotEmpty(name.to_string()));
        }

        if let Some(role) = policy
            .roles
            .values()
            .find(|role| referenced_filters(role).any(|filter| filter == name))
        {
            return Err(StoreError::FilterInUse {
                filter: name.to_string(),
                role: role.short_name.clone(),
            });
        }

        debug!(%namespace, filter = %name, "remove filter");
        policy.filters.remove(name);
        policy.members.remove(name);
        Ok(())
    }

    /// Returns all filters of a namespace, ordered by name.
    pub async fn filters(&self, namespace: &Namespace) -> Vec<Filter> {
        let namespaces = self.namespaces.read().await;
        namespaces
            .get(namespace)
            .map(|policy| policy.filters.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Adds a role.
    ///
    /// Both filters need to exist or be the wildcard, but not both of them can be the wildcard.
    /// The short name must be unique.
    pub async fn add_role(&self, namespace: &Namespace, role: Role) -> Result<(), StoreError> {
        if role.short_name.is_empty() {
            return Err(StoreError::MissingField("short name"));
        }

        if role.name.is_empty() {
            return Err(StoreError::MissingField("name"));
        }

        let mut namespaces = self.namespaces.write().await;
        let policy = namespaces.entry(namespace.clone()).or_default();
        if policy.roles.contains_key(&role.short_name) {
            return Err(StoreError::RoleExists(role.short_name));
        }

        policy.check_role(&role)?;

        debug!(%namespace, role = %role.short_name, "add role");
        policy.roles.insert(role.short_name.clone(), role);
        Ok(())
    }

    /// Updates a single attribute of a role, parsing the value for its key.
    pub async fn update_role(
        &self,
        namespace: &Namespace,
        short_name: &str,
        key: RoleKey,
        value: &str,
    ) -> Result<Role, StoreError> {
        let mut namespaces = self.namespaces.write().await;
        let policy = namespaces
            .get_mut(namespace)
            .ok_or_else(|| StoreError::RoleNotFound(short_name.to_string()))?;
        let mut updated = policy
            .roles
            .get(short_name)
            .cloned()
            .ok_or_else(|| StoreError::RoleNotFound(short_name.to_string()))?;

        // The stored role stays untouched unless the updated one is valid.
        updated.update(key, value)?;
        policy.check_role(&updated)?;
        policy.roles.insert(short_name.to_string(), updated.clone());

        debug!(%namespace, role = %short_name, %key, "update role");
        Ok(updated)
    }

    pub async fn remove_role(&self, namespace: &Namespace, short_name: &str) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .get_mut(namespace)
            .and_then(|policy| policy.roles.remove(short_name))
            .map(|_| ())
            .ok_or_else(|| StoreError::RoleNotFound(short_name.to_string()))
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn list_roles(&self, namespace: &Namespace) -> Result<Vec<Role>, StoreError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|policy| policy.roles.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn filter_members(
        &self,
        namespace: &Namespace,
        filter: &str,
    ) -> Result<MemberSet, StoreError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|policy| policy.members.get(filter))
            .cloned()
            .unwrap_or_default())
    }

    async fn filter_exists(&self, namespace: &Namespace, filter: &str) -> Result<bool, StoreError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .is_some_and(|policy| policy.filters.contains_key(filter)))
    }

    async fn role(&self, namespace: &Namespace, short_name: &str) -> Result<Role, StoreError> {
        let namespaces = self.namespaces.read().await;
        namespaces
            .get(namespace)
            .and_then(|policy| policy.roles.get(short_name))
            .cloned()
            .ok_or_else(|| StoreError::RoleNotFound(short_name.to_string()))
    }
}

#[async_trait]
impl FilterMembership for MemoryPolicyStore {
    async fn add_members(
        &self,
        namespace: &Namespace,
        filter: &str,
        members: &[UserId],
    ) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().await;
        let policy = namespaces
            .get_mut(namespace)
            .ok_or_else(|| StoreError::FilterNotFound(filter.to_string()))?;
        policy.ensure_filter(filter)?;

        let set = policy.members.entry(filter.to_string()).or_default();
        set.extend(members.iter().filter(|id| !id.as_str().is_empty()).cloned());
        Ok(())
    }

    async fn remove_members(
        &self,
        namespace: &Namespace,
        filter: &str,
        members: &[UserId],
    ) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().await;
        let policy = namespaces
            .get_mut(namespace)
            .ok_or_else(|| StoreError::FilterNotFound(filter.to_string()))?;
        policy.ensure_filter(filter)?;

        if let Some(set) = policy.members.get_mut(filter) {
            for member in members {
                set.remove(member);
            }
        }
        Ok(())
    }

    async fn clear_members(&self, namespace: &Namespace, filter: &str) -> Result<usize, StoreError> {
        let mut namespaces = self.namespaces.write().await;
        let policy = namespaces
            .get_mut(namespace)
            .ok_or_else(|| StoreError::FilterNotFound(filter.to_string()))?;
        policy.ensure_filter(filter)?;

        let removed = policy
            .members
            .get_mut(filter)
            .map(std::mem::take)
            .map_or(0, |members| members.len());
        debug!(%namespace, %filter, removed, "clear filter members");
        Ok(removed)
    }
}
