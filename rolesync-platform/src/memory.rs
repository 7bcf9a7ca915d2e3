// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory chat platform.
//!
//! Behaves like a single Discord guild: it allocates role ids, keeps an `@everyone` role, caps
//! member pages at [`MAX_PAGE_SIZE`] and refuses duplicate role names with the platform's own
//! error message. Every mutation is recorded and failures can be injected per call.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rolesync_core::{RoleAttributes, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::trace;

use crate::{
    EVERYONE_ROLE, MAX_PAGE_SIZE, PlatformError, PlatformGateway, PlatformMember, PlatformRole,
    RoleId,
};

/// A mutation the platform accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    CreateRole(String),
    DeleteRole(String),
    EditRole(String),
    SetMemberRoles(UserId, Vec<RoleId>),
}

#[derive(Debug)]
struct Member {
    username: String,
    roles: BTreeSet<RoleId>,
}

#[derive(Debug, Default)]
struct Failures {
    list_roles: Option<PlatformError>,
    list_members: Option<PlatformError>,
    create: BTreeMap<String, PlatformError>,
    delete: BTreeMap<String, PlatformError>,
    edit: BTreeMap<String, PlatformError>,
    member_update: BTreeMap<UserId, PlatformError>,
}

#[derive(Debug, Default)]
struct State {
    next_role_id: u64,
    roles: BTreeMap<RoleId, RoleAttributes>,
    members: BTreeMap<UserId, Member>,
    /// Roles which exist but are missing from `list_roles`, like a stale cache would.
    stale: BTreeSet<String>,
    failures: Failures,
    edit_delay: Option<Duration>,
    member_page_requests: usize,
    mutations: Vec<Mutation>,
}

impl State {
    fn role_id(&self, name: &str) -> Option<RoleId> {
        self.roles
            .iter()
            .find(|(_, attributes)| attributes.name == name)
            .map(|(id, _)| id.clone())
    }

    fn allocate_role_id(&mut self) -> RoleId {
        loop {
            self.next_role_id += 1;
            let id = RoleId::new(self.next_role_id.to_string());
            if !self.roles.contains_key(&id) {
                return id;
            }
        }
    }

    fn member_view(&self, user_id: &UserId, member: &Member) -> PlatformMember {
        PlatformMember {
            user_id: user_id.clone(),
            username: member.username.clone(),
            role_names: member
                .roles
                .iter()
                .filter_map(|id| self.roles.get(id))
                .map(|attributes| attributes.name.clone())
                .collect(),
        }
    }
}

/// In-memory implementation of [`PlatformGateway`].
#[derive(Clone, Debug)]
pub struct MemoryPlatform {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    /// Returns an empty guild which only has the `@everyone` role.
    pub fn new() -> Self {
        let mut state = State::default();
        state.roles.insert(
            RoleId::new("0"),
            RoleAttributes {
                name: EVERYONE_ROLE.to_string(),
                ..Default::default()
            },
        );

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn add_member(&self, user_id: UserId, username: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.members.insert(
            user_id,
            Member {
                username: username.into(),
                roles: BTreeSet::new(),
            },
        );
    }

    /// Adds a role with a fixed id, bypassing the mutation log.
    pub async fn create_role_with_id(&self, name: &str, id: &str) {
        let mut state = self.state.lock().await;
        state.roles.insert(
            RoleId::new(id),
            RoleAttributes {
                name: name.to_string(),
                ..Default::default()
            },
        );
    }

    /// Assigns a role to a member, bypassing the mutation log.
    pub async fn assign(&self, user_id: &UserId, role: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        let id = state
            .role_id(role)
            .ok_or_else(|| PlatformError::RoleNotFound(role.to_string()))?;
        let member = state
            .members
            .get_mut(user_id)
            .ok_or_else(|| PlatformError::MemberNotFound(user_id.clone()))?;
        member.roles.insert(id);
        Ok(())
    }

    /// Hides an existing role from `list_roles`.
    pub async fn make_stale(&self, role: &str) {
        self.state.lock().await.stale.insert(role.to_string());
    }

    pub async fn fail_list_roles(&self, error: PlatformError) {
        self.state.lock().await.failures.list_roles = Some(error);
    }

    pub async fn fail_list_members(&self, error: PlatformError) {
        self.state.lock().await.failures.list_members = Some(error);
    }

    pub async fn fail_create(&self, role: &str, error: PlatformError) {
        let mut state = self.state.lock().await;
        state.failures.create.insert(role.to_string(), error);
    }

    pub async fn fail_delete(&self, role: &str, error: PlatformError) {
        let mut state = self.state.lock().await;
        state.failures.delete.insert(role.to_string(), error);
    }

    pub async fn fail_edit(&self, role: &str, error: PlatformError) {
        let mut state = self.state.lock().await;
        state.failures.edit.insert(role.to_string(), error);
    }

    pub async fn fail_member_update(&self, user_id: &UserId, error: PlatformError) {
        let mut state = self.state.lock().await;
        state.failures.member_update.insert(user_id.clone(), error);
    }

    /// Removes all injected failures.
    pub async fn heal(&self) {
        self.state.lock().await.failures = Failures::default();
    }

    /// Delays every role edit, for exercising timeouts.
    pub async fn delay_edits(&self, delay: Duration) {
        self.state.lock().await.edit_delay = Some(delay);
    }

    /// Names of all roles, including stale ones.
    pub async fn role_names(&self) -> BTreeSet<String> {
        let state = self.state.lock().await;
        state
            .roles
            .values()
            .map(|attributes| attributes.name.clone())
            .collect()
    }

    pub async fn role_attributes(&self, role: &str) -> Option<RoleAttributes> {
        let state = self.state.lock().await;
        state
            .roles
            .values()
            .find(|attributes| attributes.name == role)
            .cloned()
    }

    /// Names of the roles assigned to a member, `None` if they aren't in the guild.
    pub async fn member_roles(&self, user_id: &UserId) -> Option<BTreeSet<String>> {
        let state = self.state.lock().await;
        state
            .members
            .get(user_id)
            .map(|member| state.member_view(user_id, member).role_names)
    }

    /// Every member with their role names, ordered by id.
    pub async fn all_members(&self) -> Vec<PlatformMember> {
        let state = self.state.lock().await;
        state
            .members
            .iter()
            .map(|(user_id, member)| state.member_view(user_id, member))
            .collect()
    }

    pub async fn member_page_requests(&self) -> usize {
        self.state.lock().await.member_page_requests
    }

    /// Mutations in the order they were accepted.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().await.mutations.clone()
    }

    pub async fn clear_mutations(&self) {
        self.state.lock().await.mutations.clear();
    }
}

#[async_trait]
impl PlatformGateway for MemoryPlatform {
    async fn list_roles(&self) -> Result<Vec<PlatformRole>, PlatformError> {
        let state = self.state.lock().await;
        if let Some(error) = &state.failures.list_roles {
            return Err(error.clone());
        }

        Ok(state
            .roles
            .iter()
            .filter(|(_, attributes)| !state.stale.contains(&attributes.name))
            .map(|(id, attributes)| PlatformRole {
                id: id.clone(),
                name: attributes.name.clone(),
            })
            .collect())
    }

    async fn list_members_page(
        &self,
        after: Option<&UserId>,
        page_size: u16,
    ) -> Result<Vec<PlatformMember>, PlatformError> {
        let mut state = self.state.lock().await;
        state.member_page_requests += 1;
        if let Some(error) = &state.failures.list_members {
            return Err(error.clone());
        }

        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(PlatformError::Request(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let page = state
            .members
            .iter()
            .filter(|(user_id, _)| after.is_none_or(|after| *user_id > after))
            .take(page_size as usize)
            .map(|(user_id, member)| state.member_view(user_id, member))
            .collect();
        Ok(page)
    }

    async fn member(&self, user: &UserId) -> Result<Option<PlatformMember>, PlatformError> {
        let state = self.state.lock().await;
        if let Some(error) = &state.failures.list_members {
            return Err(error.clone());
        }

        Ok(state
            .members
            .get(user)
            .map(|member| state.member_view(user, member)))
    }

    async fn create_role(&self, name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.failures.create.get(name) {
            return Err(error.clone());
        }

        if state.role_id(name).is_some() {
            return Err(PlatformError::RoleExists(name.to_string()));
        }

        let id = state.allocate_role_id();
        trace!(%id, name, "create role");
        state.roles.insert(
            id,
            RoleAttributes {
                name: name.to_string(),
                ..Default::default()
            },
        );
        state.mutations.push(Mutation::CreateRole(name.to_string()));
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.failures.delete.get(name) {
            return Err(error.clone());
        }

        let id = state
            .role_id(name)
            .ok_or_else(|| PlatformError::RoleNotFound(name.to_string()))?;
        state.roles.remove(&id);
        for member in state.members.values_mut() {
            member.roles.remove(&id);
        }
        state.stale.remove(name);
        state.mutations.push(Mutation::DeleteRole(name.to_string()));
        Ok(())
    }

    async fn edit_role(&self, attributes: &RoleAttributes) -> Result<(), PlatformError> {
        let delay = self.state.lock().await.edit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(error) = state.failures.edit.get(&attributes.name) {
            return Err(error.clone());
        }

        let id = state
            .role_id(&attributes.name)
            .ok_or_else(|| PlatformError::RoleNotFound(attributes.name.clone()))?;
        state.roles.insert(id, attributes.clone());
        state
            .mutations
            .push(Mutation::EditRole(attributes.name.clone()));
        Ok(())
    }

    async fn set_member_roles(&self, user: &UserId, roles: &[RoleId]) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.failures.member_update.get(user) {
            return Err(error.clone());
        }

        if let Some(unknown) = roles.iter().find(|id| !state.roles.contains_key(*id)) {
            return Err(PlatformError::RoleNotFound(unknown.to_string()));
        }

        let member = state
            .members
            .get_mut(user)
            .ok_or_else(|| PlatformError::MemberNotFound(user.clone()))?;
        member.roles = roles.iter().cloned().collect();
        state
            .mutations
            .push(Mutation::SetMemberRoles(user.clone(), roles.to_vec()));
        Ok(())
    }
}
