// SPDX-License-Identifier: MIT OR Apache-2.0

//! Special-interest groups.
//!
//! A SIG is a role with the `sig` flag whose second filter holds the group's members. Users may
//! join and leave joinable SIGs on their own, administrators may add or remove anyone. Every
//! change is followed by a silent sync so it shows up on the platform.
use std::sync::Arc;

use rolesync_core::{FilterRef, Namespace, UserId};
use rolesync_store::{FilterMembership, PolicyStore, StoreError};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::progress::Progress;
use crate::scheduler::{ScheduleError, SyncHandle, SyncRequest};

#[derive(Debug, Error)]
pub enum SigError {
    #[error("`{0}` is not a SIG")]
    NotASig(String),

    #[error("`{0}` is not a joinable SIG, talk to an admin")]
    NotJoinable(String),

    /// The SIG's second filter is the wildcard, there is no member set to change.
    #[error("SIG `{0}` has no member filter")]
    NoMemberFilter(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The membership was changed but the follow-up sync couldn't be queued.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SigAction {
    Join,
    Leave,
    Add,
    Remove,
}

impl SigAction {
    fn adds(&self) -> bool {
        matches!(self, SigAction::Join | SigAction::Add)
    }
}

/// Membership commands for special-interest groups.
#[derive(Debug)]
pub struct SigCommands<S> {
    store: Arc<S>,
    scheduler: SyncHandle,
}

impl<S> SigCommands<S>
where
    S: PolicyStore + FilterMembership,
{
    pub fn new(store: Arc<S>, scheduler: SyncHandle) -> Self {
        Self { store, scheduler }
    }

    /// A user joins a joinable SIG.
    pub async fn join(
        &self,
        namespace: &Namespace,
        sig: &str,
        user: &UserId,
    ) -> Result<UnboundedReceiver<Progress>, SigError> {
        self.apply(SigAction::Join, namespace, sig, user).await
    }

    /// A user leaves a SIG.
    pub async fn leave(
        &self,
        namespace: &Namespace,
        sig: &str,
        user: &UserId,
    ) -> Result<UnboundedReceiver<Progress>, SigError> {
        self.apply(SigAction::Leave, namespace, sig, user).await
    }

    /// Add a user to a SIG, whether or not it is joinable.
    pub async fn add(
        &self,
        namespace: &Namespace,
        sig: &str,
        user: &UserId,
    ) -> Result<UnboundedReceiver<Progress>, SigError> {
        self.apply(SigAction::Add, namespace, sig, user).await
    }

    /// Remove a user from a SIG.
    pub async fn remove(
        &self,
        namespace: &Namespace,
        sig: &str,
        user: &UserId,
    ) -> Result<UnboundedReceiver<Progress>, SigError> {
        self.apply(SigAction::Remove, namespace, sig, user).await
    }

    async fn apply(
        &self,
        action: SigAction,
        namespace: &Namespace,
        sig: &str,
        user: &UserId,
    ) -> Result<UnboundedReceiver<Progress>, SigError> {
        let role = self.store.role(namespace, sig).await?;
        if !role.sig {
            return Err(SigError::NotASig(sig.to_string()));
        }

        if action == SigAction::Join && !role.joinable {
            return Err(SigError::NotJoinable(sig.to_string()));
        }

        let FilterRef::Named(filter) = &role.filter_b else {
            return Err(SigError::NoMemberFilter(sig.to_string()));
        };

        let members = std::slice::from_ref(user);
        if action.adds() {
            self.store.add_members(namespace, filter, members).await?;
        } else {
            self.store.remove_members(namespace, filter, members).await?;
        }
        debug!(%namespace, sig, %user, ?action, "changed SIG membership");

        let request = SyncRequest::new(namespace.clone())
            .requester(user.to_string())
            .silent();
        Ok(self.scheduler.enqueue(request)?)
    }
}
