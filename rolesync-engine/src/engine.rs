// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use rolesync_core::membership::referenced_filters;
use rolesync_core::{MemberSet, Namespace, Role, UserId, resolve_role};
use rolesync_platform::{
    CreateOutcome, PlatformError, PlatformGateway, PlatformMirror, PlatformRoles,
};
use rolesync_store::PolicyStore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::plan::{MembershipSnapshot, plan_member_updates, plan_role_definitions};
use crate::progress::{Progress, ProgressSink, Snapshot};
use crate::report::{CycleError, Phase, SyncError, SyncReport};

/// Drives policy state onto the chat platform.
///
/// A cycle first makes the platform's role set match the sync-enabled policy roles, then
/// replaces the role set of every platform member whose managed roles differ from their
/// resolved policy memberships. The engine only reads from the policy store.
#[derive(Debug)]
pub struct ReconciliationEngine<S, G> {
    store: Arc<S>,
    mirror: PlatformMirror<G>,
    config: SyncConfig,
}

impl<S, G> ReconciliationEngine<S, G>
where
    S: PolicyStore,
    G: PlatformGateway,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, config: SyncConfig) -> Self {
        let mirror = PlatformMirror::new(gateway)
            .page_size(config.effective_page_size())
            .edit_role_timeout(config.edit_role_timeout)
            .member_timeout(config.member_timeout);

        Self {
            store,
            mirror,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one full reconciliation cycle for a namespace.
    ///
    /// Membership sync only starts once role-definition sync completed. If either phase fails
    /// the cycle stops there, a fatal progress message carrying the error text is sent and the
    /// error is returned along with everything done up to that point.
    pub async fn run_sync(
        &self,
        namespace: &Namespace,
        progress: &ProgressSink,
    ) -> Result<SyncReport, CycleError> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        for phase in [Phase::RoleDefinitions, Phase::Membership] {
            let result = match phase {
                Phase::RoleDefinitions => self.sync_roles(namespace, progress, &mut report).await,
                Phase::Membership => self.sync_members(namespace, progress, &mut report).await,
            };

            if let Err(error) = result {
                progress.fatal(format!("{phase}: {error}"));
                return Err(CycleError {
                    phase,
                    error,
                    report,
                });
            }
        }

        progress.send(Progress::CycleCompleted {
            elapsed: started.elapsed(),
        });
        Ok(report)
    }

    /// Make the platform's role set match the sync-enabled policy roles.
    ///
    /// Creates missing roles, deletes surplus ones and overwrites the attributes of the rest.
    /// Ignored roles are invisible to this phase. A role which turns out to exist already is
    /// noted and skipped, any other platform error aborts.
    pub async fn sync_roles(
        &self,
        namespace: &Namespace,
        progress: &ProgressSink,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let started = Instant::now();
        progress.send(Progress::PhaseStarted(Phase::RoleDefinitions));

        let policy: BTreeMap<String, Role> = self
            .sync_enabled_roles(namespace)
            .await?
            .into_iter()
            .map(|role| (role.name.clone(), role))
            .collect();
        let policy_names: BTreeSet<String> = policy.keys().cloned().collect();

        let platform_names = self
            .mirror
            .roles()
            .await
            .map_err(SyncError::PlatformFatal)?
            .names_excluding(&self.config.ignored_role_names());

        let plan = plan_role_definitions(&policy_names, &platform_names);
        debug!(
            %namespace,
            converged = plan.is_converged(),
            create = plan.create.len(),
            delete = plan.delete.len(),
            update = plan.update.len(),
            "planned role definitions"
        );

        for name in plan.create {
            match self.mirror.create_role(&name).await {
                Ok(CreateOutcome::Created) => {
                    debug!(%namespace, role = %name, "created platform role");
                    report.added_roles.push(name);
                }
                Ok(CreateOutcome::AlreadyExists) => {
                    // The role list was likely served from a stale cache, next cycle sees it.
                    let err = SyncError::from(PlatformError::RoleExists(name));
                    debug!(%namespace, "{err}");
                    progress.notice(err.to_string());
                    report.errors.push(err);
                }
                Err(err) => return Err(SyncError::PlatformFatal(err)),
            }
        }

        for name in plan.delete {
            self.mirror
                .delete_role(&name)
                .await
                .map_err(SyncError::PlatformFatal)?;
            debug!(%namespace, role = %name, "deleted platform role");
            report.removed_roles.push(name);
        }

        for name in plan.update {
            let Some(role) = policy.get(&name) else {
                continue;
            };
            self.mirror
                .edit_role(&role.attributes())
                .await
                .map_err(SyncError::PlatformFatal)?;
            report.updated_roles.push(name);
        }

        progress.send(Progress::PhaseCompleted {
            phase: Phase::RoleDefinitions,
            elapsed: started.elapsed(),
        });
        Ok(())
    }

    /// Make each platform member's managed roles match their resolved policy memberships.
    ///
    /// Fetch errors abort. A failed update of one member is recorded and the others are still
    /// updated.
    pub async fn sync_members(
        &self,
        namespace: &Namespace,
        progress: &ProgressSink,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let phase_started = Instant::now();
        progress.send(Progress::PhaseStarted(Phase::Membership));

        let started = Instant::now();
        let members = self.mirror.members().await.map_err(SyncError::PlatformFatal)?;
        progress.send(Progress::Fetched {
            snapshot: Snapshot::PlatformMembers,
            elapsed: started.elapsed(),
        });

        let started = Instant::now();
        let roles: PlatformRoles = self.mirror.roles().await.map_err(SyncError::PlatformFatal)?;
        progress.send(Progress::Fetched {
            snapshot: Snapshot::PlatformRoles,
            elapsed: started.elapsed(),
        });

        let started = Instant::now();
        let policy_roles = self.sync_enabled_roles(namespace).await?;
        progress.send(Progress::Fetched {
            snapshot: Snapshot::PolicyRoles,
            elapsed: started.elapsed(),
        });

        let started = Instant::now();
        let mut managed = BTreeSet::new();
        let mut policy: BTreeMap<UserId, BTreeSet<String>> = BTreeMap::new();
        for role in &policy_roles {
            managed.insert(role.name.clone());
            for user_id in self.resolve(namespace, role).await? {
                policy.entry(user_id).or_default().insert(role.name.clone());
            }
        }
        progress.send(Progress::Fetched {
            snapshot: Snapshot::RoleMemberships,
            elapsed: started.elapsed(),
        });

        let plan = plan_member_updates(MembershipSnapshot {
            members: &members,
            roles: &roles,
            managed: &managed,
            policy: &policy,
            no_sync: self.config.no_sync_users(),
        });

        if !plan.unmapped.is_empty() {
            warn!(%namespace, roles = ?plan.unmapped, "roles missing on the platform, not assigned");
        }
        for user_id in &plan.absent {
            debug!(%namespace, %user_id, "policy member is not on the platform");
        }
        for user_id in &plan.skipped {
            debug!(%namespace, %user_id, "skipping no-sync user");
        }
        let mut unlisted = BTreeSet::new();
        for (user_id, roles) in &plan.held {
            warn!(%namespace, %user_id, ?roles, "member holds roles missing from the role list, not updated");
            unlisted.extend(roles.iter().cloned());
        }
        report.errors.extend(
            unlisted
                .into_iter()
                .map(|role| SyncError::PlatformTransient(PlatformError::RoleNotFound(role))),
        );
        report.skipped_users.extend(plan.skipped);

        let started = Instant::now();
        progress.send(Progress::UpdatingUsers(plan.updates.len()));
        for update in plan.updates {
            match self
                .mirror
                .set_member_roles(&update.user_id, &update.role_ids)
                .await
            {
                Ok(()) => report.updated_users.push(update.user_id),
                Err(source) => {
                    warn!(%namespace, user_id = %update.user_id, "updating member failed: {source}");
                    report.errors.push(SyncError::PartialMemberUpdateFailure {
                        user: update.user_id,
                        source,
                    });
                }
            }
        }
        progress.send(Progress::UsersUpdated {
            elapsed: started.elapsed(),
        });

        progress.send(Progress::PhaseCompleted {
            phase: Phase::Membership,
            elapsed: phase_started.elapsed(),
        });
        Ok(())
    }

    /// Resolved members of a single role.
    pub async fn role_membership(
        &self,
        namespace: &Namespace,
        short_name: &str,
    ) -> Result<MemberSet, SyncError> {
        let role = self.store.role(namespace, short_name).await?;
        self.resolve(namespace, &role).await
    }

    /// Every role of a namespace whose resolved members include `user`, ordered by short name.
    ///
    /// Roles whose definition can't be resolved are skipped.
    pub async fn user_roles(
        &self,
        namespace: &Namespace,
        user: &UserId,
    ) -> Result<Vec<Role>, SyncError> {
        let mut roles = self.store.list_roles(namespace).await?;
        roles.sort_by(|a, b| a.short_name.cmp(&b.short_name));

        let mut result = Vec::new();
        for role in roles {
            match self.resolve(namespace, &role).await {
                Ok(members) if members.contains(user) => result.push(role),
                Ok(_) => (),
                Err(SyncError::PolicyStore(err)) => return Err(err.into()),
                Err(err) => debug!(%namespace, role = %role.short_name, "skipping role: {err}"),
            }
        }
        Ok(result)
    }

    /// Sync-enabled policy roles, without the ones whose name is on the ignore list.
    async fn sync_enabled_roles(&self, namespace: &Namespace) -> Result<Vec<Role>, SyncError> {
        let ignored = self.config.ignored_role_names();
        let roles = self.store.list_roles(namespace).await?;
        Ok(roles
            .into_iter()
            .filter(|role| role.sync)
            .filter(|role| {
                let ignore = ignored.contains(&role.name);
                if ignore {
                    debug!(%namespace, role = %role.short_name, "policy role is ignored on the platform");
                }
                !ignore
            })
            .collect())
    }

    /// Fetch the filters a role refers to and resolve its members.
    async fn resolve(&self, namespace: &Namespace, role: &Role) -> Result<MemberSet, SyncError> {
        let mut filters: HashMap<&str, MemberSet> = HashMap::new();
        for name in referenced_filters(role) {
            if self.store.filter_exists(namespace, name).await? {
                let members = self.store.filter_members(namespace, name).await?;
                filters.insert(name, members);
            }
        }

        Ok(resolve_role(role, |name| filters.get(name).cloned())?)
    }
}
