// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use rolesync_core::{Filter, FilterRef, MemberSet, Namespace, Role, RoleKey, UserId};
use rolesync_platform::{MemoryPlatform, Mutation, PlatformError};
use rolesync_store::{FilterMembership, MemoryPolicyStore, PolicyStore, StoreError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::test_utils::{TestCommunity, setup_logging};
use crate::{
    CycleError, Phase, Progress, ProgressSink, ReconciliationEngine, ScheduleError, SigCommands,
    SigError, Snapshot, SyncConfig, SyncError, SyncReport, SyncRequest, SyncScheduler,
};

fn names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Collect progress messages until the final result arrives.
async fn finished(
    rx: &mut UnboundedReceiver<Progress>,
) -> (Vec<Progress>, Result<SyncReport, CycleError>) {
    let mut messages = Vec::new();
    while let Some(progress) = rx.recv().await {
        match progress {
            Progress::Finished(result) => return (messages, result),
            progress => messages.push(progress),
        }
    }
    panic!("progress stream ended without a result");
}

#[tokio::test]
async fn ignored_roles_are_left_alone() {
    setup_logging();

    let community = TestCommunity::new(SyncConfig::new().ignore_role("C"));
    community.platform.create_role_with_id("A", "10").await;
    community.platform.create_role_with_id("B", "11").await;
    community.platform.create_role_with_id("C", "12").await;
    community.filter("members", &[]).await;
    for name in ["A", "B", "D"] {
        community.synced_role(name, "members").await;
    }

    let mut report = SyncReport::default();
    community
        .engine
        .sync_roles(&community.namespace, &ProgressSink::silent(), &mut report)
        .await
        .unwrap();

    assert_eq!(report.added_roles, vec!["D".to_string()]);
    assert!(report.removed_roles.is_empty());
    assert_eq!(report.updated_roles, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(
        community.platform.role_names().await,
        names(&["@everyone", "A", "B", "C", "D"])
    );
}

#[tokio::test]
async fn role_definition_sync_is_idempotent() {
    let community = TestCommunity::new(SyncConfig::new().bot_role("Bot"));
    community.platform.create_role_with_id("Bot", "1").await;
    community.platform.create_role_with_id("Retired", "2").await;
    community.filter("members", &[]).await;
    community.synced_role("Pilots", "members").await;

    // Roles without the sync flag are never mirrored.
    let unsynced = Role::new(
        "miners",
        "Miners",
        FilterRef::named("members"),
        FilterRef::Wildcard,
    );
    community
        .store
        .add_role(&community.namespace, unsynced)
        .await
        .unwrap();

    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();
    assert_eq!(report.added_roles, vec!["Pilots".to_string()]);
    assert_eq!(report.removed_roles, vec!["Retired".to_string()]);
    assert_eq!(
        community.platform.role_names().await,
        names(&["@everyone", "Bot", "Pilots"])
    );

    community.platform.clear_mutations().await;
    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();
    assert!(report.added_roles.is_empty());
    assert!(report.removed_roles.is_empty());
    assert_eq!(report.updated_roles, vec!["Pilots".to_string()]);
    assert_eq!(
        community.platform.mutations().await,
        vec![Mutation::EditRole("Pilots".into())]
    );
}

#[tokio::test]
async fn surviving_roles_carry_policy_attributes() {
    let community = TestCommunity::new(SyncConfig::new());
    community.platform.create_role_with_id("Pilots", "10").await;
    community.filter("members", &[]).await;
    community.synced_role("Pilots", "members").await;
    for (key, value) in [
        (RoleKey::Color, "16711680"),
        (RoleKey::Hoist, "true"),
        (RoleKey::Mentionable, "1"),
    ] {
        community
            .store
            .update_role(&community.namespace, "pilots", key, value)
            .await
            .unwrap();
    }

    community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();

    let attributes = community.platform.role_attributes("Pilots").await.unwrap();
    assert_eq!(attributes.color, 0xff0000);
    assert!(attributes.hoist);
    assert!(attributes.mentionable);
    assert!(!attributes.managed);
}

#[tokio::test]
async fn existing_role_on_create_is_benign() {
    let community = TestCommunity::new(SyncConfig::new());
    community.platform.create_role_with_id("Pilots", "10").await;
    // The role list doesn't show the role, creating it clashes.
    community.platform.make_stale("Pilots").await;
    community.filter("members", &["1"]).await;
    community.synced_role("Pilots", "members").await;
    community.platform_members(&["1"]).await;

    let (progress, mut rx) = ProgressSink::channel(true);
    let report = community
        .engine
        .run_sync(&community.namespace, &progress)
        .await
        .unwrap();
    drop(progress);

    assert!(report.added_roles.is_empty());
    assert_matches!(
        report.errors.as_slice(),
        [SyncError::PlatformTransient(PlatformError::RoleExists(name))] if name == "Pilots"
    );

    let mut notices = Vec::new();
    let mut completed = false;
    while let Some(progress) = rx.recv().await {
        match progress {
            Progress::Notice(message) => notices.push(message),
            Progress::CycleCompleted { .. } => completed = true,
            Progress::Fatal(message) => panic!("unexpected failure: {message}"),
            _ => (),
        }
    }
    assert_eq!(notices, vec!["The role 'Pilots' already exists".to_string()]);
    assert!(completed);
}

#[tokio::test]
async fn failed_create_aborts_the_cycle() {
    let community = TestCommunity::new(SyncConfig::new());
    community.filter("members", &["1"]).await;
    community.synced_role("A", "members").await;
    community.synced_role("D", "members").await;
    community.platform_members(&["1"]).await;
    community
        .platform
        .fail_create("D", PlatformError::Request("Missing Permissions".into()))
        .await;

    let (progress, mut rx) = ProgressSink::channel(false);
    let result = community
        .engine
        .run_sync(&community.namespace, &progress)
        .await;
    drop(progress);

    let err = result.unwrap_err();
    assert_eq!(err.phase, Phase::RoleDefinitions);
    assert_matches!(err.error, SyncError::PlatformFatal(PlatformError::Request(_)));
    assert_eq!(err.report.added_roles, vec!["A".to_string()]);

    // Membership sync never started.
    assert_eq!(community.platform.member_page_requests().await, 0);

    // Quiet requesters still hear about the failure, with the error text.
    assert_matches!(
        rx.recv().await,
        Some(Progress::Fatal(message)) if message.contains("Missing Permissions")
    );
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn members_converge_to_policy() {
    let community = TestCommunity::new(SyncConfig::new().bot_role("Bot"));
    community.platform.create_role_with_id("Bot", "1").await;
    community.platform.create_role_with_id("Pilots", "2").await;
    community.filter("officers", &["1", "2"]).await;
    community.filter("pilots", &["2", "3", "99"]).await;
    community.synced_role("Officers", "officers").await;
    community.synced_role("Pilots", "pilots").await;
    community.platform_members(&["1", "2", "3", "4"]).await;

    let bot_user = UserId::from("4");
    community.platform.assign(&bot_user, "Bot").await.unwrap();
    community.platform.assign(&bot_user, "Pilots").await.unwrap();

    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(
        report.updated_users,
        vec![
            UserId::from("1"),
            UserId::from("2"),
            UserId::from("3"),
            UserId::from("4")
        ]
    );

    let roles = |id: &str| {
        let platform = community.platform.clone();
        let user_id = UserId::from(id);
        async move { platform.member_roles(&user_id).await.unwrap() }
    };
    assert_eq!(roles("1").await, names(&["Officers"]));
    assert_eq!(roles("2").await, names(&["Officers", "Pilots"]));
    assert_eq!(roles("3").await, names(&["Pilots"]));
    // Managed roles are taken away, the bot role stays.
    assert_eq!(roles("4").await, names(&["Bot"]));

    // Converged, nothing left to do.
    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();
    assert!(report.updated_users.is_empty());
}

#[tokio::test]
async fn one_failing_member_does_not_block_others() {
    let community = TestCommunity::new(SyncConfig::new());
    community.filter("officers", &["1", "2", "3"]).await;
    community.synced_role("Officers", "officers").await;
    community.platform_members(&["1", "2", "3"]).await;
    community
        .platform
        .fail_member_update(&UserId::from("2"), PlatformError::Timeout(Duration::from_secs(20)))
        .await;

    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();

    assert_eq!(report.updated_users, vec![UserId::from("1"), UserId::from("3")]);
    assert_matches!(
        report.errors.as_slice(),
        [SyncError::PartialMemberUpdateFailure { user, .. }] if user == &UserId::from("2")
    );
    assert_eq!(
        community.platform.member_roles(&UserId::from("2")).await,
        Some(BTreeSet::new())
    );
}

#[tokio::test]
async fn no_sync_users_are_never_touched() {
    let community = TestCommunity::new(SyncConfig::new().no_sync_user("1"));
    community.platform.create_role_with_id("Pilots", "2").await;
    community.filter("officers", &["1", "2"]).await;
    community.synced_role("Officers", "officers").await;
    community.platform_members(&["1", "2"]).await;

    let owner = UserId::from("1");
    community.platform.assign(&owner, "Pilots").await.unwrap();

    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();

    // Pilots isn't in the policy and gets deleted, the owner's managed roles are left alone.
    assert_eq!(report.skipped_users, vec![owner.clone()]);
    assert_eq!(report.updated_users, vec![UserId::from("2")]);
    assert_eq!(community.platform.member_roles(&owner).await, Some(BTreeSet::new()));
    assert!(
        !community
            .platform
            .mutations()
            .await
            .iter()
            .any(|mutation| matches!(mutation, Mutation::SetMemberRoles(user, _) if user == &owner))
    );
}

#[tokio::test]
async fn ignored_policy_roles_are_never_assigned() {
    let community =
        TestCommunity::new(SyncConfig::new().bot_role("Bot").ignore_role("Server Booster"));
    community.platform.create_role_with_id("Bot", "1").await;
    community.platform.create_role_with_id("Server Booster", "2").await;
    community.filter("officers", &["1"]).await;
    for name in ["Bot", "Server Booster", "Officers"] {
        community.synced_role(name, "officers").await;
    }
    community.platform_members(&["1", "2"]).await;

    let booster = UserId::from("2");
    community.platform.assign(&booster, "Server Booster").await.unwrap();

    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.added_roles, vec!["Officers".to_string()]);
    assert_eq!(report.updated_users, vec![UserId::from("1")]);
    assert_eq!(
        community.platform.member_roles(&UserId::from("1")).await,
        Some(names(&["Officers"]))
    );
    assert_eq!(
        community.platform.member_roles(&booster).await,
        Some(names(&["Server Booster"]))
    );
}

#[tokio::test]
async fn unlisted_roles_of_a_member_are_not_stripped() {
    let community = TestCommunity::new(SyncConfig::new());
    community.platform.create_role_with_id("Booster", "2").await;
    community.filter("officers", &["1"]).await;
    community.synced_role("Officers", "officers").await;
    community.platform_members(&["1"]).await;

    let user = UserId::from("1");
    community.platform.assign(&user, "Booster").await.unwrap();
    // Booster exists but the role list doesn't show it yet.
    community.platform.make_stale("Booster").await;

    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();

    assert_eq!(report.added_roles, vec!["Officers".to_string()]);
    assert!(report.updated_users.is_empty());
    assert_matches!(
        report.errors.as_slice(),
        [SyncError::PlatformTransient(PlatformError::RoleNotFound(role))] if role == "Booster"
    );
    assert_eq!(
        community.platform.member_roles(&user).await,
        Some(names(&["Booster"]))
    );
}

/// Serves the roles of a memory store plus roles the memory store would refuse to take.
struct UncheckedRoles {
    store: MemoryPolicyStore,
    extra: Vec<Role>,
}

#[async_trait]
impl PolicyStore for UncheckedRoles {
    async fn list_roles(&self, namespace: &Namespace) -> Result<Vec<Role>, StoreError> {
        let mut roles = self.store.list_roles(namespace).await?;
        roles.extend(self.extra.iter().cloned());
        Ok(roles)
    }

    async fn filter_members(
        &self,
        namespace: &Namespace,
        filter: &str,
    ) -> Result<MemberSet, StoreError> {
        self.store.filter_members(namespace, filter).await
    }

    async fn filter_exists(&self, namespace: &Namespace, filter: &str) -> Result<bool, StoreError> {
        self.store.filter_exists(namespace, filter).await
    }
}

async fn unchecked_engine(
    extra: Role,
) -> ReconciliationEngine<UncheckedRoles, MemoryPlatform> {
    let platform = Arc::new(MemoryPlatform::new());
    platform.add_member(UserId::from("1"), "user1").await;
    let store = UncheckedRoles {
        store: MemoryPolicyStore::new(),
        extra: vec![extra],
    };
    ReconciliationEngine::new(Arc::new(store), platform, SyncConfig::new())
}

#[tokio::test]
async fn invalid_role_definition_aborts_membership_sync() {
    let everyone = Role::new("all", "All", FilterRef::Wildcard, FilterRef::Wildcard).with_sync(true);
    let engine = unchecked_engine(everyone).await;
    let ns = Namespace::from("corp");

    let err = engine
        .run_sync(&ns, &ProgressSink::silent())
        .await
        .unwrap_err();

    assert_eq!(err.phase, Phase::Membership);
    assert_matches!(err.error, SyncError::InvalidRoleDefinition(role) if role == "all");
    assert_eq!(err.report.added_roles, vec!["All".to_string()]);
    assert!(err.report.updated_users.is_empty());

    assert_matches!(
        engine.role_membership(&ns, "all").await,
        Err(SyncError::InvalidRoleDefinition(_))
    );
    // Unresolvable roles are left out of membership listings.
    assert!(engine.user_roles(&ns, &UserId::from("1")).await.unwrap().is_empty());
}

#[tokio::test]
async fn dangling_filter_aborts_membership_sync() {
    let ghosts = Role::new("ghosts", "Ghosts", FilterRef::named("ghosts"), FilterRef::Wildcard)
        .with_sync(true);
    let engine = unchecked_engine(ghosts).await;

    let err = engine
        .run_sync(&Namespace::from("corp"), &ProgressSink::silent())
        .await
        .unwrap_err();

    assert_eq!(err.phase, Phase::Membership);
    assert_matches!(err.error, SyncError::FilterNotFound(filter) if filter == "ghosts");
}

#[tokio::test]
async fn failed_member_fetch_aborts() {
    let community = TestCommunity::new(SyncConfig::new());
    community.filter("officers", &["1"]).await;
    community.synced_role("Officers", "officers").await;
    community
        .platform
        .fail_list_members(PlatformError::Request("Bad Gateway".into()))
        .await;

    let err = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap_err();
    assert_eq!(err.phase, Phase::Membership);
    assert_matches!(err.error, SyncError::PlatformFatal(_));
}

#[tokio::test]
async fn failed_delete_aborts_until_healed() {
    let community = TestCommunity::new(SyncConfig::new());
    community.platform.create_role_with_id("Retired", "10").await;
    community.platform.create_role_with_id("Pilots", "11").await;
    community.filter("pilots", &[]).await;
    community.synced_role("Pilots", "pilots").await;
    community
        .platform
        .fail_delete("Retired", PlatformError::Request("Missing Permissions".into()))
        .await;
    community
        .platform
        .fail_edit("Pilots", PlatformError::Request("Missing Permissions".into()))
        .await;

    let err = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap_err();
    assert_eq!(err.phase, Phase::RoleDefinitions);
    assert!(err.report.removed_roles.is_empty());
    assert!(err.report.updated_roles.is_empty());

    community.platform.heal().await;
    let report = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap();
    assert_eq!(report.removed_roles, vec!["Retired".to_string()]);
    assert_eq!(report.updated_roles, vec!["Pilots".to_string()]);
}

#[tokio::test]
async fn unreadable_role_list_aborts_before_any_mutation() {
    let community = TestCommunity::new(SyncConfig::new());
    community.filter("pilots", &[]).await;
    community.synced_role("Pilots", "pilots").await;
    community
        .platform
        .fail_list_roles(PlatformError::Timeout(Duration::from_secs(20)))
        .await;

    let err = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap_err();
    assert_matches!(err.error, SyncError::PlatformFatal(PlatformError::Timeout(_)));
    assert!(community.platform.mutations().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_role_edits_time_out() {
    let community = TestCommunity::new(
        SyncConfig::new().edit_role_timeout(Duration::from_secs(60)),
    );
    community.platform.create_role_with_id("Pilots", "10").await;
    community.filter("pilots", &[]).await;
    community.synced_role("Pilots", "pilots").await;
    community.platform.delay_edits(Duration::from_secs(120)).await;

    let err = community
        .engine
        .run_sync(&community.namespace, &ProgressSink::silent())
        .await
        .unwrap_err();
    assert_eq!(err.phase, Phase::RoleDefinitions);
    assert_matches!(
        err.error,
        SyncError::PlatformFatal(PlatformError::Timeout(duration)) if duration == Duration::from_secs(60)
    );
}

#[tokio::test]
async fn membership_queries() {
    let community = TestCommunity::new(SyncConfig::new());
    let ns = &community.namespace;
    community.filter("officers", &["u1", "u2"]).await;
    community.filter("veterans", &["u2", "u3"]).await;
    for role in [
        Role::new(
            "senior",
            "Senior Officers",
            FilterRef::named("officers"),
            FilterRef::named("veterans"),
        ),
        Role::new("officers", "Officers", FilterRef::named("officers"), FilterRef::Wildcard),
    ] {
        community.store.add_role(ns, role).await.unwrap();
    }

    let members = community.engine.role_membership(ns, "senior").await.unwrap();
    assert_eq!(members, BTreeSet::from([UserId::from("u2")]));
    let members = community.engine.role_membership(ns, "officers").await.unwrap();
    assert_eq!(members, BTreeSet::from([UserId::from("u1"), UserId::from("u2")]));
    assert_matches!(
        community.engine.role_membership(ns, "nope").await,
        Err(SyncError::PolicyStore(_))
    );

    let short_names = |roles: Vec<Role>| -> Vec<String> {
        roles.into_iter().map(|role| role.short_name).collect()
    };
    let roles = community.engine.user_roles(ns, &UserId::from("u2")).await.unwrap();
    assert_eq!(short_names(roles), vec!["officers", "senior"]);
    let roles = community.engine.user_roles(ns, &UserId::from("u3")).await.unwrap();
    assert!(roles.is_empty());
}

#[tokio::test]
async fn scheduler_reports_progress_in_order() {
    let community = TestCommunity::new(SyncConfig::new());
    community.filter("officers", &["1"]).await;
    community.synced_role("Officers", "officers").await;
    community.platform_members(&["1"]).await;

    let token = CancellationToken::new();
    let (handle, task) = SyncScheduler::spawn(community.engine.clone(), token.clone());

    let mut rx = handle
        .enqueue(SyncRequest::new(community.namespace.clone()).channel("ops"))
        .unwrap();
    let (messages, result) = finished(&mut rx).await;
    let report = result.unwrap();
    assert_eq!(report.added_roles, vec!["Officers".to_string()]);
    assert_eq!(report.updated_users, vec![UserId::from("1")]);

    assert_eq!(messages.len(), 11);
    assert_matches!(messages[0], Progress::PhaseStarted(Phase::RoleDefinitions));
    assert_matches!(
        messages[1],
        Progress::PhaseCompleted {
            phase: Phase::RoleDefinitions,
            ..
        }
    );
    assert_matches!(messages[2], Progress::PhaseStarted(Phase::Membership));
    assert_matches!(
        messages[3],
        Progress::Fetched {
            snapshot: Snapshot::PlatformMembers,
            ..
        }
    );
    assert_matches!(
        messages[6],
        Progress::Fetched {
            snapshot: Snapshot::RoleMemberships,
            ..
        }
    );
    assert_matches!(messages[7], Progress::UpdatingUsers(1));
    assert_matches!(messages[8], Progress::UsersUpdated { .. });
    assert_matches!(
        messages[9],
        Progress::PhaseCompleted {
            phase: Phase::Membership,
            ..
        }
    );
    assert_matches!(messages[10], Progress::CycleCompleted { .. });

    // Silent requests only get the result.
    let mut rx = handle
        .enqueue(SyncRequest::new(community.namespace.clone()).silent())
        .unwrap();
    let (messages, result) = finished(&mut rx).await;
    assert!(messages.is_empty());
    assert!(result.unwrap().is_noop());

    token.cancel();
    task.await.unwrap();
    assert_matches!(
        handle.enqueue(SyncRequest::new(community.namespace.clone())),
        Err(ScheduleError::Closed)
    );
}

#[tokio::test]
async fn requests_run_one_after_another() {
    let community = TestCommunity::new(SyncConfig::new().queue_capacity(2));
    let corp = community.namespace.clone();
    let alliance = Namespace::from("alliance");

    community.filter("members", &[]).await;
    community.synced_role("Corp", "members").await;
    community
        .store
        .add_filter(&alliance, Filter::new("members", "Alliance members"))
        .await
        .unwrap();
    community
        .store
        .add_role(
            &alliance,
            Role::new("alliance", "Alliance", FilterRef::named("members"), FilterRef::Wildcard)
                .with_sync(true),
        )
        .await
        .unwrap();

    // Queue both before the scheduler runs.
    let (scheduler, handle) = SyncScheduler::new(community.engine.clone());
    let mut first = handle.enqueue(SyncRequest::new(corp).silent()).unwrap();
    let mut second = handle.enqueue(SyncRequest::new(alliance).silent()).unwrap();
    assert_eq!(
        handle
            .enqueue(SyncRequest::new(community.namespace.clone()))
            .map(|_| ()),
        Err(ScheduleError::QueueFull)
    );

    let task = tokio::spawn(scheduler.run(CancellationToken::new()));
    finished(&mut first).await.1.unwrap();
    finished(&mut second).await.1.unwrap();

    assert_eq!(
        community.platform.mutations().await,
        vec![
            Mutation::CreateRole("Corp".into()),
            Mutation::CreateRole("Alliance".into()),
            Mutation::DeleteRole("Corp".into()),
        ]
    );

    // Dropping the last handle stops the scheduler.
    drop(handle);
    task.await.unwrap();
}

#[tokio::test]
async fn full_queue_fails_fast() {
    let community = TestCommunity::new(SyncConfig::new());
    let (scheduler, handle) = SyncScheduler::new(community.engine.clone());

    assert!(
        handle
            .enqueue(SyncRequest::new(community.namespace.clone()))
            .is_ok()
    );
    assert_matches!(
        handle.enqueue(SyncRequest::new(community.namespace.clone())),
        Err(ScheduleError::QueueFull)
    );

    drop(scheduler);
    assert_matches!(
        handle.enqueue(SyncRequest::new(community.namespace.clone())),
        Err(ScheduleError::Closed)
    );
}

#[tokio::test]
async fn sig_membership_commands() {
    let community = TestCommunity::new(SyncConfig::new());
    let ns = &community.namespace;
    community.filter("members", &["1", "2"]).await;
    community.filter("sig-pvp", &[]).await;
    community.filter("sig-mining", &[]).await;
    community.platform_members(&["1", "2"]).await;

    let pvp = Role::new("pvp", "PvP", FilterRef::named("members"), FilterRef::named("sig-pvp"))
        .with_sync(true)
        .with_sig(true, true);
    let mining = Role::new(
        "mining",
        "Mining",
        FilterRef::named("members"),
        FilterRef::named("sig-mining"),
    )
    .with_sync(true)
    .with_sig(true, false);
    let plain = Role::new("plain", "Plain", FilterRef::named("members"), FilterRef::Wildcard);
    for role in [pvp, mining, plain] {
        community.store.add_role(ns, role).await.unwrap();
    }

    let (handle, _task) = SyncScheduler::spawn(community.engine.clone(), CancellationToken::new());
    let sigs = SigCommands::new(community.store.clone(), handle);
    let alice = UserId::from("1");

    let mut rx = sigs.join(ns, "pvp", &alice).await.unwrap();
    let (messages, result) = finished(&mut rx).await;
    assert!(messages.is_empty());
    result.unwrap();
    assert_eq!(community.platform.member_roles(&alice).await, Some(names(&["PvP"])));

    assert_matches!(
        sigs.join(ns, "mining", &alice).await,
        Err(SigError::NotJoinable(_))
    );
    assert_matches!(sigs.join(ns, "plain", &alice).await, Err(SigError::NotASig(_)));

    // Administrators may add to SIGs which aren't joinable.
    let mut rx = sigs.add(ns, "mining", &alice).await.unwrap();
    finished(&mut rx).await.1.unwrap();
    assert_eq!(
        community.platform.member_roles(&alice).await,
        Some(names(&["Mining", "PvP"]))
    );

    let mut rx = sigs.leave(ns, "pvp", &alice).await.unwrap();
    finished(&mut rx).await.1.unwrap();
    let mut rx = sigs.remove(ns, "mining", &alice).await.unwrap();
    finished(&mut rx).await.1.unwrap();
    assert_eq!(community.platform.member_roles(&alice).await, Some(BTreeSet::new()));

    // Leaving a SIG doesn't need it to be joinable.
    community
        .store
        .add_members(ns, "sig-mining", &[alice.clone()])
        .await
        .unwrap();
    let mut rx = sigs.leave(ns, "mining", &alice).await.unwrap();
    finished(&mut rx).await.1.unwrap();
    assert!(
        !community
            .store
            .filter_members(ns, "sig-mining")
            .await
            .unwrap()
            .contains(&alice)
    );
}
