// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dry-run node for rolesync.
//!
//! Loads a community's policy and a snapshot of its chat platform from a JSON fixture into the
//! in-memory collaborators, queues one reconciliation cycle and prints its progress, the report
//! and what the platform looks like afterwards.
mod fixture;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rolesync_core::{Namespace, UserId};
use rolesync_engine::{Progress, ReconciliationEngine, SyncConfig, SyncRequest, SyncScheduler};
use rolesync_platform::MemoryPlatform;
use rolesync_store::MemoryPolicyStore;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::fixture::Fixture;

pub fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

#[derive(Parser)]
struct Args {
    /// JSON fixture with the policy and the platform state.
    #[arg(value_name = "FIXTURE")]
    fixture: PathBuf,

    /// Sync this namespace instead of the one named in the fixture.
    #[arg(short = 'n', long, value_name = "NAMESPACE")]
    namespace: Option<String>,

    /// JSON file with sync configuration, replaces the fixture's.
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Platform role of the bot.
    #[arg(long, value_name = "ROLE")]
    bot_role: Option<String>,

    /// Platform role which is never touched, can be repeated.
    #[arg(long = "ignore-role", value_name = "ROLE")]
    ignored_roles: Vec<String>,

    /// User whose roles are never changed, can be repeated.
    #[arg(long = "no-sync-user", value_name = "USER_ID")]
    no_sync_users: Vec<String>,

    /// Number of members fetched per page.
    #[arg(long, value_name = "SIZE")]
    page_size: Option<u16>,

    /// Only print failures and the final result.
    #[arg(short = 'q', long, action)]
    quiet: bool,

    /// Print the final platform state as JSON.
    #[arg(long, action)]
    json: bool,
}

impl Args {
    /// Configuration file or fixture settings, overridden by command line flags.
    fn sync_config(&self, fixture: &Fixture) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => fixture.config.clone().unwrap_or_default(),
        };

        if let Some(bot_role) = &self.bot_role {
            config = config.bot_role(bot_role);
        }
        for role in &self.ignored_roles {
            config = config.ignore_role(role);
        }
        for user in &self.no_sync_users {
            config = config.no_sync_user(UserId::from(user.as_str()));
        }
        if let Some(page_size) = self.page_size {
            config = config.page_size(page_size);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let args = Args::parse();
    let fixture = Fixture::load(&args.fixture)?;
    let config = args.sync_config(&fixture)?;
    let namespace = args
        .namespace
        .clone()
        .map(Namespace::new)
        .unwrap_or_else(|| fixture.namespace.clone());

    let store = Arc::new(MemoryPolicyStore::new());
    let platform = Arc::new(MemoryPlatform::new());
    fixture.seed(&store, &platform).await?;
    info!(%namespace, "loaded fixture {}", args.fixture.display());

    let engine = Arc::new(ReconciliationEngine::new(store, platform.clone(), config));
    let token = CancellationToken::new();
    let (handle, task) = SyncScheduler::spawn(engine, token.clone());

    let mut request = SyncRequest::new(namespace).requester("rolesync-node");
    if args.quiet {
        request = request.silent();
    }
    let mut progress = handle.enqueue(request)?;

    let mut outcome = None;
    while let Some(message) = progress.recv().await {
        match message {
            Progress::Finished(result) => {
                outcome = Some(result);
                break;
            }
            message => println!("{message}"),
        }
    }

    token.cancel();
    task.await.context("sync scheduler task failed")?;

    let report = outcome.context("sync finished without a result")??;
    println!();
    if report.is_noop() {
        println!("platform already matches the policy");
    }
    println!("added roles:   {:?}", report.added_roles);
    println!("removed roles: {:?}", report.removed_roles);
    println!("updated roles: {:?}", report.updated_roles);
    println!("updated users: {:?}", report.updated_users);
    println!("skipped users: {:?}", report.skipped_users);
    for err in &report.errors {
        println!("error: {err}");
    }

    let members = platform.all_members().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&members)?);
    } else {
        println!();
        println!("platform roles: {:?}", platform.role_names().await);
        for member in members {
            println!(
                "{} ({}): {:?}",
                member.user_id, member.username, member.role_names
            );
        }
    }

    Ok(())
}
