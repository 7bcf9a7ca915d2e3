// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation engine keeping a chat platform's roles in line with a community's policy.
//!
//! [`ReconciliationEngine`] runs a cycle in two phases. Role-definition sync makes the set of
//! platform roles match the policy's sync-enabled roles. Membership sync then gives every
//! platform member exactly the managed roles their resolved policy memberships call for. Roles
//! on the ignore list and roles the policy doesn't manage are left alone.
//!
//! Cycles are requested through a [`SyncHandle`] and run one after another by the
//! [`SyncScheduler`], each request gets its own stream of [`Progress`] messages.
//!
//! ## Example
//!
//! ```rust,ignore
//! let engine = Arc::new(ReconciliationEngine::new(store, gateway, SyncConfig::new()));
//! let (handle, _task) = SyncScheduler::spawn(engine, CancellationToken::new());
//!
//! let mut progress = handle.enqueue(SyncRequest::new(Namespace::from("corp")))?;
//! while let Some(message) = progress.recv().await {
//!     println!("{message}");
//! }
//! ```
mod config;
mod engine;
pub mod plan;
mod progress;
mod report;
mod scheduler;
mod sig;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;

pub use config::SyncConfig;
pub use engine::ReconciliationEngine;
pub use progress::{Progress, ProgressSink, Snapshot};
pub use report::{CycleError, Phase, SyncError, SyncReport};
pub use scheduler::{ScheduleError, SyncHandle, SyncRequest, SyncScheduler};
pub use sig::{SigCommands, SigError};
