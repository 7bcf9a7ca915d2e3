// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;
use tracing::{error, info};

use crate::report::{CycleError, Phase, SyncReport};

/// Snapshot fetched during membership sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Snapshot {
    PlatformMembers,
    PlatformRoles,
    PolicyRoles,
    RoleMemberships,
}

impl Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Snapshot::PlatformMembers => write!(f, "platform members"),
            Snapshot::PlatformRoles => write!(f, "platform roles"),
            Snapshot::PolicyRoles => write!(f, "policy roles"),
            Snapshot::RoleMemberships => write!(f, "role memberships"),
        }
    }
}

/// Message sent back to whoever requested a sync.
#[derive(Debug)]
pub enum Progress {
    PhaseStarted(Phase),
    PhaseCompleted { phase: Phase, elapsed: Duration },
    Fetched { snapshot: Snapshot, elapsed: Duration },
    UpdatingUsers(usize),
    UsersUpdated { elapsed: Duration },
    CycleCompleted { elapsed: Duration },

    /// Something went wrong but the cycle carries on.
    Notice(String),

    /// The cycle was aborted, carries the error message.
    Fatal(String),

    /// Last message of every request.
    Finished(Result<SyncReport, CycleError>),
}

impl Progress {
    /// Returns `true` for messages which are only sent when the requester asked for them.
    pub fn is_informational(&self) -> bool {
        !matches!(self, Progress::Fatal(_) | Progress::Finished(_))
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Progress::PhaseStarted(phase) => write!(f, "Starting {phase}"),
            Progress::PhaseCompleted { phase, elapsed } => {
                write!(f, "Completed {phase} [{elapsed:?}]")
            }
            Progress::Fetched { snapshot, elapsed } => {
                write!(f, "Got all {snapshot} [{elapsed:?}]")
            }
            Progress::UpdatingUsers(count) => write!(f, "Updating {count} platform users"),
            Progress::UsersUpdated { elapsed } => write!(f, "Updated platform roles [{elapsed:?}]"),
            Progress::CycleCompleted { elapsed } => {
                write!(f, "Completed All Syncing [{elapsed:?}]")
            }
            Progress::Notice(message) => write!(f, "{message}"),
            Progress::Fatal(message) => write!(f, "{message}"),
            Progress::Finished(Ok(report)) => write!(f, "Finished: {report}"),
            Progress::Finished(Err(err)) => write!(f, "Finished with error: {err}"),
        }
    }
}

/// Sending half of a progress stream.
///
/// Every message is logged. Informational messages only reach the requester when they asked to
/// be notified, fatal messages and the final result always do.
#[derive(Clone, Debug)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<Progress>>,
    notify: bool,
}

impl ProgressSink {
    /// Create a sink along with the receiver the requester listens on.
    pub fn channel(notify: bool) -> (Self, UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx), notify }, rx)
    }

    /// A sink which only logs.
    pub fn silent() -> Self {
        Self {
            tx: None,
            notify: false,
        }
    }

    pub fn send(&self, progress: Progress) {
        if progress.is_informational() {
            info!("{progress}");
            if !self.notify {
                return;
            }
        } else if let Progress::Fatal(message) = &progress {
            error!("{message}");
        }

        if let Some(tx) = &self.tx {
            // Requesters may stop listening at any time, that's no reason to stop syncing.
            let _ = tx.send(progress);
        }
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.send(Progress::Notice(message.into()));
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.send(Progress::Fatal(message.into()));
    }

    pub fn finish(self, result: Result<SyncReport, CycleError>) {
        self.send(Progress::Finished(result));
    }
}
