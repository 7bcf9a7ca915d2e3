// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use rolesync_core::Namespace;
use rolesync_platform::PlatformGateway;
use rolesync_store::PolicyStore;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::ReconciliationEngine;
use crate::progress::{Progress, ProgressSink};

/// A request to run one reconciliation cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequest {
    pub namespace: Namespace,

    /// Chat channel the request came from, for the requester's own bookkeeping.
    pub channel_id: Option<String>,

    /// Who asked for the sync.
    pub requester: Option<String>,

    /// Send informational progress messages, not only failures and the final result.
    pub notify: bool,
}

impl SyncRequest {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            channel_id: None,
            requester: None,
            notify: true,
        }
    }

    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Only report failures and the final result.
    pub fn silent(mut self) -> Self {
        self.notify = false;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The queue has no open slot, the request was dropped.
    #[error("sync queue is full")]
    QueueFull,

    /// The scheduler is not running anymore.
    #[error("sync scheduler has shut down")]
    Closed,
}

/// Events sent to the sync scheduler.
#[derive(Debug)]
pub(crate) enum ToSyncScheduler {
    Sync {
        request: SyncRequest,
        progress: ProgressSink,
    },
}

/// Handle for enqueuing sync requests.
#[derive(Clone, Debug)]
pub struct SyncHandle {
    tx: Sender<ToSyncScheduler>,
}

impl SyncHandle {
    /// Queue a reconciliation cycle and return the receiver for its progress messages.
    ///
    /// Returns immediately. The last message on the receiver is [`Progress::Finished`].
    pub fn enqueue(
        &self,
        request: SyncRequest,
    ) -> Result<UnboundedReceiver<Progress>, ScheduleError> {
        let (progress, rx) = ProgressSink::channel(request.notify);
        debug!(namespace = %request.namespace, requester = ?request.requester, "enqueue sync");

        match self.tx.try_send(ToSyncScheduler::Sync { request, progress }) {
            Ok(()) => Ok(rx),
            Err(TrySendError::Full(_)) => Err(ScheduleError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(ScheduleError::Closed),
        }
    }
}

/// Single consumer of the sync queue.
///
/// Runs one reconciliation cycle at a time, in the order requests were accepted.
#[derive(Debug)]
pub struct SyncScheduler<S, G> {
    engine: Arc<ReconciliationEngine<S, G>>,
    inbox: Receiver<ToSyncScheduler>,
}

impl<S, G> SyncScheduler<S, G>
where
    S: PolicyStore + 'static,
    G: PlatformGateway + 'static,
{
    /// Create a new instance of the `SyncScheduler` and return it along with a handle.
    pub fn new(engine: Arc<ReconciliationEngine<S, G>>) -> (Self, SyncHandle) {
        let capacity = engine.config().effective_queue_capacity();
        let (tx, rx) = mpsc::channel(capacity);
        let scheduler = Self { engine, inbox: rx };
        (scheduler, SyncHandle { tx })
    }

    /// Spawn the scheduler onto the tokio runtime.
    pub fn spawn(
        engine: Arc<ReconciliationEngine<S, G>>,
        token: CancellationToken,
    ) -> (SyncHandle, tokio::task::JoinHandle<()>) {
        let (scheduler, handle) = Self::new(engine);
        let task = tokio::spawn(scheduler.run(token));
        (handle, task)
    }

    /// The sync event loop.
    ///
    /// Stops on cancellation or once every handle was dropped and the queue is drained. A
    /// cycle which is running when the token is cancelled runs to completion first.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!("sync scheduler received shutdown signal");
                    break;
                }
                msg = self.inbox.recv() => {
                    let Some(msg) = msg else {
                        debug!("sync scheduler inbox closed");
                        break;
                    };

                    match msg {
                        ToSyncScheduler::Sync { request, progress } => {
                            info!(
                                namespace = %request.namespace,
                                channel = ?request.channel_id,
                                requester = ?request.requester,
                                "running sync"
                            );
                            let result = self.engine.run_sync(&request.namespace, &progress).await;
                            progress.finish(result);
                        }
                    }
                }
            }
        }
    }
}
