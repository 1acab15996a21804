//! # Sync Scheduler
//!
//! Single-flight request queue in front of a [`ReconciliationEngine`].
//!
//! Every trigger (startup auto-sync, a user-initiated reindex, file change
//! notifications) becomes a message on one unbounded channel. A single worker
//! task owns the engine, so at most one cycle runs at a time. Requests that
//! pile up while a cycle is running are coalesced into the next pass:
//!
//! - a full reindex subsumes any incremental request
//! - a full or incremental pass subsumes queued file events, since it
//!   re-reads every document
//! - a folder change cannot be reduced to paths and queues an incremental pass
//! - file events are reduced to the set of touched paths; a rename touches
//!   both its old and new path
//!
//! Events arriving during a cycle are therefore deferred and re-evaluated
//! against the state that cycle leaves behind.

use bridge_traits::VaultEvent;
use std::collections::BTreeSet;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::ReconciliationEngine;
use crate::error::{Result, SyncError};
use crate::progress::{CycleReport, SyncProgress};

/// A reason to run a reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    Incremental,
    FullReindex,
    Vault(VaultEvent),
}

type Reply = oneshot::Sender<Result<CycleReport>>;

struct Command {
    request: SyncRequest,
    reply: Option<Reply>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Incremental,
    Full,
}

/// Work left after coalescing one drained batch of commands
#[derive(Default)]
struct Plan {
    pass: Option<Pass>,
    paths: BTreeSet<String>,
    waiters: Vec<Reply>,
}

impl Plan {
    fn coalesce(commands: Vec<Command>) -> Self {
        let mut plan = Plan::default();
        for command in commands {
            match command.request {
                SyncRequest::FullReindex => plan.pass = Some(Pass::Full),
                SyncRequest::Incremental => {
                    if plan.pass.is_none() {
                        plan.pass = Some(Pass::Incremental);
                    }
                }
                SyncRequest::Vault(event) if event.requires_rescan() => {
                    if plan.pass.is_none() {
                        plan.pass = Some(Pass::Incremental);
                    }
                }
                SyncRequest::Vault(event) => {
                    plan.paths
                        .extend(event.paths().into_iter().map(str::to_string));
                }
            }
            if let Some(reply) = command.reply {
                plan.waiters.push(reply);
            }
        }
        plan
    }

    async fn execute(self, engine: &mut ReconciliationEngine) {
        let outcome = match self.pass {
            Some(Pass::Full) => engine.run_full_reindex().await,
            Some(Pass::Incremental) => engine.run_incremental().await,
            None if self.paths.is_empty() => return,
            None => engine.run_paths(&self.paths).await,
        };

        for waiter in self.waiters {
            // Caller stopped waiting
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Cloneable sender for queuing requests from other tasks
#[derive(Clone)]
pub struct SyncHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl SyncHandle {
    /// Queue a request without waiting for its outcome
    pub fn request(&self, request: SyncRequest) -> Result<()> {
        self.sender
            .send(Command {
                request,
                reply: None,
            })
            .map_err(|_| SyncError::WorkerStopped)
    }

    /// Queue a request and wait for the cycle that covers it.
    ///
    /// If the request was coalesced, the outcome is that of the merged cycle.
    pub async fn request_and_wait(&self, request: SyncRequest) -> Result<CycleReport> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(Command {
                request,
                reply: Some(reply),
            })
            .map_err(|_| SyncError::WorkerStopped)?;
        outcome.await.map_err(|_| SyncError::WorkerStopped)?
    }
}

/// Owner of the worker task that runs the engine
pub struct SyncScheduler {
    handle: SyncHandle,
    progress: watch::Receiver<SyncProgress>,
    worker: JoinHandle<()>,
}

impl SyncScheduler {
    /// Move `engine` into a new worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: ReconciliationEngine) -> Self {
        let progress = engine.progress();
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(engine, receiver));
        Self {
            handle: SyncHandle { sender },
            progress,
            worker,
        }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    pub fn request(&self, request: SyncRequest) -> Result<()> {
        self.handle.request(request)
    }

    pub async fn request_and_wait(&self, request: SyncRequest) -> Result<CycleReport> {
        self.handle.request_and_wait(request).await
    }

    pub fn progress(&self) -> watch::Receiver<SyncProgress> {
        self.progress.clone()
    }

    /// Stop accepting requests and wait for queued work to finish.
    ///
    /// The worker exits once every [`SyncHandle`] clone is dropped as well.
    pub async fn shutdown(self) {
        drop(self.handle);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Sync worker ended abnormally");
        }
    }
}

async fn run_worker(mut engine: ReconciliationEngine, mut receiver: mpsc::UnboundedReceiver<Command>) {
    info!("Sync worker started");

    while let Some(first) = receiver.recv().await {
        let mut commands = vec![first];
        while let Ok(next) = receiver.try_recv() {
            commands.push(next);
        }

        let received = commands.len();
        let plan = Plan::coalesce(commands);
        debug!(
            received,
            pass = ?plan.pass,
            paths = plan.paths.len(),
            "Running coalesced sync requests"
        );
        plan.execute(&mut engine).await;
    }

    info!("Sync worker stopped");
}
