// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::worker::{PartitionKey, PartitionWorker, WorkerExit, WorkerFault};

/// Owns every partition worker and the single cancellation signal they watch.
///
/// A stop request cancels the token once; the coordinator then waits, without a deadline, for
/// each worker to finish the iteration it is in and exit.
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
    workers: JoinSet<(PartitionKey, WorkerExit)>,
}

/// Terminal state of every worker, collected as they exit.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub clean: Vec<PartitionKey>,
    pub fatal: Vec<(PartitionKey, WorkerFault)>,
    pub panicked: usize,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.clean.len() + self.fatal.len() + self.panicked
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            workers: JoinSet::new(),
        }
    }

    /// Token that workers (and anything else that must stop with them) observe.
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn spawn(&mut self, worker: PartitionWorker) {
        let key = worker.key().clone();
        debug!(key = %key, "Spawning partition worker");
        self.workers.spawn(async move {
            let exit = worker.run().await;
            (key, exit)
        });
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Broadcasts cancellation. Calling it again has no further effect.
    pub fn shutdown(&self) {
        if !self.cancel_token.is_cancelled() {
            info!("Broadcasting shutdown to {} partition workers", self.workers.len());
            self.cancel_token.cancel();
        }
    }

    /// Waits until every worker has exited.
    ///
    /// Workers that stop on their own are recorded as they go. When `stop` completes the
    /// cancellation is broadcast and the wait continues until the last worker is gone. If all
    /// workers exit before `stop` completes, this returns without waiting for it.
    pub async fn run_until<F>(mut self, stop: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let mut report = ShutdownReport::default();
        tokio::pin!(stop);
        let mut stop_requested = false;

        loop {
            tokio::select! {
                () = &mut stop, if !stop_requested => {
                    stop_requested = true;
                    self.shutdown();
                }
                joined = self.workers.join_next() => match joined {
                    Some(Ok((key, WorkerExit::Clean))) => report.clean.push(key),
                    Some(Ok((key, WorkerExit::Fatal(fault)))) => {
                        error!(key = %key, "Partition worker terminated: {fault}");
                        report.fatal.push((key, fault));
                    }
                    Some(Err(e)) => {
                        error!("Partition worker task failed: {e}");
                        report.panicked += 1;
                    }
                    None => break,
                },
            }
        }

        info!(
            clean = report.clean.len(),
            fatal = report.fatal.len(),
            panicked = report.panicked,
            "All partition workers stopped"
        );
        report
    }
}
