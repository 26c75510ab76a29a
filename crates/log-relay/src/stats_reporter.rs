// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::telemetry::Counters;

/// Spawns a background task that logs the shared counters every `interval`, starting right
/// away. It only reads the counters and stops when `shutdown` is cancelled.
pub fn spawn_stats_reporter(
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => log_snapshot(&counters),
            }
        }
    })
}

pub fn log_snapshot(counters: &Counters) {
    let snapshot = counters.snapshot();
    info!(
        target: "log_relay::stats",
        success = snapshot.success,
        idle = snapshot.idle,
        dirty = snapshot.dirty,
        bad_metadata = snapshot.bad_metadata,
        "Consume stats"
    );
}
