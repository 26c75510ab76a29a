// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::coordinator::{ShutdownCoordinator, ShutdownReport};
use crate::error::StartupError;
use crate::ingest::{IngestClient, LokiClient};
use crate::metrics_server::MetricsServer;
use crate::queue::{QueueClient, RedisQueue};
use crate::stats_reporter::{log_snapshot, spawn_stats_reporter};
use crate::telemetry::Counters;
use crate::worker::{PartitionKey, PartitionWorker};

/// Fully wired relay: shared clients, counters and, optionally, the metrics endpoint.
pub struct Relay {
    config: Config,
    queue: Arc<dyn QueueClient + Send + Sync>,
    ingest: Arc<dyn IngestClient + Send + Sync>,
    counters: Arc<Counters>,
    metrics_server: Option<MetricsServer>,
}

impl Relay {
    /// Connects to Redis, probes the ingestion endpoint and binds the metrics endpoint.
    ///
    /// Any failure here happens before a single worker is started.
    pub async fn connect(config: Config) -> Result<Self, StartupError> {
        config.validate()?;

        let queue = RedisQueue::connect(&config.redis)
            .await
            .map_err(StartupError::QueueUnreachable)?;
        info!("Connected to Redis at {}", config.redis.host);

        let loki = LokiClient::new(&config.loki).map_err(StartupError::HttpClient)?;
        loki.check_ready()
            .await
            .map_err(StartupError::SinkNotReady)?;
        info!("Ingestion endpoint {} is ready", config.loki.server);

        let counters = Arc::new(Counters::new());
        let metrics_server = MetricsServer::bind(&config.metrics.listen_addr, Arc::clone(&counters))
            .await
            .map_err(|source| StartupError::MetricsBind {
                addr: config.metrics.listen_addr.clone(),
                source,
            })?;

        Ok(Self {
            config,
            queue: Arc::new(queue),
            ingest: Arc::new(loki),
            counters,
            metrics_server: Some(metrics_server),
        })
    }

    /// Builds a relay around already constructed clients, without a metrics endpoint.
    pub fn with_clients(
        config: Config,
        queue: Arc<dyn QueueClient + Send + Sync>,
        ingest: Arc<dyn IngestClient + Send + Sync>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            config,
            queue,
            ingest,
            counters,
            metrics_server: None,
        }
    }

    pub fn with_metrics_server(mut self, metrics_server: MetricsServer) -> Self {
        self.metrics_server = Some(metrics_server);
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// Starts one worker per partition key and runs until `stop` completes (or every worker has
    /// stopped on its own), then waits for all workers to exit.
    pub async fn run<F>(self, stop: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let mut coordinator = ShutdownCoordinator::new();
        let cancel_token = coordinator.token();

        let metrics_handle = self
            .metrics_server
            .map(|server| tokio::spawn(server.serve(cancel_token.clone())));
        let stats_handle = spawn_stats_reporter(
            Arc::clone(&self.counters),
            cancel_token.clone(),
            self.config.stats.interval(),
        );

        for key in &self.config.redis.keys {
            coordinator.spawn(PartitionWorker::new(
                PartitionKey::new(key.as_str()),
                Arc::clone(&self.queue),
                Arc::clone(&self.ingest),
                Arc::clone(&self.counters),
                cancel_token.clone(),
                self.config.worker.idle_backoff(),
            ));
        }
        info!(
            "Started {} partition workers: {:?}",
            coordinator.len(),
            self.config.redis.keys
        );

        let report = coordinator.run_until(stop).await;

        // workers may all have stopped on their own, the helpers still need the signal
        cancel_token.cancel();
        if let Err(e) = stats_handle.await {
            debug!("Stats reporter task failed: {e}");
        }
        if let Some(handle) = metrics_handle {
            if let Err(e) = handle.await {
                debug!("Metrics endpoint task failed: {e}");
            }
        }

        log_snapshot(&self.counters);
        report
    }
}
