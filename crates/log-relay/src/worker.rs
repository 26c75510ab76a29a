// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Consume loop for a single partition key.
//!
//! Each iteration pops one item, decodes it, converts it into a push payload and delivers it.
//! Cancellation is only looked at between iterations, so an item that has been popped is always
//! either delivered, dropped as undecodable, or pushed back before the worker reacts to a stop.
//!
//! A failed delivery is treated as a sign that the ingestion side is unhealthy: the popped bytes
//! go back to the tail of the same list and the worker stops for good. The partition stays
//! halted until the process is restarted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DeliveryError, QueueError};
use crate::ingest::IngestClient;
use crate::queue::QueueClient;
use crate::record::LogRecord;
use crate::telemetry::Counters;
use crate::transform::{label_value, transform_with, LabelEncoder};

/// Name of one queue, and of the worker draining it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// How a worker ended.
#[derive(Debug)]
pub enum WorkerExit {
    /// Observed cancellation at the top of an iteration.
    Clean,
    /// Stopped on its own after an unrecoverable error.
    Fatal(WorkerFault),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerFault {
    #[error("queue read failed: {0}")]
    QueueRead(#[source] QueueError),

    /// The popped item was pushed back unless `requeue` holds the push error.
    #[error("delivery failed: {error}")]
    Delivery {
        #[source]
        error: DeliveryError,
        requeue: Option<QueueError>,
    },
}

/// Outcome of one non-fatal iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    Dropped,
    Delivered,
}

pub struct PartitionWorker {
    key: PartitionKey,
    queue: Arc<dyn QueueClient + Send + Sync>,
    ingest: Arc<dyn IngestClient + Send + Sync>,
    counters: Arc<Counters>,
    cancel_token: CancellationToken,
    idle_backoff: Duration,
    label_encoder: LabelEncoder,
}

impl PartitionWorker {
    pub fn new(
        key: PartitionKey,
        queue: Arc<dyn QueueClient + Send + Sync>,
        ingest: Arc<dyn IngestClient + Send + Sync>,
        counters: Arc<Counters>,
        cancel_token: CancellationToken,
        idle_backoff: Duration,
    ) -> Self {
        Self {
            key,
            queue,
            ingest,
            counters,
            cancel_token,
            idle_backoff,
            label_encoder: label_value,
        }
    }

    /// Replaces the metadata label encoder, [`label_value`] by default.
    pub fn with_label_encoder(mut self, label_encoder: LabelEncoder) -> Self {
        self.label_encoder = label_encoder;
        self
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// Runs until cancellation is observed or an unrecoverable error occurs.
    pub async fn run(self) -> WorkerExit {
        info!(key = %self.key, "Partition worker started");

        while !self.cancel_token.is_cancelled() {
            if let Err(fault) = self.step().await {
                error!(key = %self.key, "Stopping partition worker: {fault}");
                return WorkerExit::Fatal(fault);
            }
        }

        info!(key = %self.key, "Received shutdown, partition worker stopped");
        WorkerExit::Clean
    }

    /// One pop → decode → transform → deliver pass.
    pub async fn step(&self) -> Result<Step, WorkerFault> {
        let key = self.key.as_str();

        let raw = match self.queue.pop_tail(key).await.map_err(WorkerFault::QueueRead)? {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                self.counters.record_idle();
                sleep(self.idle_backoff).await;
                return Ok(Step::Idle);
            }
        };

        let record = match LogRecord::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(key, "Dropping undecodable queue item: {e}");
                self.counters.record_dirty();
                return Ok(Step::Dropped);
            }
        };

        let transformed = transform_with(&record, self.label_encoder);
        for label in &transformed.rejected_labels {
            warn!(key, label = %label, "Dropping metadata field that cannot be encoded");
            self.counters.record_bad_metadata();
        }

        let delivery = match transformed.batch.to_json() {
            Ok(body) => self.ingest.deliver(body).await,
            Err(e) => Err(DeliveryError::from(e)),
        };

        if let Err(error) = delivery {
            let requeue = self.queue.push_tail(key, &raw).await.err();
            match &requeue {
                None => warn!(key, "Delivery failed, item pushed back to its queue: {error}"),
                Some(push_err) => error!(
                    key,
                    "Delivery failed and the item could not be pushed back, it is lost: {error}; push error: {push_err}"
                ),
            }
            return Err(WorkerFault::Delivery { error, requeue });
        }

        debug!(key, "Delivered record");
        self.counters.record_success(key);
        Ok(Step::Delivered)
    }
}
