// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process wide counters shared by every partition worker.
//!
//! The plain atomics back the periodic stats log line; the Prometheus families back the
//! `/metrics` endpoint, where deliveries are additionally broken down by partition key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PartitionLabels {
    pub key: String,
}

#[derive(Debug)]
pub struct Counters {
    success: AtomicU64,
    idle: AtomicU64,
    dirty: AtomicU64,
    bad_metadata: AtomicU64,

    success_by_key: Family<PartitionLabels, Counter>,
    idle_total: Counter,
    dirty_total: Counter,
    bad_metadata_total: Counter,

    registry: Registry,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub success: u64,
    pub idle: u64,
    pub dirty: u64,
    pub bad_metadata: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let success_by_key = Family::<PartitionLabels, Counter>::default();
        registry.register(
            "llr_success_count",
            "Records delivered to the ingestion endpoint, by partition key",
            success_by_key.clone(),
        );

        let idle_total = Counter::default();
        registry.register(
            "llr_idle_count",
            "Polls that found the queue empty and slept",
            idle_total.clone(),
        );

        let dirty_total = Counter::default();
        registry.register(
            "llr_dirty_data_count",
            "Queue items dropped because they could not be decoded",
            dirty_total.clone(),
        );

        let bad_metadata_total = Counter::default();
        registry.register(
            "llr_wrong_meta_data_count",
            "Metadata fields dropped because they could not be encoded as a label",
            bad_metadata_total.clone(),
        );

        Self {
            success: AtomicU64::new(0),
            idle: AtomicU64::new(0),
            dirty: AtomicU64::new(0),
            bad_metadata: AtomicU64::new(0),
            success_by_key,
            idle_total,
            dirty_total,
            bad_metadata_total,
            registry,
        }
    }

    pub fn record_success(&self, key: &str) {
        self.success.fetch_add(1, Ordering::Relaxed);
        self.success_by_key
            .get_or_create(&PartitionLabels {
                key: key.to_string(),
            })
            .inc();
    }

    pub fn record_idle(&self) {
        self.idle.fetch_add(1, Ordering::Relaxed);
        self.idle_total.inc();
    }

    pub fn record_dirty(&self) {
        self.dirty.fetch_add(1, Ordering::Relaxed);
        self.dirty_total.inc();
    }

    pub fn record_bad_metadata(&self) {
        self.bad_metadata.fetch_add(1, Ordering::Relaxed);
        self.bad_metadata_total.inc();
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            success: self.success.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
            dirty: self.dirty.load(Ordering::Relaxed),
            bad_metadata: self.bad_metadata.load(Ordering::Relaxed),
        }
    }

    /// Deliveries recorded for `key`, without creating a series for it.
    pub fn success_for(&self, key: &str) -> u64 {
        self.success_by_key
            .get(&PartitionLabels {
                key: key.to_string(),
            })
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    /// Renders every counter in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
