// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the queue and the ingestion endpoint

#![allow(dead_code)]

use async_trait::async_trait;
use log_relay::error::{DeliveryError, QueueError};
use log_relay::ingest::IngestClient;
use log_relay::queue::QueueClient;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

/// Lists keyed by partition. The tail is the back of the deque.
#[derive(Default)]
pub struct MemoryQueue {
    lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    pops: Mutex<HashMap<String, usize>>,
    last_pop: Mutex<HashMap<String, Instant>>,
    broken_keys: Mutex<HashSet<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `key` so that `items[0]` is popped first.
    pub fn seed(&self, key: &str, items: Vec<Vec<u8>>) {
        let mut lists = self.lists.lock().unwrap();
        let list = lists.entry(key.to_string()).or_default();
        for item in items {
            list.push_front(item);
        }
    }

    pub fn break_key(&self, key: &str) {
        self.broken_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn items(&self, key: &str) -> Vec<Vec<u8>> {
        self.lists
            .lock()
            .unwrap()
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tail(&self, key: &str) -> Option<Vec<u8>> {
        self.lists
            .lock()
            .unwrap()
            .get(key)
            .and_then(|list| list.back().cloned())
    }

    pub fn pops(&self, key: &str) -> usize {
        self.pops.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn last_pop_at(&self, key: &str) -> Option<Instant> {
        self.last_pop.lock().unwrap().get(key).copied()
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn pop_tail(&self, key: &str) -> Result<Option<Vec<u8>>, QueueError> {
        *self.pops.lock().unwrap().entry(key.to_string()).or_default() += 1;
        self.last_pop
            .lock()
            .unwrap()
            .insert(key.to_string(), Instant::now());
        if self.broken_keys.lock().unwrap().contains(key) {
            return Err(QueueError::Backend(format!("WRONGTYPE {key}")));
        }
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|list| list.pop_back()))
    }

    async fn push_tail(&self, key: &str, item: &[u8]) -> Result<(), QueueError> {
        self.lists
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(item.to_vec());
        Ok(())
    }
}

/// Records every delivered body; fails when the body contains one of `fail_on`.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Vec<u8>>>,
    fail_on: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(needles: &[&str]) -> Self {
        Self {
            delivered: Mutex::default(),
            fail_on: needles.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn delivered(&self) -> Vec<serde_json::Value> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|body| serde_json::from_slice(body).expect("delivered body is JSON"))
            .collect()
    }
}

#[async_trait]
impl IngestClient for RecordingSink {
    async fn deliver(&self, body: Vec<u8>) -> Result<(), DeliveryError> {
        let text = String::from_utf8_lossy(&body);
        if self.fail_on.iter().any(|needle| text.contains(needle.as_str())) {
            return Err(DeliveryError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "sink unavailable".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(body);
        Ok(())
    }
}
