// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod mocks;

use log_relay::config::{
    Config, LokiConfig, MetricsConfig, RedisConfig, StatsConfig, WorkerConfig,
};
use log_relay::record::LogRecord;
use serde_json::Value;

#[allow(dead_code)]
pub fn test_config(keys: &[&str], loki_server: &str) -> Config {
    Config {
        log_level: "debug".to_string(),
        redis: RedisConfig {
            host: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        },
        loki: LokiConfig {
            server: loki_server.to_string(),
            timeout_secs: Some(5),
            https_proxy: None,
        },
        metrics: MetricsConfig {
            listen_addr: "127.0.0.1:0".to_string(),
        },
        worker: WorkerConfig { idle_backoff_ms: 5 },
        stats: StatsConfig { interval_secs: 1 },
    }
}

#[allow(dead_code)]
pub fn record_bytes(app_name: &str, msg: &str, metadata: Value) -> Vec<u8> {
    let record = LogRecord {
        app_name: app_name.to_string(),
        ip: "10.1.2.3".to_string(),
        level: "info".to_string(),
        caller: "handler.go:7".to_string(),
        timestamp: 1_700_000_000_000_000_000,
        msg: msg.to_string(),
        metadata: serde_json::from_value(metadata).expect("metadata must be an object"),
    };
    serde_json::to_vec(&record).expect("record encodes")
}
