// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors raised while loading or validating the relay configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] figment::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned by a queue backend
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Queue backend error: {0}")]
    Backend(String),
}

/// Errors returned when a batch could not be handed to the ingestion endpoint
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to encode payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors that stop the process before any worker is started
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Queue unreachable: {0}")]
    QueueUnreachable(#[source] QueueError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Ingestion endpoint not ready: {0}")]
    SinkNotReady(#[source] DeliveryError),

    #[error("Failed to bind metrics endpoint on {addr}: {source}")]
    MetricsBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
