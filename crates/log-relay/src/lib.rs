// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relay that drains structured log records from Redis list queues into a Loki push endpoint.
//!
//! Every configured partition key gets its own [`worker::PartitionWorker`], which pops one record
//! at a time, converts it into a single-stream push payload and delivers it. A failed delivery
//! puts the raw record back on its queue and halts that partition; everything else keeps running.
//! The [`coordinator::ShutdownCoordinator`] owns the workers and turns one stop request into a
//! clean halt of all of them.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ingest;
pub mod metrics_server;
pub mod queue;
pub mod record;
pub mod relay;
pub mod stats_reporter;
pub mod telemetry;
pub mod transform;
pub mod worker;

pub use config::Config;
pub use coordinator::{ShutdownCoordinator, ShutdownReport};
pub use error::{ConfigError, DeliveryError, QueueError, StartupError};
pub use relay::Relay;
pub use worker::{PartitionKey, PartitionWorker, WorkerExit};
