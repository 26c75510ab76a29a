// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::config::RedisConfig;
use crate::error::{ConfigError, QueueError};

/// List backed queue, one list per partition key.
///
/// Implementations are shared by every worker and must be safe to call concurrently for
/// different keys.
#[async_trait]
pub trait QueueClient {
    /// Removes and returns the item at the tail of `key`, `None` when the list is empty.
    async fn pop_tail(&self, key: &str) -> Result<Option<Vec<u8>>, QueueError>;

    /// Appends `item` at the tail of `key`.
    async fn push_tail(&self, key: &str, item: &[u8]) -> Result<(), QueueError>;
}

/// [`QueueClient`] over a multiplexed Redis connection (`RPOP` / `RPUSH`).
#[derive(Clone)]
pub struct RedisQueue {
    connection: ConnectionManager,
}

impl RedisQueue {
    /// Opens the connection and checks it with a `PING`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, QueueError> {
        let info = config
            .connection_info()
            .map_err(|e: ConfigError| QueueError::Backend(e.to_string()))?;
        let client = redis::Client::open(info)?;
        let mut connection = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
        debug!("Redis answered {pong} on {}", config.host);

        Ok(Self { connection })
    }
}

#[async_trait]
impl QueueClient for RedisQueue {
    async fn pop_tail(&self, key: &str) -> Result<Option<Vec<u8>>, QueueError> {
        let mut connection = self.connection.clone();
        let item: Option<Vec<u8>> = connection.rpop(key, None).await?;
        Ok(item)
    }

    async fn push_tail(&self, key: &str, item: &[u8]) -> Result<(), QueueError> {
        let mut connection = self.connection.clone();
        let _len: i64 = connection.rpush(key, item).await?;
        Ok(())
    }
}
