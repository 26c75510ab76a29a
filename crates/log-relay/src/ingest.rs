// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use crate::config::LokiConfig;
use crate::error::DeliveryError;

/// Push endpoint for encoded batches.
#[async_trait]
pub trait IngestClient {
    /// Sends one JSON encoded batch. Any 2xx response is a success.
    async fn deliver(&self, body: Vec<u8>) -> Result<(), DeliveryError>;
}

/// [`IngestClient`] for the Loki HTTP push API.
#[derive(Clone, Debug)]
pub struct LokiClient {
    client: reqwest::Client,
    push_url: String,
    ready_url: String,
}

impl LokiClient {
    pub fn new(config: &LokiConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(config.https_proxy.as_deref(), config.timeout())?,
            push_url: config.push_url(),
            ready_url: config.ready_url(),
        })
    }

    /// Probes the readiness endpoint once. Anything but a 2xx answer means not ready.
    pub async fn check_ready(&self) -> Result<(), DeliveryError> {
        let resp = self.client.get(&self.ready_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Status { status, body });
        }
        debug!("Ingestion endpoint {} is ready", self.ready_url);
        Ok(())
    }
}

#[async_trait]
impl IngestClient for LokiClient {
    async fn deliver(&self, body: Vec<u8>) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.push_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Status { status, body })
    }
}

/// Builds a reqwest client with optional proxy configuration and timeout.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().use_rustls_tls();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}
