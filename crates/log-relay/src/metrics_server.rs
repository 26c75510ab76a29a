// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Minimal HTTP endpoint exposing the shared counters for Prometheus scraping.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::service::service_fn;
use hyper::{http, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::telemetry::Counters;

const METRICS_ENDPOINT_PATH: &str = "/metrics";
const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub struct MetricsServer {
    listener: TcpListener,
    counters: Arc<Counters>,
}

impl MetricsServer {
    pub async fn bind(addr: &str, counters: Arc<Counters>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, counters })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves scrapes until `cancel_token` is cancelled.
    pub async fn serve(self, cancel_token: CancellationToken) {
        if let Ok(addr) = self.local_addr() {
            info!("Metrics endpoint listening on {addr}{METRICS_ENDPOINT_PATH}");
        }

        let server = hyper::server::conn::http1::Builder::new();
        let mut joinset = JoinSet::new();

        loop {
            let conn = tokio::select! {
                () = cancel_token.cancelled() => break,
                con_res = self.listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Metrics server error: {e}");
                        break;
                    }
                    Ok((conn, _)) => conn,
                },
                Some(finished) = joinset.join_next() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!("Metrics connection handler panicked: {e:?}");
                        }
                    }
                    continue;
                },
            };

            let conn = TokioIo::new(conn);
            let server = server.clone();
            let counters = Arc::clone(&self.counters);
            joinset.spawn(async move {
                let service = service_fn(move |req| handle(req, Arc::clone(&counters)));
                if let Err(e) = server.serve_connection(conn, service).await {
                    debug!("Metrics connection error: {e}");
                }
            });
        }

        joinset.shutdown().await;
        debug!("Metrics endpoint stopped");
    }
}

async fn handle(
    req: Request<Incoming>,
    counters: Arc<Counters>,
) -> http::Result<Response<Full<Bytes>>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, METRICS_ENDPOINT_PATH) => match counters.encode() {
            Ok(body) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)
                .body(Full::new(Bytes::from(body))),
            Err(e) => {
                error!("Failed to encode metrics: {e}");
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::new()))
            }
        },
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new())),
    }
}
