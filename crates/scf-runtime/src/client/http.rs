// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP client for the control plane.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response, StatusCode};
use scf_protocol::{ErrorResponse, headers, paths};
use tracing::{debug, info, instrument, warn};

use super::InvocationClient;
use crate::config::RuntimeConfig;
use crate::error::{PollError, ReportError, Result, RuntimeError};
use crate::types::InvocationRequest;

/// Production [`InvocationClient`] over the control plane's HTTP API.
///
/// Holds a single pooled keep-alive connection to the control plane.
pub struct HttpClient {
    /// Low-level HTTP client
    http: Client,
    /// Configuration used to (re)build the HTTP client
    config: RuntimeConfig,
    /// Set once an invocation has been received; init errors are refused after that
    received_invocation: bool,
}

impl HttpClient {
    /// Create a client for the configured control plane.
    ///
    /// No connection is opened until the first call.
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        reqwest::Url::parse(&config.runtime_api)
            .map_err(|e| RuntimeError::Config(format!("invalid runtime api url: {}", e)))?;

        Ok(Self {
            http: build_http_client(config)?,
            config: config.clone(),
            received_invocation: false,
        })
    }

    /// Base URL of the control plane.
    pub fn runtime_api(&self) -> &str {
        &self.config.runtime_api
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.runtime_api, path)
    }

    async fn post(
        &self,
        path: &str,
        body: Bytes,
        json: bool,
        map_status: fn(u16) -> Option<ReportError>,
    ) -> Result<(), ReportError> {
        let mut request = self
            .http
            .post(self.url(path))
            .timeout(self.config.request_timeout())
            .body(body);
        if json {
            request = request.header(CONTENT_TYPE, "application/json");
        }

        let response = request.send().await.map_err(ReportError::Transport)?;
        let status = response.status().as_u16();
        // Drain so the connection can go back to the pool.
        let _ = read_body(response).await;

        match map_status(status) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[async_trait]
impl InvocationClient for HttpClient {
    #[instrument(skip(self), fields(runtime_api = %self.config.runtime_api))]
    async fn get_next_invocation(&mut self) -> Result<InvocationRequest, PollError> {
        debug!("Polling for next invocation");

        let response = self
            .http
            .get(self.url(paths::NEXT_INVOCATION))
            .send()
            .await
            .map_err(PollError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            let _ = read_body(response).await;
            return Err(PollError::from_status(status.as_u16()));
        }

        let headers = response.headers().clone();
        let payload = read_body(response).await.map_err(PollError::Transport)?;
        let request = invocation_from_parts(&headers, payload)?;

        self.received_invocation = true;
        debug!(
            request_id = %request.request_id,
            payload_size = request.payload.len(),
            time_limit_ms = request.time_limit_ms,
            memory_limit_mb = request.memory_limit_mb,
            "Received invocation"
        );
        Ok(request)
    }

    #[instrument(skip(self, body), fields(request_id = %request_id, body_size = body.len()))]
    async fn post_response(&mut self, request_id: &str, body: Bytes) -> Result<(), ReportError> {
        self.post(
            &paths::invocation_response(request_id),
            body,
            false,
            ReportError::from_response_status,
        )
        .await?;
        debug!("Response accepted");
        Ok(())
    }

    #[instrument(skip(self, error), fields(request_id = %request_id, error_type = %error.error_type))]
    async fn post_error(
        &mut self,
        request_id: &str,
        error: &ErrorResponse,
    ) -> Result<(), ReportError> {
        let body = Bytes::from(error.to_json()?);
        self.post(
            &paths::invocation_error(request_id),
            body,
            true,
            ReportError::from_status,
        )
        .await?;
        debug!("Invocation error accepted");
        Ok(())
    }

    #[instrument(skip(self, error), fields(error_type = %error.error_type))]
    async fn post_init_error(&mut self, error: &ErrorResponse) -> Result<(), ReportError> {
        if self.received_invocation {
            warn!("Refusing to report init error after an invocation was received");
            return Err(ReportError::InitAfterFirstInvocation);
        }
        let body = Bytes::from(error.to_json()?);
        self.post(paths::INIT_ERROR, body, true, ReportError::from_status)
            .await?;
        info!("Init error accepted");
        Ok(())
    }

    async fn reset_connection(&mut self) {
        match build_http_client(&self.config) {
            Ok(http) => {
                self.http = http;
                debug!("Connection reset");
            }
            Err(e) => warn!(error = %e, "Failed to rebuild HTTP client; keeping the old one"),
        }
    }
}

fn build_http_client(config: &RuntimeConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .pool_max_idle_per_host(1)
        .tcp_keepalive(Some(std::time::Duration::from_secs(30)))
        .http1_only()
        .no_proxy()
        .build()
}

/// Read a response body, reassembling however many chunks it arrives in.
async fn read_body(mut response: Response) -> std::result::Result<Bytes, reqwest::Error> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Build an [`InvocationRequest`] from the headers and body of a 200 poll.
pub fn invocation_from_parts(
    headers: &HeaderMap,
    payload: Bytes,
) -> std::result::Result<InvocationRequest, PollError> {
    let value = |name: &'static str| -> std::result::Result<Option<String>, PollError> {
        match headers.get(name) {
            None => Ok(None),
            Some(v) => v.to_str().map(|s| Some(s.to_string())).map_err(|_| {
                PollError::MalformedResponse(scf_protocol::ProtocolError::InvalidHeader {
                    name,
                    value: String::from_utf8_lossy(v.as_bytes()).into_owned(),
                })
            }),
        }
    };

    let request_id = headers::parse_request_id(value(headers::REQUEST_ID)?.as_deref())?;
    let time_limit_ms =
        headers::parse_limit(headers::TIME_LIMIT_MS, value(headers::TIME_LIMIT_MS)?.as_deref())?;
    let memory_limit_mb = headers::parse_limit(
        headers::MEMORY_LIMIT_MB,
        value(headers::MEMORY_LIMIT_MB)?.as_deref(),
    )?;

    Ok(InvocationRequest {
        request_id,
        payload,
        time_limit_ms,
        memory_limit_mb,
    })
}
