// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run handlers in-process, without a control plane.
//!
//! The handler goes through the same deadline race the runtime loop uses,
//! so timeouts and panics surface exactly as they would in production.
//!
//! ```ignore
//! use scf_runtime::testing::{TestConfig, invoke_typed};
//!
//! let greeting: String = invoke_typed(
//!     |_ctx, name: String| async move { Ok(format!("hello, {name}")) },
//!     "world".to_string(),
//!     TestConfig::default(),
//! )
//! .await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::info_span;

use crate::context::InvocationContext;
use crate::error::HandlerError;
use crate::handler::{Handler, typed_fn};
use crate::runtime::execute;
use crate::types::InvocationRequest;

/// Limits and identity of a simulated invocation.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Request id seen by the handler (default: `test-<hex nanos>`)
    pub request_id: String,
    /// Memory limit reported to the handler (default: 128)
    pub memory_limit_mb: u64,
    /// Time limit the handler is raced against (default: 5s)
    pub time_limit: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self {
            request_id: format!("test-{nanos:x}"),
            memory_limit_mb: 128,
            time_limit: Duration::from_secs(5),
        }
    }
}

impl TestConfig {
    /// Override the request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Override the time limit.
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    fn request(&self, payload: Bytes) -> InvocationRequest {
        let time_limit_ms = u64::try_from(self.time_limit.as_millis()).unwrap_or(u64::MAX);
        InvocationRequest::new(self.request_id.clone(), payload)
            .with_time_limit_ms(time_limit_ms)
            .with_memory_limit_mb(self.memory_limit_mb)
    }
}

/// Invoke a byte-level handler once.
pub async fn invoke<H: Handler>(
    handler: H,
    payload: impl Into<Bytes>,
    config: TestConfig,
) -> Result<Bytes, HandlerError> {
    let request = config.request(payload.into());
    let span = info_span!("invocation", request_id = %request.request_id);
    let ctx = InvocationContext::build(&request, Instant::now(), Utc::now(), span);
    execute(&Arc::new(handler), &ctx, request.payload).await
}

/// Invoke a typed closure once, passing `event` through the JSON codec both ways.
pub async fn invoke_typed<In, Out, F, Fut>(
    func: F,
    event: In,
    config: TestConfig,
) -> Result<Out, HandlerError>
where
    In: Serialize + DeserializeOwned + Send + 'static,
    Out: Serialize + DeserializeOwned + Send + 'static,
    F: Fn(InvocationContext, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
{
    let payload = serde_json::to_vec(&event).map_err(HandlerError::encode)?;
    let body = invoke(typed_fn(func), payload, config).await?;
    serde_json::from_slice(&body).map_err(HandlerError::decode)
}
