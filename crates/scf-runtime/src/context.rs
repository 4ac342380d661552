// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-invocation context handed to the handler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::types::InvocationRequest;

/// Immutable bundle describing one invocation.
///
/// Built fresh for every invocation and never reused. The cancellation token
/// fires when the runtime stops waiting for the handler; handlers that do
/// long work should watch [`InvocationContext::cancelled`].
#[derive(Debug, Clone)]
pub struct InvocationContext {
    request_id: String,
    memory_limit_mb: u64,
    time_limit: Duration,
    deadline: Instant,
    deadline_utc: DateTime<Utc>,
    span: Span,
    cancellation: CancellationToken,
}

impl InvocationContext {
    /// Build the context for `request`, received at `now` (monotonic) and
    /// `now_utc` (wall clock). Both readings should be taken together.
    ///
    /// The deadline is `now + time_limit`. A zero time limit yields a
    /// deadline equal to `now`, i.e. an invocation that is already expired.
    pub fn build(
        request: &InvocationRequest,
        now: Instant,
        now_utc: DateTime<Utc>,
        span: Span,
    ) -> Self {
        let time_limit = request.time_limit();
        let deadline = now
            .checked_add(time_limit)
            .unwrap_or_else(|| now + Duration::from_secs(u32::MAX as u64));
        let deadline_utc = chrono::Duration::from_std(time_limit)
            .ok()
            .and_then(|d| now_utc.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            request_id: request.request_id.clone(),
            memory_limit_mb: request.memory_limit_mb,
            time_limit,
            deadline,
            deadline_utc,
            span,
            cancellation: CancellationToken::new(),
        }
    }

    /// Opaque id of this invocation.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Sandbox memory ceiling in megabytes.
    pub fn memory_limit_mb(&self) -> u64 {
        self.memory_limit_mb
    }

    /// Budget granted at receipt time.
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Monotonic deadline.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wall-clock deadline, for logging and downstream propagation.
    pub fn deadline_utc(&self) -> DateTime<Utc> {
        self.deadline_utc
    }

    /// Budget left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Span carrying the request id; log inside it to correlate lines.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Token that fires when the runtime gives up on this invocation.
    ///
    /// Returns a child token: cancelling it does not affect the runtime.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.child_token()
    }

    /// Whether the runtime has already given up on this invocation.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves at the deadline or when the runtime cancels, whichever comes first.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancellation.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancellation.cancel();
    }
}
