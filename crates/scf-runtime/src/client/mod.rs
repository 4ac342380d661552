// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Invocation client implementations.
//!
//! The runtime loop talks to the control plane only through
//! [`InvocationClient`], which keeps the loop testable without a network:
//! - `http`: the production client over the control plane's HTTP API

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use scf_protocol::ErrorResponse;

use crate::error::{PollError, ReportError};
use crate::types::InvocationRequest;

/// Client side of the control-plane protocol.
///
/// Methods take `&mut self`: the runtime loop owns its client exclusively and
/// keeps exactly one request outstanding at a time.
#[async_trait]
pub trait InvocationClient: Send {
    /// Wait for the next invocation.
    async fn get_next_invocation(&mut self) -> Result<InvocationRequest, PollError>;

    /// Report the handler's result for `request_id`.
    async fn post_response(&mut self, request_id: &str, body: Bytes) -> Result<(), ReportError>;

    /// Report the handler's failure for `request_id`.
    async fn post_error(
        &mut self,
        request_id: &str,
        error: &ErrorResponse,
    ) -> Result<(), ReportError>;

    /// Report a failure to initialize. Only valid before the first successful poll.
    async fn post_init_error(&mut self, error: &ErrorResponse) -> Result<(), ReportError>;

    /// Drop the current connection; the next call opens a fresh one.
    async fn reset_connection(&mut self);
}
