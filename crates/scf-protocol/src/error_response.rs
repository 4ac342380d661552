// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The JSON envelope used for init and invocation errors.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Status a control plane answers with when it rejects the error envelope
/// itself. Deliberately outside the standard 4xx/5xx ranges.
pub const INVALID_ERROR_SHAPE_STATUS: u16 = 299;

/// Failure report sent to the control plane.
///
/// Wire shape: `{ "errorType": string, "errorMessage": string, "stackTrace"?: [string] }`.
/// An absent stack trace is omitted, not encoded as an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Classification of the failure
    pub error_type: String,
    /// Human-readable description
    pub error_message: String,
    /// Optional ordered stack frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<String>>,
}

impl ErrorResponse {
    /// Create an envelope without a stack trace.
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace: None,
        }
    }

    /// Attach stack frames.
    pub fn with_stack_trace(mut self, frames: Vec<String>) -> Self {
        self.stack_trace = Some(frames);
        self
    }

    /// Encode to the JSON body sent on the wire.
    pub fn to_json(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a JSON body received from the wire.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
