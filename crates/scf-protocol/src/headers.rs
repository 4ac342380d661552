// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Header names carried on the `next` invocation response.
//!
//! HTTP header names are case-insensitive; the constants are lowercase so
//! they can be used directly as `http::HeaderName` values.

use crate::error::ProtocolError;

/// Opaque, per-invocation request id.
pub const REQUEST_ID: &str = "request_id";

/// Remaining execution budget in milliseconds at the time of receipt.
pub const TIME_LIMIT_MS: &str = "time_limit_in_ms";

/// Sandbox memory ceiling in megabytes (informational).
pub const MEMORY_LIMIT_MB: &str = "memory_limit_in_mb";

/// Parse a numeric limit header.
///
/// An absent header maps to `0`. For the time limit that means an already
/// expired deadline, never a silent default budget.
pub fn parse_limit(name: &'static str, value: Option<&str>) -> Result<u64, ProtocolError> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ProtocolError::InvalidHeader {
                name,
                value: raw.to_string(),
            }),
    }
}

/// Validate the request id header. It must be present and non-empty.
pub fn parse_request_id(value: Option<&str>) -> Result<String, ProtocolError> {
    match value.map(str::trim) {
        None => Err(ProtocolError::MissingHeader(REQUEST_ID)),
        Some("") => Err(ProtocolError::InvalidHeader {
            name: REQUEST_ID,
            value: String::new(),
        }),
        Some(id) => Ok(id.to_string()),
    }
}
