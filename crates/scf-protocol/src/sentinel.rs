// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reserved request ids used by test control planes.
//!
//! Production control planes never emit these. They exist so timeout and
//! disconnect handling can be exercised without a live scheduler.

/// Request id asking the runtime to pause; the body carries milliseconds.
pub const TIMEOUT: &str = "timeout";

/// Request id asking the runtime to drop its connection without reporting.
pub const DISCONNECT: &str = "disconnect";

/// A recognised sentinel request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Pause for the duration in the body, then report success.
    Timeout,
    /// Close the connection without responding.
    Disconnect,
}

impl Sentinel {
    /// Classify a request id. Matching is exact.
    pub fn from_request_id(request_id: &str) -> Option<Self> {
        match request_id {
            TIMEOUT => Some(Sentinel::Timeout),
            DISCONNECT => Some(Sentinel::Disconnect),
            _ => None,
        }
    }

    /// The request id that encodes this sentinel.
    pub fn request_id(self) -> &'static str {
        match self {
            Sentinel::Timeout => TIMEOUT,
            Sentinel::Disconnect => DISCONNECT,
        }
    }

    /// Pause duration carried by a `timeout` payload, in milliseconds.
    ///
    /// Unparseable payloads mean no pause.
    pub fn pause_millis(payload: &[u8]) -> u64 {
        std::str::from_utf8(payload)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}
