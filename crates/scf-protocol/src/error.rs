// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Protocol-level errors.

use thiserror::Error;

/// Errors raised while encoding or interpreting protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The JSON envelope could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A header the contract requires was not present.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// A header was present but its value does not match the contract.
    #[error("invalid header {name}: {value:?}")]
    InvalidHeader {
        /// Header name
        name: &'static str,
        /// Raw header value as received
        value: String,
    },
}
