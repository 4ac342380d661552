// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SCF Protocol - the control-plane contract for function runtimes
//!
//! This crate holds everything a runtime and a control plane must agree on,
//! and nothing else:
//! - The four HTTP endpoints ([`paths`])
//! - Header names carrying per-invocation metadata ([`headers`])
//! - The reserved sentinel request ids used by test control planes ([`Sentinel`])
//! - The JSON envelope used to report failures ([`ErrorResponse`])
//!
//! # Protocol
//!
//! ```text
//!  runtime                                   control plane
//!     │  GET  /runtime/invocation/next              │
//!     │ ──────────────────────────────────────────► │
//!     │  200 body=payload, request_id, time_limit…  │
//!     │ ◄────────────────────────────────────────── │
//!     │  POST /runtime/invocation/{id}/response     │
//!     │  POST /runtime/invocation/{id}/error        │
//!     │ ──────────────────────────────────────────► │
//!     │  POST /runtime/init/error   (before 1st poll only)
//! ```
//!
//! There is no transport code here; the runtime crate owns the HTTP client.

pub mod error;
pub mod error_response;
pub mod headers;
pub mod paths;
pub mod sentinel;

pub use error::ProtocolError;
pub use error_response::{ErrorResponse, INVALID_ERROR_SHAPE_STATUS};
pub use sentinel::Sentinel;
