// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SCF Runtime - Function runtime for a serverless control plane.
//!
//! This crate runs inside a function sandbox. It pulls invocations from the
//! control plane over HTTP, hands each payload to user code, and reports the
//! outcome back, one invocation at a time, for the life of the process.
//!
//! # Features
//!
//! - **Long polling**: Block on the next-invocation endpoint with bounded retries
//! - **Deadlines**: Race each handler against its time limit and report timeouts
//! - **Typed handlers**: JSON or UTF-8 payloads through pluggable codecs
//! - **Init reporting**: Failed handler construction is reported once, then the process exits
//! - **Panic isolation**: Handler panics become error reports instead of crashes
//! - **In-process testing**: Run handlers without a control plane via [`testing`]
//!
//! # Quick Start
//!
//! ```ignore
//! use scf_runtime::{Runtime, typed_fn};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct Greet { name: String }
//!
//! #[derive(Serialize)]
//! struct Greeting { message: String }
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let runtime = match Runtime::from_env() {
//!         Ok(runtime) => runtime,
//!         Err(e) => {
//!             eprintln!("{}", e);
//!             return std::process::ExitCode::FAILURE;
//!         }
//!     };
//!
//!     runtime
//!         .run_handler(typed_fn(|_ctx, req: Greet| async move {
//!             Ok(Greeting { message: format!("hello, {}", req.name) })
//!         }))
//!         .await
//!         .into()
//! }
//! ```
//!
//! # Initialization
//!
//! Handlers that need setup (connection pools, loaded models) are built by a
//! factory that runs before the first poll:
//!
//! ```ignore
//! let exit = runtime
//!     .run(|_init: InitContext| async move {
//!         let pool = connect().await.map_err(InitError::from_error)?;
//!         Ok(MyHandler { pool })
//!     })
//!     .await;
//! ```
//!
//! If the factory fails or panics, the error is posted to the init-error
//! endpoint and [`Runtime::run`] returns [`RuntimeExit::InitFailed`].
//!
//! # Configuration
//!
//! ## Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `SCF_RUNTIME_API` | Yes | - | Control-plane host or base URL |
//! | `SCF_RUNTIME_API_PORT` | No | - | Port appended to a bare host |
//! | `SCF_CONNECT_TIMEOUT_MS` | No | `10000` | Connection timeout |
//! | `SCF_REQUEST_TIMEOUT_MS` | No | `30000` | Timeout for report requests |
//! | `SCF_POLL_MAX_ATTEMPTS` | No | `5` | Consecutive poll failures before exiting |
//! | `SCF_POLL_RETRY_DELAY_MS` | No | `100` | Delay between failed polls |
//! | `SCF_MAX_INVOCATIONS` | No | `0` | Stop after N invocations (0 = unlimited) |
//! | `SCF_TEST_SENTINELS` | No | `true` | Honour `timeout`/`disconnect` request ids |
//!
//! ## Programmatic Configuration
//!
//! ```ignore
//! use scf_runtime::{Runtime, RuntimeConfig};
//!
//! let config = RuntimeConfig::localhost(9001)
//!     .with_poll_max_attempts(10)
//!     .with_max_invocations(1);
//!
//! let runtime = Runtime::new(config)?;
//! ```

mod config;
mod context;
mod error;
mod handler;
mod runtime;
mod types;

pub mod client;
pub mod testing;

// Main types
pub use config::RuntimeConfig;
pub use context::InvocationContext;
pub use error::{
    DECODE_KIND, ENCODE_KIND, HandlerError, InitError, PANIC_KIND, PollError, ReportError, Result,
    RuntimeError, TIMEOUT_KIND, UNHANDLED_KIND,
};
pub use handler::{
    Codec, Handler, HandlerFactory, InitContext, Json, RawHandler, TypedHandler, Utf8, handler_fn,
    string_fn, typed_fn,
};
pub use runtime::Runtime;
pub use types::{InvocationRequest, RuntimeExit, RuntimePhase};

// Client for custom control-plane setups
pub use client::InvocationClient;
pub use client::http::HttpClient;

// Re-export the wire contract
pub use scf_protocol::{ErrorResponse, Sentinel};
