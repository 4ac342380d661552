// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error taxonomy for the runtime.
//!
//! Every failure is classified where it is detected:
//! - [`PollError`]: retried, fatal only once the attempt budget is spent
//! - [`ReportError`]: logged and absorbed
//! - [`HandlerError`]: reported to the control plane for that invocation
//! - [`InitError`]: reported once, then the process terminates
//! - [`RuntimeError`]: construction-time failures (config, HTTP client)

use std::time::Duration;

use scf_protocol::{ErrorResponse, ProtocolError};
use thiserror::Error;

/// Failure to fetch the next invocation.
#[derive(Debug, Error)]
pub enum PollError {
    /// 400 from the control plane
    #[error("control plane rejected poll: bad request")]
    BadRequest,

    /// 429 from the control plane
    #[error("control plane rejected poll: too many requests")]
    TooManyRequests,

    /// 500 from the control plane
    #[error("control plane rejected poll: internal server error")]
    InternalServerError,

    /// Any other non-200 status
    #[error("control plane answered poll with unexpected status {0}")]
    UnexpectedStatus(u16),

    /// 200 whose headers do not match the contract
    #[error("malformed invocation: {0}")]
    MalformedResponse(#[from] ProtocolError),

    /// Connection refused, reset or timed out
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
}

impl PollError {
    /// Map a non-200 poll status.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => PollError::BadRequest,
            429 => PollError::TooManyRequests,
            500 => PollError::InternalServerError,
            other => PollError::UnexpectedStatus(other),
        }
    }

    /// Whether the failure happened below HTTP.
    pub fn is_transport(&self) -> bool {
        matches!(self, PollError::Transport(_))
    }

    /// Delay to apply before the next attempt.
    ///
    /// A 400 points at a client bug and is retried at once; throttling,
    /// server-side and transport failures wait `base` to avoid a tight loop.
    pub fn retry_delay(&self, base: Duration) -> Option<Duration> {
        match self {
            PollError::BadRequest => None,
            PollError::UnexpectedStatus(code) if (400..500).contains(code) => None,
            _ => Some(base),
        }
    }
}

/// Failure to deliver a response, an invocation error or an init error.
#[derive(Debug, Error)]
pub enum ReportError {
    /// 400 from the control plane
    #[error("control plane rejected report: bad request")]
    BadRequest,

    /// 413 from the control plane
    #[error("control plane rejected report: payload too large")]
    PayloadTooLarge,

    /// 429 from the control plane
    #[error("control plane rejected report: too many requests")]
    TooManyRequests,

    /// 500 from the control plane
    #[error("control plane rejected report: internal server error")]
    InternalServerError,

    /// The control plane rejected the error envelope itself
    #[error("control plane rejected the error envelope")]
    InvalidErrorShape,

    /// Any other status outside the accepted range
    #[error("control plane answered report with unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The error envelope could not be encoded
    #[error("could not encode error envelope: {0}")]
    Encode(#[from] ProtocolError),

    /// An init error was attempted after an invocation had been received
    #[error("init error reported after the first invocation")]
    InitAfterFirstInvocation,

    /// Connection refused, reset or timed out
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
}

impl ReportError {
    /// Map the status of a `post_response` call. `None` means accepted.
    ///
    /// There is no error envelope on this endpoint, so 299 is just an
    /// unexpected status here.
    pub fn from_response_status(status: u16) -> Option<Self> {
        match status {
            scf_protocol::INVALID_ERROR_SHAPE_STATUS => Some(ReportError::UnexpectedStatus(status)),
            other => Self::from_status(other),
        }
    }

    /// Map the status of an error or init-error report. `None` means accepted.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            scf_protocol::INVALID_ERROR_SHAPE_STATUS => Some(ReportError::InvalidErrorShape),
            200..=204 => None,
            400 => Some(ReportError::BadRequest),
            413 => Some(ReportError::PayloadTooLarge),
            429 => Some(ReportError::TooManyRequests),
            500 => Some(ReportError::InternalServerError),
            other => Some(ReportError::UnexpectedStatus(other)),
        }
    }
}

/// Error kind reported when the deadline passes before the handler finishes.
pub const TIMEOUT_KIND: &str = "Timeout";
/// Error kind reported when the payload cannot be decoded.
pub const DECODE_KIND: &str = "DecodeError";
/// Error kind reported when the handler output cannot be encoded.
pub const ENCODE_KIND: &str = "EncodeError";
/// Error kind reported when user code panics.
pub const PANIC_KIND: &str = "Panic";
/// Error kind for errors without a more specific classification.
pub const UNHANDLED_KIND: &str = "Unhandled";

/// Failure of a single invocation.
///
/// Opaque to the runtime: only its kind, message and optional stack frames
/// are forwarded to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct HandlerError {
    kind: String,
    message: String,
    stack_trace: Option<Vec<String>>,
}

impl HandlerError {
    /// Create an error with an explicit kind.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Wrap any error, using its type name as the kind.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }

    /// The invocation ran past its deadline.
    pub fn timeout(time_limit: Duration) -> Self {
        Self::new(
            TIMEOUT_KIND,
            format!(
                "invocation timed out after {}ms",
                time_limit.as_millis()
            ),
        )
    }

    /// The payload could not be converted to the handler's input type.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::new(DECODE_KIND, err.to_string())
    }

    /// The handler output could not be converted to bytes.
    pub fn encode(err: impl std::fmt::Display) -> Self {
        Self::new(ENCODE_KIND, err.to_string())
    }

    /// User code panicked.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(PANIC_KIND, message)
    }

    /// Attach stack frames.
    pub fn with_stack_trace(mut self, frames: Vec<String>) -> Self {
        self.stack_trace = Some(frames);
        self
    }

    /// Classification, sent as `errorType`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Description, sent as `errorMessage`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this is the synthesized deadline error.
    pub fn is_timeout(&self) -> bool {
        self.kind == TIMEOUT_KIND
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        let frames: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
        let base = HandlerError::new(UNHANDLED_KIND, err.to_string());
        if frames.is_empty() {
            base
        } else {
            base.with_stack_trace(frames)
        }
    }
}

impl From<&HandlerError> for ErrorResponse {
    fn from(err: &HandlerError) -> Self {
        ErrorResponse {
            error_type: err.kind.clone(),
            error_message: err.message.clone(),
            stack_trace: err.stack_trace.clone(),
        }
    }
}

/// Failure while constructing the handler. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct InitError {
    kind: String,
    message: String,
}

impl InitError {
    /// Create an init error with an explicit kind.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Wrap any error, using its type name as the kind.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }

    /// The handler factory panicked.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(PANIC_KIND, message)
    }

    /// Classification, sent as `errorType`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Description, sent as `errorMessage`.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for InitError {
    fn from(err: anyhow::Error) -> Self {
        InitError::new(UNHANDLED_KIND, format!("{:#}", err))
    }
}

impl From<&InitError> for ErrorResponse {
    fn from(err: &InitError) -> Self {
        ErrorResponse::new(err.kind.clone(), err.message.clone())
    }
}

/// Errors raised while building the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration error (missing or invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be built
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Type alias for runtime construction results.
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Render a panic payload caught at a task or unwind boundary.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
