// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! High-level types shared by the client and the runtime loop.

use std::fmt;
use std::process::ExitCode;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{InitError, PollError};

/// One unit of work handed out by the control plane.
///
/// Consumed exactly once by the runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Opaque id, unique per invocation
    pub request_id: String,
    /// Raw request body
    pub payload: Bytes,
    /// Remaining execution budget at receipt time (0 when absent)
    pub time_limit_ms: u64,
    /// Sandbox memory ceiling, informational (0 when absent)
    pub memory_limit_mb: u64,
}

impl InvocationRequest {
    /// Create a request with the given id and payload and no limits.
    pub fn new(request_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            request_id: request_id.into(),
            payload: payload.into(),
            time_limit_ms: 0,
            memory_limit_mb: 0,
        }
    }

    /// Set the time limit.
    pub fn with_time_limit_ms(mut self, time_limit_ms: u64) -> Self {
        self.time_limit_ms = time_limit_ms;
        self
    }

    /// Set the memory limit.
    pub fn with_memory_limit_mb(mut self, memory_limit_mb: u64) -> Self {
        self.memory_limit_mb = memory_limit_mb;
        self
    }

    /// Time limit as a duration.
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

/// Lifecycle phase of the runtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimePhase {
    /// Constructed, `run` not yet called
    Uninitialized,
    /// Running the handler factory
    Initializing,
    /// Waiting for the next invocation
    Polling,
    /// Running the handler
    Invoking,
    /// Sending the outcome to the control plane
    Reporting,
    /// Loop exited
    Terminated,
}

impl fmt::Display for RuntimePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimePhase::Uninitialized => "uninitialized",
            RuntimePhase::Initializing => "initializing",
            RuntimePhase::Polling => "polling",
            RuntimePhase::Invoking => "invoking",
            RuntimePhase::Reporting => "reporting",
            RuntimePhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why the runtime loop stopped.
#[derive(Debug)]
pub enum RuntimeExit {
    /// The configured invocation budget was served
    Completed {
        /// Invocations served
        invocations: u64,
    },
    /// The shutdown token fired
    Shutdown {
        /// Invocations served
        invocations: u64,
    },
    /// The handler could not be constructed
    InitFailed(InitError),
    /// Polling failed more often than the attempt budget allows
    PollExhausted(PollError),
}

impl RuntimeExit {
    /// Whether the process should exit with status zero.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RuntimeExit::Completed { .. } | RuntimeExit::Shutdown { .. }
        )
    }

    /// Numeric process exit status.
    pub fn code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Invocations received before exit (zero for fatal exits).
    ///
    /// Sentinel rounds are included, `disconnect` ones too, even though
    /// nothing is reported for them.
    pub fn invocations(&self) -> u64 {
        match self {
            RuntimeExit::Completed { invocations } | RuntimeExit::Shutdown { invocations } => {
                *invocations
            }
            _ => 0,
        }
    }
}

impl From<RuntimeExit> for ExitCode {
    fn from(exit: RuntimeExit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RuntimeExit::Completed { invocations: 3 }.code(), 0);
        assert_eq!(RuntimeExit::Shutdown { invocations: 0 }.code(), 0);
        assert_eq!(
            RuntimeExit::InitFailed(InitError::new("X", "y")).code(),
            1
        );
        assert_eq!(
            RuntimeExit::PollExhausted(PollError::InternalServerError).code(),
            1
        );
    }

    #[test]
    fn test_request_builder() {
        let request = InvocationRequest::new("abc-123", "hello")
            .with_time_limit_ms(3000)
            .with_memory_limit_mb(128);

        assert_eq!(request.payload, Bytes::from_static(b"hello"));
        assert_eq!(request.time_limit(), Duration::from_secs(3));
        assert_eq!(request.memory_limit_mb, 128);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RuntimePhase::Polling.to_string(), "polling");
        assert_eq!(RuntimePhase::Terminated.to_string(), "terminated");
    }
}
