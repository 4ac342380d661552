// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtime configuration.

use std::env;
use std::time::Duration;

use crate::error::{Result, RuntimeError};

/// Configuration for talking to the control plane and driving the loop.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Control-plane base URL, without a trailing slash
    pub runtime_api: String,
    /// TCP connect timeout in milliseconds (default: 10_000)
    pub connect_timeout_ms: u64,
    /// Timeout for the three report calls in milliseconds (default: 30_000).
    /// The poll itself is a long poll and has no timeout.
    pub request_timeout_ms: u64,
    /// Consecutive poll failures tolerated before the loop gives up (default: 5)
    pub poll_max_attempts: u32,
    /// Delay before retrying a throttled, server-side or transport poll failure (default: 100)
    pub poll_retry_delay_ms: u64,
    /// Stop cleanly after this many invocations (default: unlimited).
    /// Sentinel rounds count: each received invocation consumes one slot.
    pub max_invocations: Option<u64>,
    /// Honour the `timeout` / `disconnect` sentinel request ids (default: true)
    pub test_sentinels: bool,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `SCF_RUNTIME_API` - Control-plane host, `host:port` or full URL
    ///
    /// # Optional Environment Variables
    /// - `SCF_RUNTIME_API_PORT` - Port appended when `SCF_RUNTIME_API` has none
    /// - `SCF_CONNECT_TIMEOUT_MS` - Connect timeout (default: 10000)
    /// - `SCF_REQUEST_TIMEOUT_MS` - Report timeout (default: 30000)
    /// - `SCF_POLL_MAX_ATTEMPTS` - Consecutive poll failures before exiting (default: 5)
    /// - `SCF_POLL_RETRY_DELAY_MS` - Poll retry delay (default: 100)
    /// - `SCF_MAX_INVOCATIONS` - Stop after N invocations (default: 0, unlimited)
    /// - `SCF_TEST_SENTINELS` - Honour sentinel request ids (default: true)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("SCF_RUNTIME_API")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RuntimeError::Config("SCF_RUNTIME_API is required".to_string()))?;
        let port = lookup("SCF_RUNTIME_API_PORT");
        let runtime_api = normalize_runtime_api(&host, port.as_deref())?;

        let max_invocations = match parse_var(&lookup, "SCF_MAX_INVOCATIONS", 0u64)? {
            0 => None,
            n => Some(n),
        };

        let test_sentinels = match lookup("SCF_TEST_SENTINELS").as_deref().map(str::trim) {
            None => true,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(RuntimeError::Config(format!(
                    "invalid SCF_TEST_SENTINELS: {}",
                    other
                )));
            }
        };

        Ok(Self {
            runtime_api,
            connect_timeout_ms: parse_var(&lookup, "SCF_CONNECT_TIMEOUT_MS", 10_000)?,
            request_timeout_ms: parse_var(&lookup, "SCF_REQUEST_TIMEOUT_MS", 30_000)?,
            poll_max_attempts: parse_var(&lookup, "SCF_POLL_MAX_ATTEMPTS", 5u32)?.max(1),
            poll_retry_delay_ms: parse_var(&lookup, "SCF_POLL_RETRY_DELAY_MS", 100)?,
            max_invocations,
            test_sentinels,
        })
    }

    /// Create a configuration for the given base URL with default settings.
    pub fn new(runtime_api: impl Into<String>) -> Self {
        Self {
            runtime_api: runtime_api.into().trim_end_matches('/').to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            poll_max_attempts: 5,
            poll_retry_delay_ms: 100,
            max_invocations: None,
            test_sentinels: true,
        }
    }

    /// Create a configuration for a control plane on `127.0.0.1:port`.
    pub fn localhost(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{}", port))
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    /// Set the report timeout.
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Set the number of consecutive poll failures tolerated (minimum 1).
    pub fn with_poll_max_attempts(mut self, attempts: u32) -> Self {
        self.poll_max_attempts = attempts.max(1);
        self
    }

    /// Set the poll retry delay.
    pub fn with_poll_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.poll_retry_delay_ms = delay_ms;
        self
    }

    /// Stop after `n` invocations. Zero means unlimited, as with `SCF_MAX_INVOCATIONS`.
    pub fn with_max_invocations(mut self, n: u64) -> Self {
        self.max_invocations = (n > 0).then_some(n);
        self
    }

    /// Enable or disable sentinel handling.
    pub fn with_test_sentinels(mut self, enabled: bool) -> Self {
        self.test_sentinels = enabled;
        self
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn poll_retry_delay(&self) -> Duration {
        Duration::from_millis(self.poll_retry_delay_ms)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RuntimeError::Config(format!("invalid {}: {}", name, raw))),
    }
}

/// Turn the environment's host/port pair into a base URL.
fn normalize_runtime_api(host: &str, port: Option<&str>) -> Result<String> {
    let host = host.trim().trim_end_matches('/');
    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        match port.map(str::trim).filter(|p| !p.is_empty()) {
            Some(port) if !host.contains(':') => format!("http://{}:{}", host, port),
            _ => format!("http://{}", host),
        }
    };

    let url = reqwest::Url::parse(&candidate)
        .map_err(|e| RuntimeError::Config(format!("invalid SCF_RUNTIME_API: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(RuntimeError::Config(format!(
            "invalid SCF_RUNTIME_API: {}",
            candidate
        )));
    }
    Ok(candidate)
}
