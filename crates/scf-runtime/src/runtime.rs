// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The invocation loop.
//!
//! ```text
//! Initializing ──► Polling ──► Invoking ──► Reporting ─┐
//!      │              ▲  │                            │
//!      │              └──┼────────────────────────────┘
//!      ▼                 ▼
//!  Terminated ◄── (init failure, poll budget spent, shutdown, max invocations)
//! ```
//!
//! Exactly one invocation is in flight at a time, and the outcome of
//! invocation N is reported before the poll for N+1 starts.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::FutureExt;
use scf_protocol::{ErrorResponse, Sentinel};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::client::InvocationClient;
use crate::client::http::HttpClient;
use crate::config::RuntimeConfig;
use crate::context::InvocationContext;
use crate::error::{HandlerError, InitError, PollError, Result, panic_message};
use crate::handler::{Handler, HandlerFactory, InitContext};
use crate::types::{InvocationRequest, RuntimeExit, RuntimePhase};

/// Runtime that serves invocations from the control plane.
///
/// # Example
///
/// ```ignore
/// use scf_runtime::{Runtime, handler_fn};
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     let runtime = match Runtime::from_env() {
///         Ok(runtime) => runtime,
///         Err(_) => return std::process::ExitCode::FAILURE,
///     };
///     runtime
///         .run_handler(handler_fn(|_ctx, payload| async move { Ok(payload) }))
///         .await
///         .into()
/// }
/// ```
pub struct Runtime {
    /// Control-plane client, owned exclusively by the loop
    client: Box<dyn InvocationClient>,
    /// Loop settings
    config: RuntimeConfig,
    /// Current phase; only the loop writes it
    phase: watch::Sender<RuntimePhase>,
    /// External shutdown request
    shutdown: CancellationToken,
}

impl Runtime {
    /// Create a runtime talking HTTP to the configured control plane.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let client = HttpClient::new(&config)?;
        Ok(Self::with_client(client, config))
    }

    /// Create a runtime from environment variables.
    ///
    /// See [`RuntimeConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self> {
        Self::new(RuntimeConfig::from_env()?)
    }

    /// Create a runtime over an arbitrary client.
    pub fn with_client(client: impl InvocationClient + 'static, config: RuntimeConfig) -> Self {
        let (phase, _) = watch::channel(RuntimePhase::Uninitialized);
        Self {
            client: Box::new(client),
            config,
            phase,
            shutdown: CancellationToken::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RuntimePhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<RuntimePhase> {
        self.phase.subscribe()
    }

    /// Token that stops the loop when cancelled.
    ///
    /// The loop checks it while polling; an invocation already in flight is
    /// completed and reported first.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve invocations with a handler that needs no initialization.
    pub async fn run_handler<H: Handler>(self, handler: H) -> RuntimeExit {
        self.run(move |_init: InitContext| async move { Ok::<H, InitError>(handler) })
            .await
    }

    /// Initialize the handler through `factory`, then serve invocations until
    /// a terminal condition is reached.
    pub async fn run<F: HandlerFactory>(mut self, factory: F) -> RuntimeExit {
        let handler = match self.initialize(factory).await {
            Ok(handler) => Arc::new(handler),
            Err(err) => {
                self.set_phase(RuntimePhase::Terminated);
                return RuntimeExit::InitFailed(err);
            }
        };

        let mut served: u64 = 0;
        let exit = loop {
            if self.config.max_invocations.is_some_and(|max| served >= max) {
                info!(invocations = served, "Invocation budget reached");
                break RuntimeExit::Completed { invocations: served };
            }

            self.set_phase(RuntimePhase::Polling);
            let shutdown = self.shutdown.clone();
            let polled = tokio::select! {
                biased;

                _ = shutdown.cancelled() => None,
                result = self.next_invocation() => Some(result),
            };

            let request = match polled {
                None => {
                    info!(invocations = served, "Shutdown requested");
                    break RuntimeExit::Shutdown { invocations: served };
                }
                Some(Err(err)) => {
                    error!(error = %err, "Giving up on the control plane");
                    break RuntimeExit::PollExhausted(err);
                }
                Some(Ok(request)) => request,
            };

            self.serve(&handler, request).await;
            // Every received invocation counts, sentinels included.
            served += 1;
        };

        self.set_phase(RuntimePhase::Terminated);
        exit
    }

    async fn initialize<F: HandlerFactory>(&mut self, factory: F) -> Result<F::Handler, InitError> {
        self.set_phase(RuntimePhase::Initializing);
        let span = info_span!("init");
        let init = InitContext::new(span.clone());

        let created = AssertUnwindSafe(async move { factory.create(init).await })
            .catch_unwind()
            .instrument(span)
            .await;

        let err = match created {
            Ok(Ok(handler)) => {
                info!("Handler initialized");
                return Ok(handler);
            }
            Ok(Err(err)) => err,
            Err(payload) => InitError::panic(panic_message(&*payload)),
        };

        error!(error = %err, "Handler initialization failed");
        if let Err(report_err) = self
            .client
            .post_init_error(&ErrorResponse::from(&err))
            .await
        {
            warn!(error = %report_err, "Failed to report init error");
        }
        Err(err)
    }

    /// Poll until an invocation arrives or the attempt budget is spent.
    async fn next_invocation(&mut self) -> Result<InvocationRequest, PollError> {
        let mut failures: u32 = 0;
        loop {
            match self.client.get_next_invocation().await {
                Ok(request) => return Ok(request),
                Err(err) => {
                    failures += 1;
                    if failures >= self.config.poll_max_attempts {
                        return Err(err);
                    }
                    let delay = err.retry_delay(self.config.poll_retry_delay());
                    warn!(
                        error = %err,
                        attempt = failures,
                        max_attempts = self.config.poll_max_attempts,
                        retry_in_ms = delay.map(|d| d.as_millis() as u64).unwrap_or(0),
                        "Poll failed, retrying"
                    );
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Run one invocation through Invoking and Reporting.
    async fn serve<H: Handler>(&mut self, handler: &Arc<H>, request: InvocationRequest) {
        let span = info_span!(
            "invocation",
            request_id = %request.request_id,
            time_limit_ms = request.time_limit_ms,
            memory_limit_mb = request.memory_limit_mb,
        );
        let ctx = InvocationContext::build(&request, Instant::now(), Utc::now(), span.clone());

        self.set_phase(RuntimePhase::Invoking);

        if self.config.test_sentinels
            && let Some(sentinel) = Sentinel::from_request_id(&request.request_id)
        {
            self.serve_sentinel(sentinel, request)
                .instrument(span)
                .await;
            return;
        }

        let outcome = execute(handler, &ctx, request.payload)
            .instrument(span.clone())
            .await;

        self.set_phase(RuntimePhase::Reporting);
        self.report(&request.request_id, outcome)
            .instrument(span)
            .await;
    }

    async fn serve_sentinel(&mut self, sentinel: Sentinel, request: InvocationRequest) {
        match sentinel {
            Sentinel::Timeout => {
                let pause = Duration::from_millis(Sentinel::pause_millis(&request.payload));
                debug!(pause_ms = pause.as_millis() as u64, "Timeout sentinel, pausing");
                tokio::time::sleep(pause).await;
                self.set_phase(RuntimePhase::Reporting);
                self.report(&request.request_id, Ok(request.payload)).await;
            }
            Sentinel::Disconnect => {
                debug!("Disconnect sentinel, dropping connection");
                self.set_phase(RuntimePhase::Reporting);
                self.client.reset_connection().await;
            }
        }
    }

    /// Send the outcome. Rejected reports are logged and never retried.
    async fn report(&mut self, request_id: &str, outcome: Result<Bytes, HandlerError>) {
        let result = match &outcome {
            Ok(body) => self.client.post_response(request_id, body.clone()).await,
            Err(err) => {
                warn!(error_type = %err.kind(), error = %err.message(), "Invocation failed");
                self.client
                    .post_error(request_id, &ErrorResponse::from(err))
                    .await
            }
        };

        match result {
            Ok(()) => debug!(success = outcome.is_ok(), "Outcome reported"),
            Err(err) => warn!(error = %err, "Control plane rejected the report; moving on"),
        }
    }

    fn set_phase(&self, phase: RuntimePhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(from = %previous, to = %phase, "Phase transition");
        }
    }
}

/// Run the handler against the context's deadline.
///
/// The handler runs on its own task. If the deadline passes first, the
/// context is cancelled and a `Timeout` error is returned; the task is
/// detached rather than aborted, so cleanup is left to the handler.
pub(crate) async fn execute<H: Handler>(
    handler: &Arc<H>,
    ctx: &InvocationContext,
    payload: Bytes,
) -> Result<Bytes, HandlerError> {
    if ctx.is_expired() {
        warn!("Invocation arrived with no time left");
        ctx.cancel();
        return Err(HandlerError::timeout(ctx.time_limit()));
    }

    let task_handler = Arc::clone(handler);
    let task_ctx = ctx.clone();
    let mut task = tokio::spawn(
        async move { task_handler.invoke(task_ctx, payload).await }.in_current_span(),
    );

    tokio::select! {
        joined = &mut task => match joined {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => {
                let message = panic_message(&*join_err.into_panic());
                error!(panic = %message, "Handler panicked");
                Err(HandlerError::panic(message))
            }
            Err(join_err) => Err(HandlerError::panic(join_err.to_string())),
        },
        _ = tokio::time::sleep_until(ctx.deadline()) => {
            ctx.cancel();
            warn!(
                time_limit_ms = ctx.time_limit().as_millis() as u64,
                "Deadline passed before the handler finished"
            );
            Err(HandlerError::timeout(ctx.time_limit()))
        }
    }
}
