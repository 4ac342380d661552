// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Echo Example - Returns every payload unchanged.
//!
//! Useful as a smoke test for a control plane: the `timeout` and
//! `disconnect` sentinel request ids are honoured unless
//! `SCF_TEST_SENTINELS=false`.
//!
//! Run with: SCF_RUNTIME_API=127.0.0.1:9001 cargo run -p scf-runtime-example --bin echo

use std::process::ExitCode;

use scf_runtime::{InvocationContext, Runtime, handler_fn};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let runtime = match Runtime::from_env() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = runtime.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, finishing current invocation");
            shutdown.cancel();
        }
    });

    let exit = runtime
        .run_handler(handler_fn(|ctx: InvocationContext, payload| async move {
            info!(
                request_id = %ctx.request_id(),
                bytes = payload.len(),
                remaining_ms = ctx.remaining().as_millis() as u64,
                "Echoing payload"
            );
            Ok(payload)
        }))
        .await;

    info!(invocations = exit.invocations(), code = exit.code(), "Runtime stopped");
    exit.into()
}
