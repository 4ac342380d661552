// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Greeter Example - Typed JSON handler with one-time initialization.
//!
//! This example shows:
//! - Building handler state in a factory before the first poll
//! - Init failures reported to the control plane (unset `GREETING`)
//! - JSON input and output through `typed_fn`
//! - Business errors returned as error envelopes
//!
//! Run with: GREETING=Hello SCF_RUNTIME_API=127.0.0.1:9001 cargo run -p scf-runtime-example --bin greeter

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use scf_runtime::{HandlerError, InitContext, InitError, InvocationContext, Runtime, typed_fn};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct GreetRequest {
    name: String,
    #[serde(default)]
    shout: bool,
}

#[derive(Debug, Serialize)]
struct GreetResponse {
    message: String,
    request_id: String,
}

fn load_greeting() -> anyhow::Result<String> {
    let greeting = std::env::var("GREETING").context("GREETING must be set")?;
    anyhow::ensure!(!greeting.trim().is_empty(), "GREETING must not be blank");
    Ok(greeting)
}

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
            shutdown.cancel();
        }
    });

    let exit = runtime
        .run(|init: InitContext| async move {
            let greeting = Arc::new(load_greeting().map_err(InitError::from)?);
            init.span().in_scope(|| info!(greeting = %greeting, "Greeter ready"));

            Ok::<_, InitError>(typed_fn(move |ctx: InvocationContext, req: GreetRequest| {
                let greeting = Arc::clone(&greeting);
                async move {
                    if req.name.trim().is_empty() {
                        return Err(HandlerError::new("InvalidName", "name must not be empty"));
                    }
                    let mut message = format!("{}, {}!", greeting, req.name);
                    if req.shout {
                        message = message.to_uppercase();
                    }
                    Ok(GreetResponse {
                        message,
                        request_id: ctx.request_id().to_string(),
                    })
                }
            }))
        })
        .await;

    if let scf_runtime::RuntimeExit::InitFailed(err) = &exit {
        error!(error = %err, "Greeter could not start");
    }
    exit.into()
}
