// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures: a wiremock control plane and a raw TCP server for
//! responses wiremock cannot produce.

#![allow(dead_code)]

use std::net::SocketAddr;

use scf_runtime::RuntimeConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const NEXT_PATH: &str = "/runtime/invocation/next";
pub const INIT_ERROR_PATH: &str = "/runtime/init/error";

pub fn response_path(request_id: &str) -> String {
    format!("/runtime/invocation/{}/response", request_id)
}

pub fn error_path(request_id: &str) -> String {
    format!("/runtime/invocation/{}/error", request_id)
}

/// Config pointing at `server`, with a short retry delay.
pub fn config_for(server: &MockServer) -> RuntimeConfig {
    RuntimeConfig::new(server.uri()).with_poll_retry_delay_ms(10)
}

/// A 200 poll response carrying one invocation.
pub fn invocation(request_id: &str, time_limit_ms: u64, payload: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("request_id", request_id)
        .insert_header("time_limit_in_ms", time_limit_ms.to_string().as_str())
        .insert_header("memory_limit_in_mb", "128")
        .set_body_string(payload)
}

/// Serve exactly one invocation on the next-invocation endpoint.
pub async fn mount_single_invocation(
    server: &MockServer,
    request_id: &str,
    time_limit_ms: u64,
    payload: &str,
) {
    Mock::given(method("GET"))
        .and(path(NEXT_PATH))
        .respond_with(invocation(request_id, time_limit_ms, payload))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Accept reports for `request_id` on both result endpoints.
pub async fn mount_report_endpoints(server: &MockServer, request_id: &str) {
    Mock::given(method("POST"))
        .and(path(response_path(request_id)))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(error_path(request_id)))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

/// TCP server that answers every connection with `raw` verbatim, then closes.
///
/// An empty `raw` closes the connection without answering.
pub async fn raw_server(raw: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                if raw.is_empty() {
                    drop(socket);
                    return;
                }
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(raw.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
