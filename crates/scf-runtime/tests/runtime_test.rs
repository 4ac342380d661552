// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end runtime loop tests against a mock control plane.

mod common;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use scf_runtime::{
    Handler, HandlerError, InitContext, InitError, InvocationContext, PollError, Runtime,
    RuntimeConfig, RuntimeExit, handler_fn, string_fn, typed_fn,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::matchers::{body_json, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

#[derive(Debug, Deserialize)]
struct Order {
    sku: String,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct Quote {
    sku: String,
    total_cents: u64,
}

struct NeverBuilt;

#[async_trait]
impl Handler for NeverBuilt {
    async fn invoke(&self, _ctx: InvocationContext, _payload: Bytes) -> Result<Bytes, HandlerError> {
        unreachable!("handler must not run after a failed init")
    }
}

#[tokio::test]
async fn test_echo_round_trip() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "abc-123", 3000, "hello").await;
    Mock::given(method("POST"))
        .and(path(response_path("abc-123")))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(1)).unwrap();
    let exit = runtime
        .run_handler(handler_fn(|_ctx, payload| async move { Ok(payload) }))
        .await;

    assert!(matches!(exit, RuntimeExit::Completed { invocations: 1 }));
    assert_eq!(exit.code(), 0);
}

#[tokio::test]
async fn test_typed_handler_round_trip() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "order-1", 3000, r#"{"sku":"A-1","quantity":3}"#).await;
    Mock::given(method("POST"))
        .and(path(response_path("order-1")))
        .and(body_json(json!({"sku": "A-1", "total_cents": 1497})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(1)).unwrap();
    let exit = runtime
        .run_handler(typed_fn(|_ctx, order: Order| async move {
            Ok(Quote {
                sku: order.sku,
                total_cents: 499 * u64::from(order.quantity),
            })
        }))
        .await;

    assert!(exit.is_success());
}

#[tokio::test]
async fn test_handler_error_posted_as_envelope() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "abc-123", 3000, "hello").await;
    Mock::given(method("POST"))
        .and(path(error_path("abc-123")))
        .and(body_json(json!({
            "errorType": "BusinessError",
            "errorMessage": "boom",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(1)).unwrap();
    let exit = runtime
        .run_handler(string_fn(|_ctx, _text: String| async move {
            Err::<String, _>(HandlerError::new("BusinessError", "boom"))
        }))
        .await;

    assert!(exit.is_success());
}

#[tokio::test]
async fn test_decode_failure_posted_as_error() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "abc-123", 3000, "not json").await;
    mount_report_endpoints(&server, "abc-123").await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(1)).unwrap();
    runtime
        .run_handler(typed_fn(|_ctx, order: Order| async move { Ok(order.quantity) }))
        .await;

    let requests = server.received_requests().await.unwrap();
    let report = requests.last().unwrap();
    assert_eq!(report.url.path(), error_path("abc-123"));
    let body: serde_json::Value = serde_json::from_slice(&report.body).unwrap();
    assert_eq!(body["errorType"], "DecodeError");
}

#[tokio::test]
async fn test_timeout_posted_as_error() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "slow-1", 100, "").await;
    Mock::given(method("POST"))
        .and(path(error_path("slow-1")))
        .and(body_json(json!({
            "errorType": "Timeout",
            "errorMessage": "invocation timed out after 100ms",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(1)).unwrap();
    let started = Instant::now();
    runtime
        .run_handler(handler_fn(|ctx: InvocationContext, payload| async move {
            ctx.cancelled().await;
            Ok(payload)
        }))
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_init_failure_reported_once_and_never_polls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INIT_ERROR_PATH))
        .and(body_json(json!({
            "errorType": "ConfigMissing",
            "errorMessage": "DATABASE_URL not set",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(NEXT_PATH))
        .respond_with(invocation("abc-123", 3000, "hello"))
        .expect(0)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server)).unwrap();
    let exit = runtime
        .run(|_init: InitContext| async {
            Err::<NeverBuilt, _>(InitError::new("ConfigMissing", "DATABASE_URL not set"))
        })
        .await;

    assert!(matches!(exit, RuntimeExit::InitFailed(_)));
    assert_eq!(exit.code(), 1);
}

#[tokio::test]
async fn test_poll_exhaustion_exits_with_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(NEXT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_poll_max_attempts(3)).unwrap();
    let exit = runtime
        .run_handler(handler_fn(|_ctx, payload| async move { Ok(payload) }))
        .await;

    assert!(matches!(
        exit,
        RuntimeExit::PollExhausted(PollError::InternalServerError)
    ));
    assert_eq!(exit.code(), 1);
}

#[tokio::test]
async fn test_dropped_connections_exhaust_poll_budget() {
    let addr = raw_server("").await;
    let config = RuntimeConfig::new(format!("http://{}", addr))
        .with_poll_max_attempts(3)
        .with_poll_retry_delay_ms(50);

    let runtime = Runtime::new(config).unwrap();
    let started = Instant::now();
    let exit = runtime
        .run_handler(handler_fn(|_ctx, payload| async move { Ok(payload) }))
        .await;

    assert!(
        matches!(exit, RuntimeExit::PollExhausted(PollError::Transport(_))),
        "unexpected exit: {:?}",
        exit
    );
    assert_eq!(exit.code(), 1);
    // Two waits between three attempts.
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_rejected_report_does_not_stop_the_loop() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "first", 3000, "1").await;
    mount_single_invocation(&server, "second", 3000, "2").await;
    Mock::given(method("POST"))
        .and(path(response_path("first")))
        .respond_with(ResponseTemplate::new(413))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(response_path("second")))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(2)).unwrap();
    let exit = runtime
        .run_handler(handler_fn(|_ctx, payload| async move { Ok(payload) }))
        .await;

    assert!(matches!(exit, RuntimeExit::Completed { invocations: 2 }));
}

#[tokio::test]
async fn test_timeout_sentinel_waits_then_echoes() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "timeout", 3000, "200").await;
    Mock::given(method("POST"))
        .and(path(response_path("timeout")))
        .and(body_string("200"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(1)).unwrap();
    let started = Instant::now();
    runtime
        .run_handler(handler_fn(|_ctx, _payload| async move {
            Err(HandlerError::new("Unexpected", "sentinel reached the handler"))
        }))
        .await;

    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_disconnect_sentinel_reports_nothing() {
    let server = MockServer::start().await;
    mount_single_invocation(&server, "disconnect", 3000, "").await;
    mount_single_invocation(&server, "abc-123", 3000, "hello").await;
    Mock::given(method("POST"))
        .and(path(response_path("disconnect")))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(response_path("abc-123")))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = Runtime::new(config_for(&server).with_max_invocations(2)).unwrap();
    let exit = runtime
        .run_handler(handler_fn(|_ctx, payload| async move { Ok(payload) }))
        .await;

    assert_eq!(exit.invocations(), 2);
}
