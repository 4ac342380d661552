// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Handler abstraction.
//!
//! The runtime only ever sees bytes in and bytes out through [`Handler`].
//! Handler shapes are built on top of it:
//! - [`handler_fn`]: raw bytes, no transformation
//! - [`typed_fn`]: JSON-decoded input, JSON-encoded output
//! - [`string_fn`]: UTF-8 text in, text (or nothing) out
//!
//! Custom payload formats plug in through [`Codec`].

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Span;

use crate::context::InvocationContext;
use crate::error::{HandlerError, InitError};

/// User function code as the runtime sees it.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Process one invocation payload.
    async fn invoke(&self, ctx: InvocationContext, payload: Bytes) -> Result<Bytes, HandlerError>;
}

/// Context passed to the handler factory during initialization.
#[derive(Debug, Clone)]
pub struct InitContext {
    span: Span,
}

impl InitContext {
    pub(crate) fn new(span: Span) -> Self {
        Self { span }
    }

    /// Span for initialization logging.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Produces the handler exactly once, during initialization.
///
/// Implemented for any `FnOnce(InitContext) -> impl Future<Output = Result<H, InitError>>`.
pub trait HandlerFactory: Send {
    /// Handler produced by the factory
    type Handler: Handler;
    /// Future resolving to the handler
    type Future: Future<Output = Result<Self::Handler, InitError>> + Send;

    /// Build the handler.
    fn create(self, ctx: InitContext) -> Self::Future;
}

impl<F, Fut, H> HandlerFactory for F
where
    F: FnOnce(InitContext) -> Fut + Send,
    Fut: Future<Output = Result<H, InitError>> + Send,
    H: Handler,
{
    type Handler = H;
    type Future = Fut;

    fn create(self, ctx: InitContext) -> Fut {
        self(ctx)
    }
}

/// Handler over raw bytes, built by [`handler_fn`].
pub struct RawHandler<F> {
    func: F,
}

/// Wrap an async closure over raw bytes.
///
/// ```ignore
/// let echo = handler_fn(|_ctx, payload| async move { Ok(payload) });
/// ```
pub fn handler_fn<F, Fut>(func: F) -> RawHandler<F>
where
    F: Fn(InvocationContext, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, HandlerError>> + Send,
{
    RawHandler { func }
}

#[async_trait]
impl<F, Fut> Handler for RawHandler<F>
where
    F: Fn(InvocationContext, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, HandlerError>> + Send,
{
    async fn invoke(&self, ctx: InvocationContext, payload: Bytes) -> Result<Bytes, HandlerError> {
        (self.func)(ctx, payload).await
    }
}

/// Conversion between the wire payload and a handler's typed input and output.
pub trait Codec<In, Out>: Send + Sync + 'static {
    /// Decode the request payload. Failures become `DecodeError` invocation errors.
    fn decode(&self, payload: &[u8]) -> Result<In, HandlerError>;

    /// Encode the handler output.
    fn encode(&self, output: Out) -> Result<Bytes, HandlerError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl<In, Out> Codec<In, Out> for Json
where
    In: DeserializeOwned,
    Out: Serialize,
{
    fn decode(&self, payload: &[u8]) -> Result<In, HandlerError> {
        serde_json::from_slice(payload).map_err(HandlerError::decode)
    }

    fn encode(&self, output: Out) -> Result<Bytes, HandlerError> {
        serde_json::to_vec(&output)
            .map(Bytes::from)
            .map_err(HandlerError::encode)
    }
}

/// UTF-8 text codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl Codec<String, String> for Utf8 {
    fn decode(&self, payload: &[u8]) -> Result<String, HandlerError> {
        String::from_utf8(payload.to_vec()).map_err(HandlerError::decode)
    }

    fn encode(&self, output: String) -> Result<Bytes, HandlerError> {
        Ok(Bytes::from(output))
    }
}

impl Codec<String, ()> for Utf8 {
    fn decode(&self, payload: &[u8]) -> Result<String, HandlerError> {
        <Utf8 as Codec<String, String>>::decode(self, payload)
    }

    fn encode(&self, _output: ()) -> Result<Bytes, HandlerError> {
        Ok(Bytes::new())
    }
}

/// Handler that decodes its input and encodes its output through a [`Codec`].
pub struct TypedHandler<F, C, In, Out> {
    func: F,
    codec: C,
    _types: PhantomData<fn(In) -> Out>,
}

impl<F, C, In, Out> TypedHandler<F, C, In, Out> {
    /// Compose `func` with an arbitrary codec.
    pub fn with_codec(codec: C, func: F) -> Self {
        Self {
            func,
            codec,
            _types: PhantomData,
        }
    }
}

/// Wrap an async closure whose input and output are JSON.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct Greet { name: String }
///
/// let greeter = typed_fn(|_ctx, req: Greet| async move {
///     Ok(format!("hello, {}", req.name))
/// });
/// ```
pub fn typed_fn<In, Out, F, Fut>(func: F) -> TypedHandler<F, Json, In, Out>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
    F: Fn(InvocationContext, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
{
    TypedHandler::with_codec(Json, func)
}

/// Wrap an async closure over UTF-8 text. The output may be `String` or `()`.
pub fn string_fn<Out, F, Fut>(func: F) -> TypedHandler<F, Utf8, String, Out>
where
    Utf8: Codec<String, Out>,
    Out: Send + 'static,
    F: Fn(InvocationContext, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
{
    TypedHandler::with_codec(Utf8, func)
}

#[async_trait]
impl<F, C, In, Out, Fut> Handler for TypedHandler<F, C, In, Out>
where
    C: Codec<In, Out>,
    In: Send + 'static,
    Out: Send + 'static,
    F: Fn(InvocationContext, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
{
    async fn invoke(&self, ctx: InvocationContext, payload: Bytes) -> Result<Bytes, HandlerError> {
        let input = self.codec.decode(&payload)?;
        let output = (self.func)(ctx, input).await?;
        self.codec.encode(output)
    }
}
