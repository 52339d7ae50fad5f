//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection, and
//! authentication-header inspection.
//!
//! A middleware makes one explicit decision per request, expressed as a
//! [`Flow`]: hand the context onward ([`Flow::Continue`]) or produce a
//! terminal response and skip everything further in ([`Flow::Stop`]). Work
//! that must happen *after* the inner chain — mutating or observing the
//! final response — is scheduled with [`Context::defer`], which fires on the
//! response immediately before it is sent, whatever the chain did in the
//! meantime.
//!
//! Plain async functions are middleware:
//!
//! ```rust
//! use reverb::{Context, Flow, HttpError};
//!
//! async fn powered_by(ctx: Context) -> Result<Flow, HttpError> {
//!     ctx.defer(|res| {
//!         res.set_header(
//!             http::header::HeaderName::from_static("x-powered-by"),
//!             http::header::HeaderValue::from_static("reverb"),
//!         );
//!     });
//!     Ok(Flow::Continue(ctx))
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::error::HttpError;
use crate::handler::{BoxFuture, BoxedHandler, Outcome};
use crate::response::Response;

// ── Flow ──────────────────────────────────────────────────────────────────────

/// What a middleware decided to do with the request.
///
/// A tagged decision instead of implicit early-return control flow: the chain
/// runner matches on it exhaustively, so "continue" and "short-circuit" are
/// the only two things a middleware can express.
pub enum Flow {
    /// Hand the (possibly modified) context to the next stage.
    Continue(Context),
    /// Terminal response. The handler and all inner middleware never run.
    Stop(Response),
}

// ── Middleware trait ──────────────────────────────────────────────────────────

/// A stage in the request-processing chain.
///
/// Implemented automatically for any
/// `async fn(Context) -> Result<Flow, HttpError>`, which is the common way to
/// write one. Implement the trait by hand only when the middleware carries
/// configuration state.
pub trait Middleware: Send + Sync + 'static {
    fn apply<'a>(&'a self, ctx: Context) -> BoxFuture<'a, Result<Flow, HttpError>>;
}

/// A heap-allocated middleware shared by every route it is attached to.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<F, Fut> Middleware for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow, HttpError>> + Send + 'static,
{
    fn apply<'a>(&'a self, ctx: Context) -> BoxFuture<'a, Result<Flow, HttpError>> {
        Box::pin((self)(ctx))
    }
}

// ── Chain runner ──────────────────────────────────────────────────────────────

/// Walks the chain outermost-first, then invokes the handler.
///
/// A `Stop` or an `Err` from any stage returns immediately — the handler runs
/// zero times on that path, exactly once otherwise.
pub(crate) async fn run<'a, I>(chain: I, handler: &BoxedHandler, mut ctx: Context) -> Outcome
where
    I: IntoIterator<Item = &'a BoxedMiddleware>,
{
    for mw in chain {
        match mw.apply(ctx).await? {
            Flow::Continue(next) => ctx = next,
            Flow::Stop(res) => return Ok(res),
        }
    }
    handler.call(ctx).await
}

// ── Trace ─────────────────────────────────────────────────────────────────────

/// Per-request log line: method, path, status, latency.
///
/// The status and latency are only known once the response is final, so the
/// log line is emitted from a finalize-hook rather than from `apply` itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn apply<'a>(&'a self, ctx: Context) -> BoxFuture<'a, Result<Flow, HttpError>> {
        let method = ctx.method().clone();
        let path = ctx.path().to_owned();
        let start = Instant::now();
        ctx.defer(move |res| {
            info!(
                method = %method,
                path = %path,
                status = res.status_code().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "request"
            );
        });
        Box::pin(async move { Ok(Flow::Continue(ctx)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use bytes::Bytes;
    use http::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn ctx() -> Context {
        let (parts, ()) = http::Request::builder()
            .method(http::Method::GET)
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        Context::new(parts, Bytes::new(), HashMap::new())
    }

    fn recording(log: &Log, before: &'static str, after: &'static str) -> BoxedMiddleware {
        let log = Arc::clone(log);
        Arc::new(move |ctx: Context| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(before);
                let hook_log = Arc::clone(&log);
                ctx.defer(move |_res| hook_log.lock().unwrap().push(after));
                Ok::<_, HttpError>(Flow::Continue(ctx))
            }
        })
    }

    fn handler(log: &Log) -> BoxedHandler {
        let log = Arc::clone(log);
        (move |_ctx: Context| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("handler");
                Ok::<_, HttpError>(Response::text("done"))
            }
        })
        .into_boxed_handler()
    }

    #[tokio::test]
    async fn chain_runs_outer_to_inner_and_after_in_lifo_order() {
        let log: Log = Arc::default();
        let chain = vec![
            recording(&log, "outer:before", "outer:after"),
            recording(&log, "inner:before", "inner:after"),
        ];
        let ctx = ctx();
        let finalizers = ctx.finalizers();

        let mut res = run(&chain, &handler(&log), ctx).await.unwrap();
        finalizers.fire(&mut res);

        assert_eq!(
            *log.lock().unwrap(),
            ["outer:before", "inner:before", "handler", "inner:after", "outer:after"],
        );
    }

    #[tokio::test]
    async fn stop_skips_handler_and_inner_middleware() {
        let log: Log = Arc::default();
        let gate: BoxedMiddleware = Arc::new(|_ctx: Context| async {
            Ok::<_, HttpError>(Flow::Stop(Response::status(StatusCode::FORBIDDEN)))
        });
        let chain = vec![gate, recording(&log, "inner:before", "inner:after")];

        let res = run(&chain, &handler(&log), ctx()).await.unwrap();

        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn middleware_error_skips_handler() {
        let log: Log = Arc::default();
        let failing: BoxedMiddleware = Arc::new(|_ctx: Context| async {
            Err::<Flow, _>(HttpError::new(StatusCode::UNAUTHORIZED, "no token"))
        });

        let chain = vec![failing];
        let err = run(&chain, &handler(&log), ctx()).await.unwrap_err();

        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_chain_invokes_handler_exactly_once() {
        let log: Log = Arc::default();
        let chain: Vec<BoxedMiddleware> = Vec::new();
        let res = run(&chain, &handler(&log), ctx()).await.unwrap();

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), ["handler"]);
    }
}
