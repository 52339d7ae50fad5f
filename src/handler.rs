//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router needs to hold handlers of *different* types in a single route
//! table. Rust collections can only hold one concrete type, so we use
//! **trait objects** (`dyn ErasedHandler`) to hide the concrete handler type
//! behind a common interface and store everything uniformly.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn hello(ctx: Context) -> Result<Response, HttpError> { … }
//!        ↓ router registration
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(ctx).await.into_outcome() })
//! ```
//!
//! The only runtime cost per request is **one Arc clone** (atomic inc) +
//! **one virtual call** — negligible compared to network I/O.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::context::Context;
use crate::error::HttpError;
use crate::response::{IntoResponse, Response};

/// What running a handler (or a full middleware chain) produces: a response,
/// or a failure for the error translator.
pub type Outcome = Result<Response, HttpError>;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` is required because the async runtime must be able to poll
/// the future in-place — it cannot move it in memory after the first poll.
/// The lifetime lets middleware futures borrow `&self`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
/// External crates cannot usefully interact with this trait.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call<'a>(&'a self, ctx: Context) -> BoxFuture<'a, Outcome>;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
///
/// `#[doc(hidden)] pub` for the same reason as `ErasedHandler`.
/// `Arc` gives us cheap, thread-safe shared ownership (one atomic reference
/// count increment per request) without copying the handler.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Context) -> impl IntoOutcome
/// ```
///
/// which in practice means returning `Result<Response, HttpError>`, a bare
/// [`Response`], a string, or a [`StatusCode`].
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it. This prevents accidental misuse and
/// keeps the API surface stable across versions.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into an [`Outcome`].
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl<R: IntoResponse> IntoOutcome for Result<R, HttpError> {
    fn into_outcome(self) -> Outcome {
        self.map(IntoResponse::into_response)
    }
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Outcome {
        Ok(self)
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome {
        Ok(self.into_response())
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome {
        Ok(self.into_response())
    }
}

impl IntoOutcome for StatusCode {
    fn into_outcome(self) -> Outcome {
        Ok(self.into_response())
    }
}

// ── Blanket implementations ───────────────────────────────────────────────────

/// Implement the sealing trait for any function with the right signature.
///
/// `Fn(Context) -> Fut` covers:
///   - named `async fn` items
///   - `async` closures
///   - any struct that implements `Fn`
impl<F, Fut, O> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoOutcome + Send + 'static,
{
}

/// Implement `Handler` for any function with the right signature.
impl<F, Fut, O> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, O> ErasedHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoOutcome + Send + 'static,
{
    fn call<'a>(&'a self, ctx: Context) -> BoxFuture<'a, Outcome> {
        // Call the wrapped function — this returns the concrete `Fut`.
        // We then map it to `Outcome` via `IntoOutcome` and box the whole
        // thing so the return type matches the trait signature.
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
