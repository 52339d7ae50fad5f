//! # reverb
//!
//! A minimal HTTP framework built around one idea: the request pipeline —
//! routing, middleware, parameter binding, error translation — is the only
//! part of a small service with structural complexity, so it should be
//! explicit, typed, and inspectable. Handlers stay trivial leaf functions.
//!
//! ## The pipeline
//!
//! ```text
//! request → resolve (router) → middleware chain (outer → inner) → handler
//!                 │                    │                             │
//!               404/405          Flow::Stop short-circuit       Response / HttpError
//!                 └──────────────── error translator ────────────────┘
//!                                      finalize-hooks
//! ```
//!
//! - **Routing** — radix-tree lookup via [`matchit`]; duplicates and
//!   overlapping patterns are rejected when you register them, never
//!   resolved by priority at request time.
//! - **Groups** — a prefix plus middleware, inherited by everything
//!   registered through the group handle. Groups nest.
//! - **Middleware** — an explicit [`Flow`] decision per request: continue
//!   inward or stop with a terminal response. After-the-fact response
//!   mutation goes through finalize-hooks ([`Context::defer`]), which run
//!   exactly once on the final response, error paths included.
//! - **Errors** — handlers fail with [`HttpError`]; the translator turns it
//!   into a JSON response, keeps 5xx details out of the body, and catches
//!   panics so one bad request never takes the process down.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use reverb::{Context, HttpError, Response, Router, Server};
//!
//! async fn greet(ctx: Context) -> Result<Response, HttpError> {
//!     Response::json(&serde_json::json!({
//!         "message": format!("Hello, {}", ctx.param("name")),
//!     }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = Router::new();
//!     app.with(reverb::middleware::Trace);
//!
//!     let mut hello = app.group("/hello");
//!     hello.get("/:name", greet)?;
//!
//!     Server::bind("0.0.0.0:8080").serve(app).await?;
//!     Ok(())
//! }
//! ```

mod context;
mod error;
mod handler;
mod response;
mod router;
mod server;

pub mod health;
pub mod middleware;

pub use context::Context;
pub use error::{BindError, Error, HttpError, ResolveError, RouterError};
pub use handler::{BoxFuture, Handler, IntoOutcome, Outcome};
pub use middleware::{BoxedMiddleware, Flow, Middleware};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Group, Router};
pub use server::Server;
