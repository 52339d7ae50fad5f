//! Request router: registration, groups, resolution, dispatch.
//!
//! One radix tree per HTTP method, O(path-length) lookup. Conflicts are the
//! router's problem, not the tree's: every registration is checked pairwise
//! against the routes already present for that method, so a duplicate or an
//! overlapping pattern is rejected at startup. At request time there is at
//! most one matching pattern and no priority rules.
//!
//! The router is built once, sequentially, before serving starts, and is
//! read-only afterwards — resolution takes `&self` and needs no locking.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::Method;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::context::Context;
use crate::error::{HttpError, ResolveError, RouterError};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{self, BoxedMiddleware, Middleware};
use crate::response::Response;

// ── Patterns ──────────────────────────────────────────────────────────────────

/// One piece of a path pattern, between `/` separators.
enum Segment {
    /// Matches only the identical text.
    Literal(String),
    /// `:name` — matches exactly one non-empty segment, binding its value.
    Param(String),
}

/// Splits a pattern into segments, validating as it goes.
fn parse(pattern: &str) -> Result<Vec<Segment>, String> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|seg| {
            if let Some(name) = seg.strip_prefix(':') {
                if name.is_empty() {
                    return Err("parameter segment is missing a name".to_owned());
                }
                Ok(Segment::Param(name.to_owned()))
            } else if seg.contains([':', '*', '{', '}']) {
                Err(format!("segment `{seg}` contains a reserved character"))
            } else {
                Ok(Segment::Literal(seg.to_owned()))
            }
        })
        .collect()
}

/// Joins a prefix and a sub-path into one canonical absolute pattern:
/// leading `/`, no trailing or doubled separators. `/hello` and `/hello/`
/// canonicalise identically, which is what makes a group prefix plus a `/`
/// sub-route resolve the same as the bare prefix.
fn join(prefix: &str, path: &str) -> String {
    let segments: Vec<&str> = prefix
        .split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// True when some concrete path would match both patterns: same length, and
/// every position is either an equal literal pair or has a parameter on at
/// least one side.
fn overlaps(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Literal(x), Segment::Literal(y)) => x == y,
            _ => true,
        })
}

/// True when the patterns are the same route: literals equal, parameters
/// aligned (names are irrelevant to matching).
fn identical(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Literal(x), Segment::Literal(y)) => x == y,
            (Segment::Param(_), Segment::Param(_)) => true,
            _ => false,
        })
}

/// Renders segments in the tree's `{name}` syntax.
fn tree_pattern(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_owned();
    }
    let parts: Vec<String> = segments
        .iter()
        .map(|seg| match seg {
            Segment::Literal(text) => text.clone(),
            Segment::Param(name) => format!("{{{name}}}"),
        })
        .collect();
    format!("/{}", parts.join("/"))
}

// ── Router ────────────────────────────────────────────────────────────────────

/// One registered route: its pattern, its middleware (group-inherited then
/// route-specific, outer to inner), and its handler.
struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    middleware: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The middleware and handler fields hold trait objects that do not
        // implement `Debug`; print the identifying fields only.
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// The application router.
///
/// Build it once at startup, hand it to [`Server::serve`](crate::Server::serve).
///
/// ```rust
/// use reverb::{Context, HttpError, Response, Router};
///
/// async fn hello(ctx: Context) -> Result<Response, HttpError> {
///     Ok(Response::text(format!("Hello, {}", ctx.param("name"))))
/// }
///
/// let mut app = Router::new();
/// let mut greetings = app.group("/hello");
/// greetings.get("/:name", hello).unwrap();
/// ```
pub struct Router {
    trees: HashMap<Method, MatchitRouter<usize>>,
    routes: Vec<Route>,
    middleware: Vec<BoxedMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self { trees: HashMap::new(), routes: Vec::new(), middleware: Vec::new() }
    }

    /// Attaches router-wide middleware. It runs, in declaration order, before
    /// any group or route middleware on every dispatched request.
    pub fn with(&mut self, mw: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    /// Opens a route group under `prefix`. Routes and sub-groups registered
    /// through the handle inherit the prefix and the group's middleware.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group { router: self, prefix: join("", prefix), middleware: Vec::new() }
    }

    /// Registers `handler` for `method` + `pattern` with route-specific
    /// middleware. The middleware runs after any router-wide middleware, in
    /// the order given.
    pub fn on(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: Vec<BoxedMiddleware>,
    ) -> Result<(), RouterError> {
        self.register(method, join("", pattern), handler.into_boxed_handler(), middleware)
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::GET, pattern, handler, Vec::new())
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::POST, pattern, handler, Vec::new())
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::PUT, pattern, handler, Vec::new())
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::DELETE, pattern, handler, Vec::new())
    }

    fn register(
        &mut self,
        method: Method,
        pattern: String,
        handler: BoxedHandler,
        middleware: Vec<BoxedMiddleware>,
    ) -> Result<(), RouterError> {
        let segments = parse(&pattern)
            .map_err(|reason| RouterError::InvalidPattern { pattern: pattern.clone(), reason })?;

        for route in &self.routes {
            if route.method != method {
                continue;
            }
            if identical(&route.segments, &segments) {
                return Err(RouterError::Duplicate { method, pattern });
            }
            if overlaps(&route.segments, &segments) {
                let existing = route.pattern.clone();
                return Err(RouterError::Ambiguous { method, pattern, existing });
            }
        }

        let index = self.routes.len();
        self.trees
            .entry(method.clone())
            .or_default()
            .insert(tree_pattern(&segments), index)
            .map_err(|e| RouterError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;

        debug!(method = %method, pattern = %pattern, "route registered");
        self.routes.push(Route { method, pattern, segments, middleware, handler });
        Ok(())
    }

    /// Resolves a request line to a route and its extracted path parameters.
    fn resolve(
        &self,
        method: &Method,
        path: &str,
    ) -> Result<(&Route, HashMap<String, String>), ResolveError> {
        let canonical = join("", path);

        if let Some(tree) = self.trees.get(method) {
            if let Ok(matched) = tree.at(&canonical) {
                let params = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                return Ok((&self.routes[*matched.value], params));
            }
        }

        // The path may exist under another method; that is 405, not 404.
        let known_elsewhere = self
            .trees
            .iter()
            .any(|(m, tree)| m != method && tree.at(&canonical).is_ok());
        if known_elsewhere {
            Err(ResolveError::MethodNotAllowed)
        } else {
            Err(ResolveError::NotFound)
        }
    }

    /// The dispatch pipeline, independent of any transport: resolve the
    /// route, run the middleware chain around the handler, translate
    /// failures, fire finalize-hooks. Exactly one response comes back on
    /// every path — unresolved routes, handler errors, and panics included.
    ///
    /// [`Server`](crate::Server) feeds every inbound request through this;
    /// tests and embedders can call it directly without a socket.
    pub async fn dispatch(&self, req: http::Request<Bytes>) -> Response {
        let (parts, body) = req.into_parts();

        let (route, params) = match self.resolve(&parts.method, parts.uri.path()) {
            Ok(found) => found,
            // Resolution failures translate directly; no middleware runs.
            Err(e) => return HttpError::from(e).into_response(),
        };

        let ctx = Context::new(parts, body, params);
        let finalizers = ctx.finalizers();

        let chain: Vec<&BoxedMiddleware> =
            self.middleware.iter().chain(route.middleware.iter()).collect();
        let running = middleware::run(chain, &route.handler, ctx);
        let outcome = match AssertUnwindSafe(running).catch_unwind().await {
            Ok(outcome) => outcome,
            // A panicking handler must not take the process down; the
            // translator turns this into a generic 500 and serving continues.
            Err(_) => Err(HttpError::internal(format!(
                "handler for {} panicked",
                route.pattern
            ))),
        };

        let mut response = match outcome {
            Ok(res) => res,
            Err(err) => err.into_response(),
        };
        finalizers.fire(&mut response);
        response
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// A route group: a path prefix plus middleware that every route registered
/// through the handle inherits. Groups nest; a child group concatenates the
/// parent's prefix and middleware ahead of its own. Groups exist only while
/// the router is being configured.
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
    middleware: Vec<BoxedMiddleware>,
}

impl Group<'_> {
    /// Attaches middleware to this group (and, transitively, its children).
    pub fn with(mut self, mw: impl Middleware) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    /// Opens a nested group. Prefixes concatenate; middleware is inherited
    /// outer-to-inner.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: join(&self.prefix, prefix),
            middleware: self.middleware.clone(),
            router: &mut *self.router,
        }
    }

    /// Registers `handler` under the group's prefix, with route-specific
    /// middleware running after the inherited group middleware.
    pub fn on(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: Vec<BoxedMiddleware>,
    ) -> Result<(), RouterError> {
        let mut chain = self.middleware.clone();
        chain.extend(middleware);
        self.router.register(
            method,
            join(&self.prefix, pattern),
            handler.into_boxed_handler(),
            chain,
        )
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::GET, pattern, handler, Vec::new())
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::POST, pattern, handler, Vec::new())
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::PUT, pattern, handler, Vec::new())
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> Result<(), RouterError> {
        self.on(Method::DELETE, pattern, handler, Vec::new())
    }
}
