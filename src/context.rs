//! Per-request context.
//!
//! One [`Context`] exists per request. It carries everything a handler or
//! middleware may read — method, path, headers, path/query parameters, the
//! buffered body — plus the list of finalize-hooks that run on the response
//! just before it is sent. Nothing in here is shared across requests.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::BindError;
use crate::response::Response;

// ── Finalize-hooks ────────────────────────────────────────────────────────────

type FinalizeHook = Box<dyn FnOnce(&mut Response) + Send + 'static>;

/// The ordered finalize-hook list, behind a shared handle.
///
/// The dispatch loop keeps a clone of the handle, so hooks registered by
/// middleware survive the context being consumed further down the chain and
/// still apply when the outcome is an error translation.
#[derive(Clone, Default)]
pub(crate) struct Finalizers(Arc<Mutex<Vec<FinalizeHook>>>);

impl Finalizers {
    fn push(&self, hook: FinalizeHook) {
        self.0.lock().expect("finalize-hook list poisoned").push(hook);
    }

    /// Runs every registered hook exactly once, in LIFO order: hooks from
    /// inner middleware fire first, the outermost fires last.
    pub(crate) fn fire(&self, res: &mut Response) {
        let hooks = mem::take(&mut *self.0.lock().expect("finalize-hook list poisoned"));
        for hook in hooks.into_iter().rev() {
            hook(res);
        }
    }
}

// ── Context ──────────────────────────────────────────────────────────────────

/// The per-request context handed through the middleware chain to the handler.
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
    finalizers: Finalizers,
}

impl Context {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
    ) -> Self {
        let query = parse_query(parts.uri.query().unwrap_or(""));
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            query,
            body,
            finalizers: Finalizers::default(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Case-insensitive header lookup; `None` when absent or not UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter, empty when the pattern bound none.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` is `"42"`.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }

    /// Returns a query parameter, empty when absent. Duplicate keys keep the
    /// last value.
    pub fn query(&self, name: &str) -> &str {
        self.query.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decodes the request body into `T`.
    ///
    /// JSON is the only supported format: a `content-type` other than
    /// `application/json` is rejected as [`BindError::ContentType`], and a
    /// body that fails to parse — or parses but does not match `T` — as
    /// [`BindError::Json`]. A missing `content-type` is treated as JSON.
    /// Field-level validation stays with the handler.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        if let Some(ct) = self.header(CONTENT_TYPE.as_str()) {
            let media_type = ct.split(';').next().unwrap_or("").trim();
            if !media_type.eq_ignore_ascii_case("application/json") {
                return Err(BindError::ContentType(media_type.to_owned()));
            }
        }
        serde_json::from_slice(&self.body).map_err(BindError::Json)
    }

    /// Registers a finalize-hook: a callback run exactly once on the final
    /// response, immediately before it is sent — even when the outcome is an
    /// error translation, and regardless of how much of the chain ran after
    /// registration.
    pub fn defer(&self, hook: impl FnOnce(&mut Response) + Send + 'static) {
        self.finalizers.push(Box::new(hook));
    }

    pub(crate) fn finalizers(&self) -> Finalizers {
        self.finalizers.clone()
    }
}

/// Decodes a query string into a name → value map, last key wins.
fn parse_query(raw: &str) -> HashMap<String, String> {
    if raw.is_empty() {
        return HashMap::new();
    }
    match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(e) => {
            debug!(query = raw, "query string did not decode: {e}");
            HashMap::new()
        }
    }
}
