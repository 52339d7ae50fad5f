//! Error types and translation into HTTP responses.

use std::fmt;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use tracing::error;

use crate::response::Response;

// ── HttpError ─────────────────────────────────────────────────────────────────

/// The failure signal a handler or middleware returns.
///
/// Carries everything needed to produce the response: a status code and a
/// message. Handlers construct these directly for caller-caused failures:
///
/// ```rust
/// use http::StatusCode;
/// use reverb::HttpError;
///
/// HttpError::new(StatusCode::BAD_REQUEST, "name is missing");
/// ```
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// `400 Bad Request` with the given message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// `500 Internal Server Error`.
    ///
    /// The message is logged at the dispatch boundary but never sent to the
    /// client — server-side failures get the generic reason phrase only.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Translates the error into its response.
    ///
    /// 4xx messages go to the client verbatim; 5xx messages are replaced by
    /// the status' reason phrase so internal detail never leaks.
    pub(crate) fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.message, "request failed");
            self.status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_owned()
        } else {
            self.message
        };

        let body = serde_json::to_vec(&serde_json::json!({ "message": message }))
            .unwrap_or_else(|_| br#"{"message":"Internal Server Error"}"#.to_vec());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Response { status: self.status, headers, body: body.into() }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for HttpError {}

// ── BindError ─────────────────────────────────────────────────────────────────

/// Why [`Context::bind`](crate::Context::bind) rejected a request body.
#[derive(Debug)]
pub enum BindError {
    /// The request declared a content type the binder does not decode.
    ContentType(String),
    /// The body was not valid JSON, or did not match the target shape.
    Json(serde_json::Error),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentType(ct) => write!(f, "unsupported content type `{ct}`"),
            Self::Json(e) => write!(f, "malformed body: {e}"),
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ContentType(_) => None,
            Self::Json(e) => Some(e),
        }
    }
}

/// `?` in a handler turns a bind failure into the matching client error:
/// 415 for a foreign content type, 400 for malformed or mismatched JSON.
impl From<BindError> for HttpError {
    fn from(e: BindError) -> Self {
        let status = match e {
            BindError::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BindError::Json(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, e.to_string())
    }
}

// ── RouterError ───────────────────────────────────────────────────────────────

/// Registration-time routing errors. These abort startup — a route table
/// with conflicts must never begin serving.
#[derive(Debug)]
pub enum RouterError {
    /// The (method, pattern) pair is already registered.
    Duplicate { method: Method, pattern: String },
    /// The pattern overlaps an existing one: some concrete path would match
    /// both. Ambiguity is rejected here rather than resolved by priority at
    /// request time.
    Ambiguous { method: Method, pattern: String, existing: String },
    /// The pattern itself is malformed (e.g. an unnamed `:` segment).
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { method, pattern } => {
                write!(f, "duplicate route {method} {pattern}")
            }
            Self::Ambiguous { method, pattern, existing } => {
                write!(f, "route {method} {pattern} overlaps {existing}")
            }
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid pattern `{pattern}`: {reason}")
            }
        }
    }
}

impl std::error::Error for RouterError {}

// ── ResolveError ──────────────────────────────────────────────────────────────

/// Why a request failed to resolve to a route. Translated to a response
/// before any middleware runs.
#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// No pattern matches the path under any method.
    NotFound,
    /// The path matches a pattern registered under a different method.
    MethodNotAllowed,
}

impl From<ResolveError> for HttpError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound => Self::new(StatusCode::NOT_FOUND, "Not Found"),
            ResolveError::MethodNotAllowed => {
                Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
            }
        }
    }
}

// ── Error ─────────────────────────────────────────────────────────────────────

/// The error type returned by reverb's serve path.
///
/// Application-level errors (404, 422, etc.) are expressed as [`HttpError`]
/// values, not as `Error`s. This type surfaces infrastructure failures:
/// binding to a port or accepting a connection.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}
