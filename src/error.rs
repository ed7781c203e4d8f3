//! Error taxonomy for the ingestion loop.
//!
//! Errors are split by the boundary they are allowed to reach:
//!
//! | Type | Level | Effect |
//! |------|-------|--------|
//! | [`ConfigError`] | startup | process refuses to start polling |
//! | [`FetchError`] | cycle | cycle aborted, loop backs off |
//! | [`Rejection`] | item | item dropped, cycle continues |
//! | [`PublishError`] | item | record dropped, cycle continues |
//! | [`CycleError`] | cycle | wraps fetch failures and anything unexpected |

use std::fmt;
use thiserror::Error;

/// Invalid or missing startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Failure of the single upstream request made by one cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Upstream answered 2xx but flagged the request as failed in its body.
    #[error("upstream reported error `{code}`: {message}")]
    Api { code: String, message: String },

    #[error("response body is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("unexpected response shape: {0}")]
    Shape(String),
}

/// Failure of one stream write.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stream throttled the write: {0}")]
    Throttled(String),

    #[error("stream write failed: {0}")]
    Stream(String),

    #[error("stream file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure that aborts a whole cycle and moves the loop into backoff.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unexpected failure while processing items: {0}")]
    Unexpected(String),
}

/// Shape of a JSON value, used to describe type mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    /// A string or number that can be read as a point in time.
    Timestamp,
}

impl JsonKind {
    pub fn of(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Bool,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonKind::Null => "null",
            JsonKind::Bool => "boolean",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
            JsonKind::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Why a raw item could not become a [`Record`](crate::models::Record).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("field `{field}` expected {expected}, got {received}")]
    WrongType {
        field: &'static str,
        expected: JsonKind,
        received: JsonKind,
    },

    #[error("field `{field}` is not a valid timestamp: {value:?}")]
    MalformedTimestamp { field: &'static str, value: String },
}

impl Rejection {
    /// Name of the offending field (dotted for nested fields).
    pub fn field(&self) -> &'static str {
        match self {
            Rejection::WrongType { field, .. } | Rejection::MalformedTimestamp { field, .. } => {
                field
            }
        }
    }
}
