//! Error taxonomy shared by handlers, the decoder, and the dispatcher.
//!
//! Every handler returns `Result<(), Error>`. An [`Error`] always resolves to
//! exactly one [`ErrorKind`]:
//!
//! | Kind | Produced by | Client sees |
//! |---|---|---|
//! | [`ErrorKind::Request`]  | [`RequestError::new`], [`RequestError::validation`], the decoder | its own status + message |
//! | [`ErrorKind::Shutdown`] | [`Shutdown::new`] | `500`, never the message |
//! | [`ErrorKind::Opaque`]   | anything else (`?` on io / serde errors, …) | `500 Internal Server Error` |
//!
//! Errors may be wrapped with [`Error::context`] any number of times. The
//! kind is found by unwrapping the whole causal chain, so a shutdown request
//! buried under three layers of context is still a shutdown request.

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// A boxed, thread-safe error used as the cause of request and opaque errors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ── FieldError ────────────────────────────────────────────────────────────────

/// One constraint violation tied to one input field, by wire name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self { field: field.into(), error: error.into() }
    }
}

// ── RequestError ──────────────────────────────────────────────────────────────

/// A failure the handler has classified: it carries the status code the
/// client should receive and, for validation failures, the offending fields.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct RequestError {
    cause: BoxError,
    status: StatusCode,
    fields: Vec<FieldError>,
}

impl RequestError {
    /// A single-cause failure, e.g. `RequestError::new("not found", StatusCode::NOT_FOUND)`.
    pub fn new(cause: impl Into<BoxError>, status: StatusCode) -> Self {
        Self { cause: cause.into(), status, fields: Vec::new() }
    }

    /// `400 Bad Request` with the generic cause `field validation error`.
    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self {
            cause: "field validation error".into(),
            status: StatusCode::BAD_REQUEST,
            fields,
        }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn fields(&self) -> &[FieldError] { &self.fields }
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) { self.cause.as_ref() }
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

/// Asks the process to terminate gracefully.
///
/// Recognised by kind, never by status code. The message goes to the server
/// log only; it is never serialised to a client.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Shutdown {
    message: String,
}

impl Shutdown {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str { &self.message }
}

// ── Error ─────────────────────────────────────────────────────────────────────

/// The error type returned by handlers and middleware.
#[derive(Debug)]
pub enum Error {
    /// Classified failure with an explicit status code.
    Request(RequestError),
    /// Graceful termination request.
    Shutdown(Shutdown),
    /// A message layered over an inner error.
    Context { message: String, source: Box<Error> },
    /// Anything unclassified. Always answered with `500`.
    Other(BoxError),
}

/// The classification of an [`Error`] after unwrapping every layer of context.
#[derive(Clone, Copy, Debug)]
pub enum ErrorKind<'a> {
    Request(&'a RequestError),
    Shutdown(&'a Shutdown),
    Opaque,
}

impl Error {
    /// Wraps any error as an opaque failure.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// Adds a message in front of this error. The kind is preserved.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context { message: message.into(), source: Box::new(self) }
    }

    /// Unwraps the causal chain and classifies the innermost error.
    ///
    /// Opaque errors are searched through their [`source`](StdError::source)
    /// chain as well, so a [`Shutdown`] or [`RequestError`] hidden inside a
    /// third-party wrapper is still found.
    pub fn kind(&self) -> ErrorKind<'_> {
        match self {
            Self::Request(e) => ErrorKind::Request(e),
            Self::Shutdown(s) => ErrorKind::Shutdown(s),
            Self::Context { source, .. } => source.kind(),
            Self::Other(e) => classify_chain(e.as_ref()),
        }
    }

    /// True when a [`Shutdown`] sits anywhere at the root of the chain.
    pub fn is_shutdown(&self) -> bool {
        matches!(self.kind(), ErrorKind::Shutdown(_))
    }
}

fn classify_chain<'a>(err: &'a (dyn StdError + 'static)) -> ErrorKind<'a> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(s) = e.downcast_ref::<Shutdown>() {
            return ErrorKind::Shutdown(s);
        }
        if let Some(r) = e.downcast_ref::<RequestError>() {
            return ErrorKind::Request(r);
        }
        if let Some(inner) = e.downcast_ref::<Error>() {
            return inner.kind();
        }
        current = e.source();
    }
    ErrorKind::Opaque
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => e.fmt(f),
            Self::Shutdown(s) => s.fmt(f),
            Self::Context { message, source } => write!(f, "{message}: {source}"),
            Self::Other(e) => e.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source.as_ref()),
            Self::Other(e) => e.source(),
            Self::Request(_) | Self::Shutdown(_) => None,
        }
    }
}

impl From<RequestError> for Error {
    fn from(e: RequestError) -> Self { Self::Request(e) }
}

impl From<Shutdown> for Error {
    fn from(s: Shutdown) -> Self { Self::Shutdown(s) }
}

impl From<BoxError> for Error {
    fn from(e: BoxError) -> Self { Self::Other(e) }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self { Self::Other(Box::new(e)) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self { Self::Other(Box::new(e)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("storage layer: {source}")]
    struct Storage {
        #[source]
        source: Shutdown,
    }

    #[test]
    fn request_error_keeps_status_and_message() {
        let err = RequestError::new("not found", StatusCode::NOT_FOUND);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "not found");
        assert!(err.fields().is_empty());
    }

    #[test]
    fn validation_error_is_bad_request() {
        let err = RequestError::validation(vec![FieldError::new("name", "name is a required field")]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "field validation error");
        assert_eq!(err.fields().len(), 1);
    }

    #[test]
    fn shutdown_detected_directly_and_through_context() {
        let err: Error = Shutdown::new("integrity check failed").into();
        assert!(err.is_shutdown());

        let wrapped = err.context("loading user").context("handler");
        assert!(wrapped.is_shutdown());
        assert_eq!(wrapped.to_string(), "handler: loading user: integrity check failed");
    }

    #[test]
    fn shutdown_detected_inside_foreign_source_chain() {
        let err = Error::other(Storage { source: Shutdown::new("disk gone") });
        assert!(err.is_shutdown());
    }

    #[test]
    fn only_shutdown_is_shutdown() {
        let request: Error = RequestError::new("bad", StatusCode::BAD_REQUEST).into();
        let opaque = Error::other("boom");
        let io: Error = std::io::Error::other("pipe").into();
        assert!(!request.is_shutdown());
        assert!(!opaque.is_shutdown());
        assert!(!io.is_shutdown());
        assert!(!request.context("ctx").is_shutdown());
    }

    #[test]
    fn classification_is_total() {
        let request: Error = RequestError::new("gone", StatusCode::GONE).into();
        assert!(matches!(request.kind(), ErrorKind::Request(e) if e.status() == StatusCode::GONE));

        let wrapped = Error::other(Error::from(RequestError::new("x", StatusCode::CONFLICT)));
        assert!(matches!(wrapped.kind(), ErrorKind::Request(e) if e.status() == StatusCode::CONFLICT));

        assert!(matches!(Error::other("boom").kind(), ErrorKind::Opaque));
    }
}
