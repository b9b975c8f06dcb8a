//! Writing responses: the buffered [`ResponseWriter`], [`respond`] for
//! success values, and [`respond_error`] for anything a handler returns.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::context::Context;
use crate::error::{Error, ErrorKind, FieldError};

const JSON_UTF8: &str = "application/json; charset=utf-8";

// ── ErrorResponse ─────────────────────────────────────────────────────────────

/// The JSON body clients receive when something goes wrong.
///
/// ```json
/// { "error": "field validation error",
///   "fields": [ { "field": "email", "error": "email is a required field" } ] }
/// ```
///
/// `fields` is omitted when empty.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ErrorResponse {
    /// An envelope holding only the canonical reason phrase for `status`.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Unknown Status").to_owned(),
            fields: Vec::new(),
        }
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// Returned when a body is written after a status that forbids one.
#[derive(Debug, Error)]
#[error("response status {0} does not allow a body")]
pub struct BodyNotAllowed(pub StatusCode);

/// Collects the status line, headers and body of one response.
///
/// The first [`write_header`](Self::write_header) wins; later calls are
/// ignored with a warning. [`write`](Self::write) sends `200 OK` first if no
/// status was written yet. Header changes after the status is written are
/// ignored, as they would be on the wire.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    sent_headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers to send with the status line.
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    /// The status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> { self.status }

    pub fn is_written(&self) -> bool { self.status.is_some() }

    pub fn write_header(&mut self, status: StatusCode) {
        if let Some(sent) = self.status {
            warn!(%sent, ignored = %status, "superfluous write_header call");
            return;
        }
        self.status = Some(status);
        self.sent_headers = std::mem::take(&mut self.headers);
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, BodyNotAllowed> {
        let status = match self.status {
            Some(s) => s,
            None => {
                self.write_header(StatusCode::OK);
                StatusCode::OK
            }
        };
        if !body_allowed(status) {
            return Err(BodyNotAllowed(status));
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    pub(crate) fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = if self.status.is_some() { self.sent_headers } else { self.headers };
        res
    }
}

fn body_allowed(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

// ── respond / respond_error ───────────────────────────────────────────────────

/// Serialises `value` as JSON and writes it with `status`.
///
/// The status is recorded on `ctx` first. `204 No Content` writes only the
/// status line and never serialises `value`. A serialisation failure writes
/// nothing.
pub fn respond<T>(
    ctx: &mut Context,
    writer: &mut ResponseWriter,
    value: &T,
    status: StatusCode,
) -> Result<(), Error>
where
    T: Serialize + ?Sized,
{
    ctx.set_status(status);

    if status == StatusCode::NO_CONTENT {
        writer.write_header(status);
        return Ok(());
    }

    let data = serde_json::to_vec(value)
        .map_err(|e| Error::from(e).context("marshalling value to json"))?;

    writer.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
    writer.write_header(status);
    writer
        .write(&data)
        .map_err(|e| Error::other(e).context("writing to client"))?;
    Ok(())
}

/// Answers the client for an error returned by a handler.
///
/// A [`RequestError`](crate::RequestError) anywhere in the chain is sent with
/// its own status, message and fields. Anything else, shutdown requests
/// included, becomes `500` with the generic reason phrase; its text is never
/// sent to the client.
pub fn respond_error(ctx: &mut Context, writer: &mut ResponseWriter, err: &Error) -> Result<(), Error> {
    match err.kind() {
        ErrorKind::Request(e) => {
            let body = ErrorResponse { error: e.to_string(), fields: e.fields().to_vec() };
            respond(ctx, writer, &body, e.status())
        }
        ErrorKind::Shutdown(_) | ErrorKind::Opaque => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            respond(ctx, writer, &ErrorResponse::from_status(status), status)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use http_body_util::BodyExt;

    use super::*;
    use crate::error::{RequestError, Shutdown};

    async fn body_of(w: ResponseWriter) -> (StatusCode, HeaderMap, String) {
        let res = w.into_response();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn respond_writes_json_and_records_status() {
        let mut ctx = Context::default();
        let mut w = ResponseWriter::new();
        let mut user = BTreeMap::new();
        user.insert("id", "42");
        respond(&mut ctx, &mut w, &user, StatusCode::CREATED).unwrap();

        assert_eq!(ctx.status(), Some(StatusCode::CREATED));
        let (status, headers, body) = body_of(w).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers[CONTENT_TYPE], JSON_UTF8);
        assert_eq!(body, r#"{"id":"42"}"#);
    }

    #[tokio::test]
    async fn no_content_has_empty_body_even_with_payload() {
        let mut ctx = Context::default();
        let mut w = ResponseWriter::new();
        respond(&mut ctx, &mut w, &vec![1, 2, 3], StatusCode::NO_CONTENT).unwrap();

        assert_eq!(ctx.status(), Some(StatusCode::NO_CONTENT));
        let (status, headers, body) = body_of(w).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(headers.get(CONTENT_TYPE).is_none());
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn request_error_without_fields_omits_fields_key() {
        let mut ctx = Context::default();
        let mut w = ResponseWriter::new();
        let err = Error::from(RequestError::new("not found", StatusCode::NOT_FOUND));
        respond_error(&mut ctx, &mut w, &err).unwrap();

        let (status, _, body) = body_of(w).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"not found"}"#);
    }

    #[tokio::test]
    async fn validation_error_lists_fields() {
        let mut ctx = Context::default();
        let mut w = ResponseWriter::new();
        let err = Error::from(RequestError::validation(vec![
            FieldError::new("email", "email is a required field"),
        ]));
        respond_error(&mut ctx, &mut w, &err.context("create user")).unwrap();

        let (status, _, body) = body_of(w).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            r#"{"error":"field validation error","fields":[{"field":"email","error":"email is a required field"}]}"#
        );
    }

    #[tokio::test]
    async fn opaque_and_shutdown_errors_never_leak() {
        for err in [
            Error::other("db password is hunter2"),
            Error::from(Shutdown::new("ledger mismatch")),
        ] {
            let mut ctx = Context::default();
            let mut w = ResponseWriter::new();
            respond_error(&mut ctx, &mut w, &err).unwrap();

            let (status, _, body) = body_of(w).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, r#"{"error":"Internal Server Error"}"#);
            assert_eq!(ctx.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        }
    }

    #[test]
    fn first_write_header_wins() {
        let mut w = ResponseWriter::new();
        w.write_header(StatusCode::ACCEPTED);
        w.write_header(StatusCode::BAD_GATEWAY);
        assert_eq!(w.status(), Some(StatusCode::ACCEPTED));
    }

    #[test]
    fn write_implies_ok_and_rejects_body_after_no_content() {
        let mut w = ResponseWriter::new();
        assert_eq!(w.write(b"hi").unwrap(), 2);
        assert_eq!(w.status(), Some(StatusCode::OK));

        let mut w = ResponseWriter::new();
        w.write_header(StatusCode::NO_CONTENT);
        assert!(w.write(b"x").is_err());
    }

    #[test]
    fn headers_after_status_are_not_sent() {
        let mut w = ResponseWriter::new();
        w.headers_mut().insert("x-before", HeaderValue::from_static("1"));
        w.write_header(StatusCode::OK);
        w.headers_mut().insert("x-after", HeaderValue::from_static("1"));
        let res = w.into_response();
        assert!(res.headers().contains_key("x-before"));
        assert!(!res.headers().contains_key("x-after"));
    }
}
