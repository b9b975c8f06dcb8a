//! Radix-tree router and per-request dispatch.
//!
//! One tree per HTTP method, O(path-length) lookup via [`matchit`]. Each
//! registered handler is wrapped in its per-route middleware and then in the
//! router's chain-wide middleware once, at registration. Request time only
//! reads the table.
//!
//! # Per-request bridge
//!
//! 1. Open a `request` span, joined to the caller's W3C trace when present.
//! 2. Create a fresh [`Context`] for the trace.
//! 3. Read the body and call the composed handler.
//! 4. On error: log it once with the trace id, answer the client if nothing
//!    was written yet, and trigger shutdown if it is a [`Shutdown`](crate::Shutdown).
//! 5. On success: nothing more; the handler already responded.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use matchit::Router as MatchitRouter;
use tracing::{Instrument, error, info_span, warn};

use crate::context::Context;
use crate::error::{BoxError, Error, RequestError};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Middleware, wrap_middleware};
use crate::request::Request;
use crate::response::{ErrorResponse, ResponseWriter, respond, respond_error};
use crate::shutdown::ShutdownHandle;
use crate::trace::{TRACEPARENT, TraceParent};
use crate::validate::Validator;

/// The application router.
///
/// Build it once at startup; hand it to [`Server::serve`](crate::Server::serve).
/// Each [`Router::on`] / [`Router::route`] call returns `self` so
/// registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    middleware: Vec<Arc<dyn Middleware>>,
    validator: Arc<Validator>,
    shutdown: ShutdownHandle,
}

enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Router {
    /// A router that wraps every route in `middleware` (first entry outermost)
    /// and reports shutdown requests to `shutdown`.
    pub fn new(shutdown: ShutdownHandle, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            routes: HashMap::new(),
            middleware,
            validator: Arc::new(Validator::new()),
            shutdown,
        }
    }

    /// Replaces the validator handed to every request.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics on an invalid or conflicting pattern. Routes are registered at
    /// startup, so this surfaces before the first request.
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.route(method, pattern, handler, Vec::new())
    }

    /// Like [`on`](Self::on), with middleware that applies to this route only.
    /// It runs inside the router's chain-wide middleware.
    pub fn route(
        mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        let handler = wrap_middleware(&middleware, Arc::new(handler));
        let handler = wrap_middleware(&self.middleware, handler);

        self.routes
            .entry(method)
            .or_default()
            .insert(pattern, handler)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
        self
    }

    /// Requests graceful termination of the serving process.
    pub fn signal_shutdown(&self) {
        warn!("error returned from handler indicated integrity issue, shutting down service");
        self.shutdown.trigger();
    }

    /// The single entry point for the transport: one request in, one
    /// response out. Never fails; every error is answered.
    pub async fn serve_http<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let trace = TraceParent::from_headers(req.headers());
        let span = info_span!(
            "request",
            trace_id = %trace.trace_id(),
            method = %req.method(),
            path = %req.uri().path()
        );
        self.dispatch(trace, req).instrument(span).await
    }

    async fn dispatch<B>(&self, trace: TraceParent, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let mut ctx = Context::new(trace);
        let mut w = ResponseWriter::new();
        let (parts, body) = req.into_parts();

        match self.lookup(&parts.method, parts.uri.path()) {
            Lookup::Found(handler, params) => {
                let result = match body.collect().await {
                    Ok(collected) => {
                        let req = Request::from_parts(
                            parts,
                            collected.to_bytes(),
                            params,
                            Arc::clone(&self.validator),
                        );
                        handler.call(&mut ctx, &mut w, req).await
                    }
                    Err(e) => Err(Error::from(RequestError::new(e, StatusCode::BAD_REQUEST))
                        .context("reading request body")),
                };
                if let Err(err) = result {
                    self.handle_error(&mut ctx, &mut w, err);
                }
            }
            Lookup::MethodNotAllowed(allowed) => {
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    w.headers_mut().insert(ALLOW, value);
                }
                self.respond_status(&mut ctx, &mut w, StatusCode::METHOD_NOT_ALLOWED);
            }
            Lookup::NotFound => self.respond_status(&mut ctx, &mut w, StatusCode::NOT_FOUND),
        }

        let mut res = w.into_response();
        if let Ok(value) = HeaderValue::from_str(&ctx.trace().to_string()) {
            res.headers_mut().insert(TRACEPARENT, value);
        }
        res
    }

    fn handle_error(&self, ctx: &mut Context, w: &mut ResponseWriter, err: Error) {
        error!(trace_id = %ctx.trace_id(), error = %err, "unhandled error");

        if !w.is_written() {
            if let Err(e) = respond_error(ctx, w, &err) {
                error!(trace_id = %ctx.trace_id(), error = %e, "writing error response");
            }
        }

        if err.is_shutdown() {
            self.signal_shutdown();
        }
    }

    fn respond_status(&self, ctx: &mut Context, w: &mut ResponseWriter, status: StatusCode) {
        if let Err(e) = respond(ctx, w, &ErrorResponse::from_status(status), status) {
            error!(trace_id = %ctx.trace_id(), error = %e, "writing response");
        }
    }

    fn lookup(&self, method: &Method, path: &str) -> Lookup {
        if let Some(matched) = self.routes.get(method).and_then(|tree| tree.at(path).ok()) {
            let handler = Arc::clone(matched.value);
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Lookup::Found(handler, params);
        }

        let mut allowed: Vec<Method> = self
            .routes
            .iter()
            .filter(|(m, tree)| *m != method && tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();

        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            Lookup::MethodNotAllowed(allowed)
        }
    }
}
