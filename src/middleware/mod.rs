//! Middleware layer.
//!
//! A middleware is a pure transformation from one handler to another handler
//! with the same signature. It is the place for cross-cutting concerns:
//! structured logging, error rendering, panic recovery, authentication.
//!
//! # Ordering
//!
//! [`wrap_middleware`] folds a list **right to left**, so the *first* entry
//! ends up outermost:
//!
//! ```text
//! wrap_middleware(&[a, b], h)  ==  a(b(h))
//!
//! a before → b before → h → b after → a after
//! ```
//!
//! The router applies per-route middleware first and its chain-wide
//! middleware second, so chain-wide middleware always runs outside the
//! per-route list.
//!
//! # Writing one
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use astor_web::handler::{handler_fn, BoxedHandler};
//! use astor_web::middleware::Middleware;
//!
//! fn timing() -> Arc<dyn Middleware> {
//!     Arc::new(|next: BoxedHandler| -> BoxedHandler {
//!         Arc::new(handler_fn(move |ctx, w, req| {
//!             let next = Arc::clone(&next);
//!             Box::pin(async move {
//!                 let result = next.call(ctx, w, req).await;
//!                 tracing::debug!(elapsed = ?ctx.elapsed());
//!                 result
//!             })
//!         }))
//!     })
//! }
//! ```
//!
//! Built in:
//! - [`logger`]: per-request start / completion log with status and latency
//! - [`errors`]: renders handler errors to the client
//! - [`panics`]: turns a panic in the chain into an opaque error

use std::sync::Arc;

use crate::handler::BoxedHandler;

mod errors;
mod logger;
mod panics;

pub use errors::errors;
pub use logger::logger;
pub use panics::{Panicked, panics};

/// A transformation from one handler to another.
///
/// Implemented for every `Fn(BoxedHandler) -> BoxedHandler`. Any state the
/// middleware needs is captured when it is constructed.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// Wraps `handler` in `middleware`, first entry outermost.
pub fn wrap_middleware(middleware: &[Arc<dyn Middleware>], handler: BoxedHandler) -> BoxedHandler {
    middleware.iter().rev().fold(handler, |next, mw| mw.wrap(next))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::context::Context;
    use crate::handler::handler_fn;
    use crate::request::Request;
    use crate::response::{respond, ResponseWriter};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(name: &'static str, log: Log) -> Arc<dyn Middleware> {
        Arc::new(move |next: BoxedHandler| -> BoxedHandler {
            let log = Arc::clone(&log);
            Arc::new(handler_fn(move |ctx, w, req| {
                let next = Arc::clone(&next);
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().unwrap().push(format!("{name} before"));
                    let result = next.call(ctx, w, req).await;
                    log.lock().unwrap().push(format!("{name} after"));
                    result
                })
            }))
        })
    }

    fn terminal(log: Log) -> BoxedHandler {
        Arc::new(handler_fn(move |ctx, w, _req| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push("handler".to_owned());
                respond(ctx, w, "ok", StatusCode::OK)
            })
        }))
    }

    fn request() -> Request {
        Request::from(http::Request::get("/").body(String::new()).unwrap())
    }

    #[tokio::test]
    async fn first_listed_middleware_is_outermost() {
        let log: Log = Arc::default();
        let chain = wrap_middleware(
            &[recorder("a", Arc::clone(&log)), recorder("b", Arc::clone(&log))],
            terminal(Arc::clone(&log)),
        );

        let mut ctx = Context::default();
        let mut w = ResponseWriter::new();
        chain.call(&mut ctx, &mut w, request()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), ["a before", "b before", "handler", "b after", "a after"]);
        assert_eq!(ctx.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler() {
        let log: Log = Arc::default();
        let chain = wrap_middleware(&[], terminal(Arc::clone(&log)));

        let mut ctx = Context::default();
        let mut w = ResponseWriter::new();
        chain.call(&mut ctx, &mut w, request()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["handler"]);
    }
}
