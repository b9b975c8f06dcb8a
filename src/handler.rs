//! Handler trait and type erasure.
//!
//! # The handler signature
//!
//! Every handler, and every handler a middleware produces, has the shape:
//!
//! ```text
//! for<'a> Fn(&'a mut Context, &'a mut ResponseWriter, Request) -> BoxFuture<'a, Result<(), Error>>
//! ```
//!
//! The context and writer are borrowed for the duration of the call, so the
//! dispatcher still owns them when the chain returns. That is how it can look
//! at the recorded status and turn the writer into the wire response without
//! any shared state.
//!
//! Named functions satisfy the signature directly:
//!
//! ```rust,ignore
//! fn get_user<'a>(
//!     ctx: &'a mut Context,
//!     w: &'a mut ResponseWriter,
//!     req: Request,
//! ) -> BoxFuture<'a, Result<(), Error>> {
//!     Box::pin(async move { respond(ctx, w, &user, StatusCode::OK) })
//! }
//! ```
//!
//! Closures need [`handler_fn`] so the compiler infers the higher-ranked
//! signature:
//!
//! ```rust,ignore
//! handler_fn(|ctx, w, req| Box::pin(get_user(ctx, w, req)))
//! ```
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! router.on(Method::GET, "/", hello)
//!        ↓
//! Arc::new(hello)                       ← stored as BoxedHandler = Arc<dyn Handler>
//!        ↓  wrapped by middleware, each producing another BoxedHandler
//! handler.call(&mut ctx, &mut w, req)   ← one virtual call per layer
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::request::Request;
use crate::response::ResponseWriter;

/// A heap-allocated, type-erased future borrowing the request's context.
///
/// `Send` lets tokio move the future across worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every handler resolves to.
pub type HandlerResult = Result<(), Error>;

/// A type-erased handler shared across concurrent requests.
///
/// `Arc` gives cheap, thread-safe shared ownership: the route table and every
/// middleware layer hold clones, never copies of the handler itself.
pub type BoxedHandler = Arc<dyn Handler>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the signature shown in the [module docs](self).
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        ctx: &'a mut Context,
        writer: &'a mut ResponseWriter,
        req: Request,
    ) -> BoxFuture<'a, HandlerResult>;
}

mod private {
    pub trait Sealed {}
}

impl<F> private::Sealed for F
where
    F: for<'a> Fn(&'a mut Context, &'a mut ResponseWriter, Request) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context, &'a mut ResponseWriter, Request) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut Context,
        writer: &'a mut ResponseWriter,
        req: Request,
    ) -> BoxFuture<'a, HandlerResult> {
        self(ctx, writer, req)
    }
}

/// Pins down the higher-ranked signature for a handler closure.
///
/// Returns the closure unchanged.
pub fn handler_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context, &'a mut ResponseWriter, Request) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    f
}
