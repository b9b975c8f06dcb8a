//! Panic recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;

use super::Middleware;
use crate::error::Error;
use crate::handler::{handler_fn, BoxedHandler};

/// A panic caught in the handler chain.
#[derive(Debug, Error)]
#[error("panic: {0}")]
pub struct Panicked(pub String);

/// Converts a panic anywhere inside the chain into an opaque [`Error`].
///
/// Place it inside [`errors`](super::errors) so the client still receives a
/// `500`; the panic message only reaches the log.
pub fn panics() -> Arc<dyn Middleware> {
    Arc::new(|next: BoxedHandler| -> BoxedHandler {
        Arc::new(handler_fn(move |ctx, w, req| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                match AssertUnwindSafe(next.call(ctx, w, req)).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(Error::other(Panicked(panic_message(payload.as_ref())))),
                }
            })
        }))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
