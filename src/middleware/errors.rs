//! Error rendering.

use std::sync::Arc;

use tracing::error;

use super::Middleware;
use crate::handler::{handler_fn, BoxedHandler};
use crate::response::respond_error;

/// Writes any error from the inner chain back to the client.
///
/// The error is logged with the trace id and answered with
/// [`respond_error`], unless the handler already wrote a response. It is then
/// swallowed, except for shutdown requests, which always continue outward so
/// the dispatcher can act on them. A failure to write the error response is
/// logged; it never replaces a shutdown request.
pub fn errors() -> Arc<dyn Middleware> {
    Arc::new(|next: BoxedHandler| -> BoxedHandler {
        Arc::new(handler_fn(move |ctx, w, req| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                let Err(err) = next.call(ctx, w, req).await else {
                    return Ok(());
                };

                error!(trace_id = %ctx.trace_id(), error = %err, "request failed");

                let written = if w.is_written() { Ok(()) } else { respond_error(ctx, w, &err) };

                if err.is_shutdown() {
                    if let Err(e) = written {
                        error!(trace_id = %ctx.trace_id(), error = %e, "writing error response");
                    }
                    return Err(err);
                }
                written
            })
        }))
    })
}
