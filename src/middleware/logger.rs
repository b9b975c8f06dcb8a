//! Request logging.

use std::sync::Arc;

use tracing::info;

use super::Middleware;
use crate::handler::{handler_fn, BoxedHandler};

/// Logs each request on entry and on completion, with the status recorded in
/// the [`Context`](crate::Context), its wall-clock start time and the
/// elapsed time.
///
/// Requests that never wrote a status log `status=0`.
pub fn logger() -> Arc<dyn Middleware> {
    Arc::new(|next: BoxedHandler| -> BoxedHandler {
        Arc::new(handler_fn(move |ctx, w, req| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                let method = req.method().clone();
                let path = req.path().to_owned();
                info!(trace_id = %ctx.trace_id(), %method, %path, "request started");

                let result = next.call(ctx, w, req).await;

                info!(
                    trace_id = %ctx.trace_id(),
                    %method,
                    %path,
                    status = ctx.status().map_or(0, |s| s.as_u16()),
                    started_at = %ctx.started_at().to_rfc3339(),
                    elapsed_ms = ctx.elapsed().as_secs_f64() * 1000.0,
                    "request completed"
                );
                result
            })
        }))
    })
}
