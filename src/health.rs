//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your router:
//!
//! ```rust,ignore
//! use astor_web::{health, Router};
//! use http::Method;
//!
//! let app = Router::new(shutdown, vec![])
//!     .on(Method::GET, "/healthz", health::liveness)
//!     .on(Method::GET, "/readyz", health::readiness);
//! ```

use http::StatusCode;
use serde::Serialize;

use crate::context::Context;
use crate::handler::{BoxFuture, HandlerResult};
use crate::request::Request;
use crate::response::{respond, ResponseWriter};

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

/// Always `200 {"status":"ok"}`. If the process can answer HTTP at all, it
/// is alive; this handler has no dependencies.
pub fn liveness<'a>(ctx: &'a mut Context, w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move { respond(ctx, w, &Health { status: "ok" }, StatusCode::OK) })
}

/// `200 {"status":"ready"}`. Replace it with your own handler if the service
/// must warm up or check dependencies before taking traffic.
pub fn readiness<'a>(ctx: &'a mut Context, w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move { respond(ctx, w, &Health { status: "ready" }, StatusCode::OK) })
}
