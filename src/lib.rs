//! # astor-web
//!
//! A small HTTP request-dispatch pipeline for JSON services behind a reverse
//! proxy.
//!
//! ## What it does
//!
//! - **Routing**: radix-tree lookup per method via [`matchit`]
//! - **Tracing**: every request gets a [`Context`] with a W3C trace id
//! - **Middleware**: handler-to-handler transformations, composed in a
//!   documented order ([`middleware::wrap_middleware`])
//! - **Decoding**: strict JSON plus field validation ([`decode`], [`validate`])
//! - **Errors**: one closed [`Error`] type mapped deterministically to JSON
//!   responses ([`respond_error`])
//! - **Graceful shutdown**: SIGTERM / Ctrl-C, or a [`Shutdown`] error returned
//!   by any handler, drains in-flight requests
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use astor_web::{
//!     decode, handler::BoxFuture, middleware, respond, shutdown, Context, Error,
//!     Request, RequestError, ResponseWriter, Router, Server, ServerConfig,
//! };
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let (shutdown, listener) = shutdown::channel();
//!
//!     let app = Router::new(shutdown, vec![middleware::logger(), middleware::errors()])
//!         .on(Method::GET, "/users/{id}", get_user);
//!
//!     Server::new(ServerConfig::from_env()).serve(app, listener).await
//! }
//!
//! fn get_user<'a>(
//!     ctx: &'a mut Context,
//!     w: &'a mut ResponseWriter,
//!     req: Request,
//! ) -> BoxFuture<'a, Result<(), Error>> {
//!     Box::pin(async move {
//!         match req.param("id") {
//!             Some("42") => respond(ctx, w, &serde_json::json!({ "id": 42 }), StatusCode::OK),
//!             _ => Err(RequestError::new("not found", StatusCode::NOT_FOUND).into()),
//!         }
//!     })
//! }
//! ```

mod config;
mod context;
mod decode;
mod error;
mod request;
mod response;
mod router;
mod server;

pub mod handler;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod shutdown;
pub mod trace;
pub mod validate;

pub use config::ServerConfig;
pub use context::Context;
pub use decode::{DecodeError, decode};
pub use error::{BoxError, Error, ErrorKind, FieldError, RequestError, Shutdown};
pub use handler::{BoxedHandler, Handler, handler_fn};
pub use middleware::Middleware;
pub use request::Request;
pub use response::{BodyNotAllowed, ErrorResponse, ResponseWriter, respond, respond_error};
pub use router::Router;
pub use server::Server;
pub use validate::{Validate, Validator};
