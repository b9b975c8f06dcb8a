//! Minimal astor-web example: JSON endpoints with validation, health checks,
//! and a handler that shuts the service down.
//!
//! Run with:
//!   LOG_FORMAT=text RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/1
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","email":"alice@example.com"}'
//!   curl -X POST http://localhost:3000/users -d '{"name":"","email":"x"}'
//!   curl -X POST http://localhost:3000/users -d '{"name":"a","email":"a@b.io","admin":true}'
//!   curl -X DELETE http://localhost:3000/users/1
//!   curl -X POST http://localhost:3000/admin/shutdown
//!   curl http://localhost:3000/healthz

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use astor_web::handler::BoxFuture;
use astor_web::logging::{LoggingConfig, init_logging};
use astor_web::validate::{Rules, ValidationError};
use astor_web::{
    Context, Error, Request, RequestError, ResponseWriter, Router, Server, ServerConfig, Shutdown,
    Validate, handler_fn, health, middleware, respond, shutdown,
};
use http::header::{HeaderValue, LOCATION};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
    email: String,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), ValidationError> {
        Rules::new()
            .required("name", &self.name)
            .max_len("name", &self.name, 64)
            .required("email", &self.email)
            .email("email", &self.email)
            .finish()
    }
}

type Store = Arc<Mutex<BTreeMap<u64, User>>>;

fn users(store: &Store) -> MutexGuard<'_, BTreeMap<u64, User>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging(&LoggingConfig::from_env())?;

    let store: Store = Arc::default();
    let (shutdown, listener) = shutdown::channel();

    let app = Router::new(
        shutdown,
        vec![middleware::logger(), middleware::errors(), middleware::panics()],
    )
    .on(Method::GET, "/users/{id}", {
        let store = Arc::clone(&store);
        handler_fn(move |ctx, w, req| {
            let store = Arc::clone(&store);
            Box::pin(async move { get_user(ctx, w, req, store).await })
        })
    })
    .on(Method::POST, "/users", {
        let store = Arc::clone(&store);
        handler_fn(move |ctx, w, req| {
            let store = Arc::clone(&store);
            Box::pin(async move { create_user(ctx, w, req, store).await })
        })
    })
    .on(Method::DELETE, "/users/{id}", {
        let store = Arc::clone(&store);
        handler_fn(move |ctx, w, req| {
            let store = Arc::clone(&store);
            Box::pin(async move { delete_user(ctx, w, req, store).await })
        })
    })
    .on(Method::POST, "/admin/shutdown", shutdown_service)
    .on(Method::GET, "/healthz", health::liveness)
    .on(Method::GET, "/readyz", health::readiness);

    Server::new(ServerConfig::from_env()).serve(app, listener).await
}

fn user_id(req: &Request) -> Result<u64, Error> {
    req.param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| RequestError::new("id must be a positive integer", StatusCode::BAD_REQUEST).into())
}

// GET /users/{id}
async fn get_user(ctx: &mut Context, w: &mut ResponseWriter, req: Request, store: Store) -> Result<(), Error> {
    let id = user_id(&req)?;
    let user = users(&store).get(&id).cloned();
    match user {
        Some(user) => respond(ctx, w, &user, StatusCode::OK),
        None => Err(RequestError::new(format!("user {id} not found"), StatusCode::NOT_FOUND).into()),
    }
}

// POST /users
async fn create_user(ctx: &mut Context, w: &mut ResponseWriter, req: Request, store: Store) -> Result<(), Error> {
    let input: NewUser = req.decode()?;
    let user = {
        let mut users = users(&store);
        let id = users.keys().next_back().map_or(1, |last| last + 1);
        let user = User { id, name: input.name, email: input.email };
        users.insert(id, user.clone());
        user
    };
    let location = HeaderValue::from_str(&format!("/users/{}", user.id)).map_err(Error::other)?;
    w.headers_mut().insert(LOCATION, location);
    respond(ctx, w, &user, StatusCode::CREATED)
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(ctx: &mut Context, w: &mut ResponseWriter, req: Request, store: Store) -> Result<(), Error> {
    let id = user_id(&req)?;
    users(&store).remove(&id);
    respond(ctx, w, &(), StatusCode::NO_CONTENT)
}

// POST /admin/shutdown → 500 to the caller, then the server drains and exits.
fn shutdown_service<'a>(_ctx: &'a mut Context, _w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move { Err(Shutdown::new("shutdown requested via admin endpoint").into()) })
}
