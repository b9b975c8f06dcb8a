//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! The server stops on the first of:
//! - **SIGTERM** (sent by `kubectl` and the Kubernetes control plane),
//! - **SIGINT** (Ctrl-C, for local dev),
//! - a [`Shutdown`](crate::Shutdown) error reaching the router, which arrives
//!   through the [`ShutdownListener`].
//!
//! All three take the same path:
//! 1. Immediately stop `listener.accept()`; no new connections are made.
//! 2. Let every in-flight connection task run to completion, for at most
//!    [`ServerConfig::shutdown_timeout`].
//! 3. Abort whatever is still running and return from [`Server::serve`].
//!
//! Idle keep-alive connections count as in flight, so the timeout is what
//! bounds the drain in practice.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::router::Router;
use crate::shutdown::ShutdownListener;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { addr: config.addr, shutdown_timeout: config.shutdown_timeout }
    }

    /// A server on `addr` with the default drain timeout.
    pub fn bind(addr: SocketAddr) -> Self {
        Self::new(ServerConfig { addr, ..ServerConfig::default() })
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns after a full graceful shutdown. Fails only if the address
    /// cannot be bound.
    pub async fn serve(self, router: Router, mut shutdown: ShutdownListener) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| Error::from(e).context(format!("binding {}", self.addr)))?;

        // Shared, read-only routing table for every connection task.
        let router = Arc::new(router);

        info!(addr = %self.addr, "astor listening");

        let mut tasks = JoinSet::new();

        let os_signal = os_signal();
        tokio::pin!(os_signal);

        loop {
            tokio::select! {
                // Shutdown arms first so a pending request stops accepting
                // even if more connections are queued.
                biased;

                () = &mut os_signal => {
                    info!(in_flight = tasks.len(), "signal received, draining connections");
                    break;
                }

                () = shutdown.recv() => {
                    info!(in_flight = tasks.len(), "shutdown requested by handler, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { Ok::<_, Infallible>(router.serve_http(req).await) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap closed connections as they finish.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);

        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                remaining = tasks.len(),
                timeout_secs = self.shutdown_timeout.as_secs(),
                "drain timed out, aborting remaining connections"
            );
            tasks.shutdown().await;
        }

        info!("astor stopped");
        Ok(())
    }
}

/// Resolves on SIGTERM or Ctrl-C. A handler that cannot be installed is
/// logged and never fires.
async fn os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
