//! HTTP/1.1 server over a [`DocService`].
//!
//! Every accepted connection runs on its own task. A semaphore caps how many
//! connections are open at once; when it is exhausted the accept loop stops
//! accepting until a connection finishes. On shutdown the listener closes,
//! idle keep-alive connections are told to close, and in-flight requests get
//! `drain_timeout` to complete.

mod content_type;
mod handler;
mod path;

pub use content_type::content_type_for;
pub use handler::{DocService, Found, SERVER_NAME};
pub use path::{INDEX_PAGE, archive_key};

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    service: Arc<DocService>,
}

impl Server {
    /// Bind the listening socket. Nothing is accepted until [`Server::run`].
    pub async fn bind(config: ServerConfig, service: Arc<DocService>) -> Result<Self> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| Error::bind(addr, err))?;

        Ok(Self {
            listener,
            config,
            service,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn service(&self) -> &Arc<DocService> {
        &self.service
    }

    /// Serve until `shutdown` resolves, then drain open connections.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            listener,
            config,
            service,
        } = self;

        info!(addr = %listener.local_addr()?, "listening");

        let permits = Arc::new(Semaphore::new(config.max_connections.max(1)));
        let graceful = GracefulShutdown::new();
        let mut http = http1::Builder::new();
        http.timer(TokioTimer::new())
            .header_read_timeout(config.header_read_timeout)
            .keep_alive(true);

        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&permits).acquire_owned() => {
                    permit.context("connection limiter closed")?
                }
                () = &mut shutdown => break,
            };

            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                () = &mut shutdown => break,
            };
            debug!(%peer, "accepted connection");

            let conn_service = Arc::clone(&service);
            let conn = http.serve_connection(
                TokioIo::new(stream),
                service_fn(move |req| {
                    let service = Arc::clone(&conn_service);
                    async move { Ok::<_, Infallible>(service.handle(req).await) }
                }),
            );
            let conn = graceful.watch(conn);

            tokio::spawn(async move {
                if let Err(err) = conn.await {
                    debug!(%peer, error = %err, "connection closed with error");
                }
                drop(permit);
            });
        }

        drop(listener);
        info!("shutting down, draining open connections");

        tokio::select! {
            () = graceful.shutdown() => info!("all connections closed"),
            () = tokio::time::sleep(config.drain_timeout) => {
                warn!(
                    timeout = ?config.drain_timeout,
                    "drain timed out, abandoning open connections"
                );
            }
        }

        let stats = service.cache().stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            flushes = stats.flushes,
            fetches = service.archives().fetches(),
            "server stopped"
        );
        service.cache().clear();

        Ok(())
    }
}
