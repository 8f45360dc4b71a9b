//! Receiving endpoint for webhook mode.
//!
//! Accepts connections on the configured port, optionally behind TLS, and
//! serves the webhook router on each one. Stopping closes the listener, asks
//! every open connection to finish gracefully, then waits for them.

mod routes;
mod tls;

use std::io;
use std::net::SocketAddr;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use routes::webhook_router;
#[cfg(test)]
pub use routes::SECRET_TOKEN_HEADER;
pub use tls::Transport;

/// An HTTP(S) listener bound to a router. Owned by one webhook dispatcher.
pub struct Endpoint {
    router: Router,
    transport: Transport,
    addr: SocketAddr,
}

impl Endpoint {
    /// Listen on all interfaces at `port`.
    pub fn new(router: Router, transport: Transport, port: u16) -> Self {
        Self {
            router,
            transport,
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }

    /// Accept connections until `stop` is cancelled, then drain open ones.
    pub async fn serve(self, stop: CancellationToken) -> io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        let scheme = if self.transport.is_tls() { "https" } else { "http" };
        info!("Receiving endpoint listening on {}://{}", scheme, self.addr);

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(handle_connection(
                            stream,
                            peer,
                            self.transport.clone(),
                            self.router.clone(),
                            stop.clone(),
                        ));
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        debug!(open = connections.len(), "Draining connections");
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    transport: Transport,
    router: Router,
    stop: CancellationToken,
) {
    match transport {
        Transport::Plain => serve_connection(stream, router, stop).await,
        Transport::Tls(acceptor) => {
            let handshake = tokio::select! {
                _ = stop.cancelled() => return,
                handshake = acceptor.accept(stream) => handshake,
            };
            match handshake {
                Ok(tls) => serve_connection(tls, router, stop).await,
                Err(e) => debug!(%peer, "TLS handshake failed: {}", e),
            }
        }
    }
}

async fn serve_connection<I>(io: I, router: Router, stop: CancellationToken)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(io), TowerToHyperService::new(router));
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Connection error: {}", e);
            }
            return;
        }
        _ = stop.cancelled() => conn.as_mut().graceful_shutdown(),
    }

    if let Err(e) = conn.await {
        debug!("Connection error during shutdown: {}", e);
    }
}
