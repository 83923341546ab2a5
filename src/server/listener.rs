use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::session::SessionRegistry;

use super::handler::handle_connection;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// TCP front door: one task per client connection, all sharing a registry.
pub struct TrackerServer {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
}

impl TrackerServer {
    pub async fn bind(addr: &str, registry: Arc<SessionRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to listen on {addr}"))?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Accepts clients until `shutdown` fires, then tears every session down.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        log_info!("tracker server listening on {}", self.local_addr()?);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log_info!("shutdown requested, closing {} session(s)", self.registry.len());
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(err) = stream.set_nodelay(true) {
                            log_warn!("[{}] failed to set TCP_NODELAY: {err}", peer);
                        }
                        let registry = Arc::clone(&self.registry);
                        connections.spawn(async move {
                            if let Err(err) = handle_connection(stream, peer.to_string(), registry).await {
                                log_warn!("[{}] connection ended with error: {err}", peer);
                            }
                        });
                    }
                    Err(err) => log_error!("accept failed: {err}"),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = joined {
                        log_error!("connection task failed: {err}");
                    }
                }
            }
        }

        self.registry.shutdown_all().await;
        connections.shutdown().await;
        Ok(())
    }
}
