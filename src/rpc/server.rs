//! RPC server loop
//!
//! Connections are accepted and served strictly one after another: read
//! once, dispatch (or answer from cache), write once, close. A slow remote
//! solver call therefore delays every request queued behind it.

use super::protocol::{RpcRequest, RpcResponse, MAX_REQUEST_BYTES};
use crate::dispatch::Dispatcher;
use crate::error::{MathRpcError, Result};
use crate::storage::CacheStore;
use crate::types::OpValue;
use crate::utils::string::truncate_at_char_boundary;
use std::future::Future;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Connections that produced a response
    pub requests: u64,
    /// Responses served from the cache
    pub cache_hits: u64,
    /// Responses for unparseable or oversized payloads
    pub protocol_errors: u64,
    /// Cache writes that failed
    pub persist_failures: u64,
}

pub struct RpcServer<C: CacheStore> {
    dispatcher: Dispatcher,
    cache: C,
    stats: ServerStats,
}

impl<C: CacheStore> RpcServer<C> {
    pub fn new(dispatcher: Dispatcher, cache: C) -> Self {
        Self {
            dispatcher,
            cache,
            stats: ServerStats::default(),
        }
    }

    /// Bind the listening socket. The only failure that should stop the process.
    pub async fn bind(addr: &str) -> Result<TcpListener> {
        TcpListener::bind(addr).await.map_err(|e| {
            MathRpcError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind {}: {}", addr, e),
            ))
        })
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Serve until the process is interrupted (Ctrl-C)
    pub async fn serve(&mut self, listener: TcpListener) -> Result<ServerStats> {
        self.serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves. The connection in progress is finished first.
    pub async fn serve_with_shutdown<F>(
        &mut self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<ServerStats>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("RPC server listening on {}", local_addr);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping RPC server");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Connection from {}", peer);
                        if let Err(e) = self.handle_connection(stream).await {
                            warn!("Connection from {} failed: {}", peer, e);
                        }
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }

        info!(
            "RPC server stopped: {} requests, {} from cache, {} protocol errors",
            self.stats.requests, self.stats.cache_hits, self.stats.protocol_errors
        );
        Ok(self.stats)
    }

    async fn handle_connection(&mut self, mut stream: TcpStream) -> Result<()> {
        // One byte over the limit tells an exactly-full request from a truncated one.
        let mut buf = vec![0u8; MAX_REQUEST_BYTES + 1];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("Client closed without sending a request");
            return Ok(());
        }

        let response = if n > MAX_REQUEST_BYTES {
            warn!("Rejecting request larger than {} bytes", MAX_REQUEST_BYTES);
            self.stats.protocol_errors += 1;
            RpcResponse::error(format!("requisição excede {} bytes", MAX_REQUEST_BYTES))
        } else {
            match RpcRequest::from_bytes(&buf[..n]) {
                Ok(request) => RpcResponse::new(self.respond(request).await),
                Err(e) => {
                    warn!("Malformed request: {}", e);
                    self.stats.protocol_errors += 1;
                    match e {
                        MathRpcError::Protocol(msg) => RpcResponse::error(msg),
                        other => RpcResponse::error(other),
                    }
                }
            }
        };

        stream.write_all(&response.to_bytes()?).await?;
        stream.shutdown().await?;
        self.stats.requests += 1;
        Ok(())
    }

    async fn respond(&mut self, request: RpcRequest) -> OpValue {
        let key = request.cache_key();

        if let Some(cached) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            debug!("[cache] {}", key);
            return cached;
        }

        let result = self
            .dispatcher
            .execute(&request.operation, &request.args)
            .await;

        self.cache.put(key.clone(), result.clone());
        if let Err(e) = self.cache.persist().await {
            self.stats.persist_failures += 1;
            error!("Failed to persist cache after {}: {}", key, e);
        }

        info!(
            "[executed] {} -> {}",
            key,
            truncate_at_char_boundary(&result.to_string(), 50)
        );
        result
    }
}
