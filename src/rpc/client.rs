//! RPC client stub
//!
//! Opens one connection per call. Results are memoized for the lifetime of
//! the client in an unbounded in-memory store that is never shared with the
//! server's persistent cache.

use super::protocol::{RpcRequest, RpcResponse};
use crate::dispatch::Operation;
use crate::error::{MathRpcError, Result};
use crate::storage::{CacheStore, MemoryCacheStore};
use crate::types::{Arg, OpValue};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub struct RpcClient {
    addr: String,
    timeout: Duration,
    cache: MemoryCacheStore,
}

impl RpcClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            cache: MemoryCacheStore::new(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of memoized results
    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Invoke `operation` remotely, or return the memoized result
    pub async fn call(&mut self, operation: &str, args: Vec<Arg>) -> Result<OpValue> {
        let request = RpcRequest::new(operation, args);
        let key = request.cache_key();

        if let Some(cached) = self.cache.get(&key) {
            debug!("Client cache hit for {}", key);
            return Ok(cached);
        }

        let result = self.send(&request).await?;
        self.cache.put(key, result.clone());
        Ok(result)
    }

    async fn send(&self, request: &RpcRequest) -> Result<OpValue> {
        let mut stream = match timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(MathRpcError::ServerNotFound(format!("{}: {}", self.addr, e))),
            Err(_) => {
                return Err(MathRpcError::ServerNotFound(format!(
                    "{}: connect timed out",
                    self.addr
                )))
            }
        };

        stream.write_all(&request.to_bytes()?).await?;

        let mut buf = Vec::new();
        match timeout(self.timeout, stream.read_to_end(&mut buf)).await {
            Ok(read) => {
                read?;
            }
            Err(_) => {
                return Err(MathRpcError::ServerNotFound(format!(
                    "{}: no response within {:?}",
                    self.addr, self.timeout
                )))
            }
        }

        if buf.is_empty() {
            return Err(MathRpcError::Protocol("servidor fechou sem resposta".to_string()));
        }

        Ok(RpcResponse::from_bytes(&buf)?.result)
    }

    async fn call_op(&mut self, op: Operation, args: Vec<Arg>) -> Result<OpValue> {
        self.call(op.name(), args).await
    }

    pub async fn sum(&mut self, values: &[f64]) -> Result<OpValue> {
        self.call_op(Operation::Sum, numbers(values)).await
    }

    pub async fn subtract(&mut self, values: &[f64]) -> Result<OpValue> {
        self.call_op(Operation::Subtract, numbers(values)).await
    }

    pub async fn product(&mut self, values: &[f64]) -> Result<OpValue> {
        self.call_op(Operation::Product, numbers(values)).await
    }

    pub async fn divide(&mut self, values: &[f64]) -> Result<OpValue> {
        self.call_op(Operation::Divide, numbers(values)).await
    }

    pub async fn factorial(&mut self, n: f64) -> Result<OpValue> {
        self.call_op(Operation::Factorial, vec![Arg::Number(n)]).await
    }

    pub async fn power(&mut self, base: f64, exponent: f64) -> Result<OpValue> {
        self.call_op(Operation::Power, vec![Arg::Number(base), Arg::Number(exponent)])
            .await
    }

    pub async fn square_root(&mut self, n: f64) -> Result<OpValue> {
        self.call_op(Operation::SquareRoot, vec![Arg::Number(n)]).await
    }

    pub async fn latest_news(&mut self, count: Option<usize>) -> Result<OpValue> {
        let args = count.map(|c| vec![Arg::Number(c as f64)]).unwrap_or_default();
        self.call_op(Operation::LatestNews, args).await
    }

    pub async fn solve_problem(&mut self, problem: &str) -> Result<OpValue> {
        self.call_op(Operation::SolveProblem, vec![Arg::Text(problem.to_string())])
            .await
    }
}

fn numbers(values: &[f64]) -> Vec<Arg> {
    values.iter().map(|v| Arg::Number(*v)).collect()
}
