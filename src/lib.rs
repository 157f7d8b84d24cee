//! MathRPC - Calculator RPC Server
//!
//! A small TCP service that evaluates arithmetic operations, fetches news
//! headlines and solves natural-language math problems, memoizing every
//! result in a size-bounded JSON cache file.
//!
//! # Architecture
//!
//! - **Types**: Argument and result values shared by every layer
//! - **Math**: Pure arithmetic with domain checks
//! - **Services**: Remote model client, two-tier problem solver, headline scraper
//! - **Dispatch**: Operation name to result, errors rendered as values
//! - **Storage**: Persistent and in-memory result caches
//! - **RPC**: Wire protocol, sequential server loop and client stub
//!
//! # Example
//!
//! ```ignore
//! use mathrpc_core::RpcClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> mathrpc_core::Result<()> {
//!     let mut client = RpcClient::new("127.0.0.1:5000", Duration::from_secs(10));
//!     let result = client.power(2.0, 10.0).await?;
//!     println!("{}", result); // 1024
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod math;
pub mod rpc;
pub mod services;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::ServerConfig;
pub use dispatch::{Dispatcher, Operation};
pub use error::{MathRpcError, Result};
pub use rpc::{RpcClient, RpcRequest, RpcResponse, RpcServer, ServerStats};
pub use services::{GeminiClient, NewsProvider, ProblemSolver, RemoteModel, UolNewsProvider};
pub use storage::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use types::{Arg, Headline, ListItem, OpValue};
