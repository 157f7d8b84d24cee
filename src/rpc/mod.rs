//! TCP request/response layer

pub mod client;
pub mod protocol;
pub mod server;

pub use client::RpcClient;
pub use protocol::{RpcRequest, RpcResponse, MAX_REQUEST_BYTES};
pub use server::{RpcServer, ServerStats};
