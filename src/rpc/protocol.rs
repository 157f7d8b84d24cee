//! Wire protocol
//!
//! One JSON request per TCP connection, one JSON response back, then close.
//!
//! ```text
//! -> {"operacao": "potencia", "args": [2, 10]}
//! <- {"resultado": 1024}
//! ```
//!
//! `operation` is accepted as an alias of `operacao` and `result` as an alias
//! of `resultado`.

use crate::dispatch::ERROR_PREFIX;
use crate::error::{MathRpcError, Result};
use crate::types::{format_number, Arg, OpValue};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Largest request the server accepts in its single read
pub const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(rename = "operacao", alias = "operation")]
    pub operation: String,

    #[serde(default)]
    pub args: Vec<Arg>,
}

impl RpcRequest {
    pub fn new(operation: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MathRpcError::Protocol(format!("requisição inválida: {}", e)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Canonical identity of the request: `operation:[arg,...]`.
    ///
    /// Numbers use the wire rendering, so `1` and `1.0` share a key; texts are
    /// JSON-quoted so a text `"1"` never collides with the number `1`.
    pub fn cache_key(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Number(n) => format_number(*n),
                Arg::Text(s) => serde_json::Value::String(s.clone()).to_string(),
            })
            .collect();
        format!("{}:[{}]", self.operation, args.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(rename = "resultado", alias = "result")]
    pub result: OpValue,
}

impl RpcResponse {
    pub fn new(result: OpValue) -> Self {
        Self { result }
    }

    /// Error-tagged response: `{"resultado": "Erro: <message>"}`
    pub fn error(message: impl Display) -> Self {
        Self {
            result: OpValue::Text(format!("{}{}", ERROR_PREFIX, message)),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MathRpcError::Protocol(format!("resposta inválida: {}", e)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
