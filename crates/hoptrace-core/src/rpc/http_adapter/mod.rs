//! Native JSON-RPC client for Bitcoin nodes with an address index.
//!
//! Implements [`BitcoinRpc`](super::BitcoinRpc) over JSON-RPC using
//! `reqwest`, with HTTP(S) transport, basic or cookie auth, optional rate
//! limiting, single and batched calls, per-request timeouts, and jittered
//! retries of transient failures.

mod client;
mod connection;
mod parsing;
mod protocol;
mod retry;

pub use client::{HttpRpcClient, RpcClientConfig};
pub use retry::RetryPolicy;
