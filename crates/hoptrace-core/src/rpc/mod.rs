//! Bitcoin Core RPC abstraction layer.
//!
//! Defines the [`BitcoinRpc`] trait (the gateway the tracing engine reads
//! from) and provides an HTTP JSON-RPC implementation ([`HttpRpcClient`])
//! plus a test mock (`mock::MockRpc`).

mod http_adapter;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use http_adapter::{HttpRpcClient, RetryPolicy, RpcClientConfig};
pub use types::ChainInfo;

use async_trait::async_trait;
use bitcoin::Txid;

use crate::error::CoreError;
use crate::types::RawTransaction;

/// Minimal trait covering the node RPC methods that hoptrace needs.
///
/// Implementations are expected to handle authentication, connection
/// management, and response deserialization internally.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// List the ids of every transaction touching `address`, in the order
    /// the node returns them. Requires a node with an address index.
    async fn list_transaction_ids(&self, address: &str) -> Result<Vec<Txid>, CoreError>;

    /// Fetch a decoded transaction by txid.
    async fn get_transaction(&self, txid: &Txid) -> Result<RawTransaction, CoreError>;

    /// Fetch many decoded transactions, returned in the order of `txids`.
    /// Implementations may batch these requests into one or more RPC calls.
    async fn get_transactions(&self, txids: &[Txid]) -> Result<Vec<RawTransaction>, CoreError> {
        let mut results = Vec::with_capacity(txids.len());
        for txid in txids {
            results.push(self.get_transaction(txid).await?);
        }
        Ok(results)
    }

    /// Fetch basic chain info (network, block count, pruning status).
    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError>;
}
