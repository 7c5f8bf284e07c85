use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};

use crate::error::{CoreError, RpcError};
use crate::types::RawTransaction;

use super::types::ChainInfo;
use super::BitcoinRpc;

/// A mock RPC backend for testing. Returns canned data populated via the
/// builder pattern and records every call it receives.
pub struct MockRpc {
    address_txids: HashMap<String, Vec<Txid>>,
    transactions: HashMap<Txid, RawTransaction>,
    failing_txids: HashSet<Txid>,
    failing_addresses: HashSet<String>,
    chain_info: ChainInfo,
    pending_timeouts: Mutex<HashMap<Txid, usize>>,
    listed_addresses: Mutex<Vec<String>>,
    fetched_txids: Mutex<Vec<Txid>>,
}

impl MockRpc {
    pub fn builder() -> MockRpcBuilder {
        MockRpcBuilder {
            address_txids: HashMap::new(),
            transactions: HashMap::new(),
            failing_txids: HashSet::new(),
            failing_addresses: HashSet::new(),
            timeouts: HashMap::new(),
            chain_info: ChainInfo {
                chain: "regtest".into(),
                blocks: 100,
                best_block_hash: BlockHash::all_zeros(),
                pruned: false,
            },
        }
    }

    /// Addresses passed to `list_transaction_ids`, in call order.
    pub fn listed_addresses(&self) -> Vec<String> {
        self.listed_addresses
            .lock()
            .expect("mock lock poisoned")
            .clone()
    }

    /// How many times `txid` was fetched through `get_transaction(s)`.
    pub fn fetch_count(&self, txid: &Txid) -> usize {
        self.fetched_txids
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .filter(|fetched| *fetched == txid)
            .count()
    }
}

pub struct MockRpcBuilder {
    address_txids: HashMap<String, Vec<Txid>>,
    transactions: HashMap<Txid, RawTransaction>,
    failing_txids: HashSet<Txid>,
    failing_addresses: HashSet<String>,
    timeouts: HashMap<Txid, usize>,
    chain_info: ChainInfo,
}

impl MockRpcBuilder {
    pub fn with_tx(mut self, tx: RawTransaction) -> Self {
        self.transactions.insert(tx.txid, tx);
        self
    }

    /// Register the txid list returned for `address`.
    pub fn with_address(mut self, address: &str, txids: Vec<Txid>) -> Self {
        self.address_txids.insert(address.to_owned(), txids);
        self
    }

    /// Make `get_transaction(txid)` fail with a server error.
    pub fn with_failing_tx(mut self, txid: Txid) -> Self {
        self.failing_txids.insert(txid);
        self
    }

    /// Make `list_transaction_ids(address)` fail with a server error.
    pub fn with_failing_address(mut self, address: &str) -> Self {
        self.failing_addresses.insert(address.to_owned());
        self
    }

    /// Make the first `count` fetches of `txid` time out.
    pub fn with_timeouts(mut self, txid: Txid, count: usize) -> Self {
        self.timeouts.insert(txid, count);
        self
    }

    pub fn with_chain_info(mut self, info: ChainInfo) -> Self {
        self.chain_info = info;
        self
    }

    pub fn build(self) -> MockRpc {
        MockRpc {
            address_txids: self.address_txids,
            transactions: self.transactions,
            failing_txids: self.failing_txids,
            failing_addresses: self.failing_addresses,
            chain_info: self.chain_info,
            pending_timeouts: Mutex::new(self.timeouts),
            listed_addresses: Mutex::new(Vec::new()),
            fetched_txids: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BitcoinRpc for MockRpc {
    async fn list_transaction_ids(&self, address: &str) -> Result<Vec<Txid>, CoreError> {
        self.listed_addresses
            .lock()
            .expect("mock lock poisoned")
            .push(address.to_owned());

        if self.failing_addresses.contains(address) {
            return Err(RpcError::ServerError {
                code: -5,
                message: "No information available for address".into(),
            }
            .into());
        }
        Ok(self.address_txids.get(address).cloned().unwrap_or_default())
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<RawTransaction, CoreError> {
        self.fetched_txids
            .lock()
            .expect("mock lock poisoned")
            .push(*txid);

        if let Some(remaining) = self
            .pending_timeouts
            .lock()
            .expect("mock lock poisoned")
            .get_mut(txid)
            .filter(|remaining| **remaining > 0)
        {
            *remaining -= 1;
            return Err(RpcError::Timeout.into());
        }
        if self.failing_txids.contains(txid) {
            return Err(RpcError::ServerError {
                code: -32603,
                message: "simulated node failure".into(),
            }
            .into());
        }
        self.transactions
            .get(txid)
            .cloned()
            .ok_or(CoreError::TxNotFound(*txid))
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        Ok(self.chain_info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[tokio::test]
    async fn with_chain_info_overrides_defaults() {
        let custom_info = ChainInfo {
            chain: "main".into(),
            blocks: 800_000,
            best_block_hash: BlockHash::all_zeros(),
            pruned: true,
        };
        let rpc = MockRpc::builder().with_chain_info(custom_info).build();
        let info = rpc.get_blockchain_info().await.unwrap();
        assert_eq!(info.chain, "main");
        assert_eq!(info.blocks, 800_000);
        assert!(info.pruned);
    }

    #[tokio::test]
    async fn default_batch_fetch_preserves_order_and_records_calls() {
        let a = make_raw_tx(txid_from_byte(1), vec![], vec![addressed_output("x", 1)]);
        let b = make_raw_tx(txid_from_byte(2), vec![], vec![addressed_output("y", 2)]);
        let rpc = MockRpc::builder().with_tx(a).with_tx(b).build();

        let txs = rpc
            .get_transactions(&[txid_from_byte(2), txid_from_byte(1)])
            .await
            .unwrap();
        assert_eq!(txs[0].txid, txid_from_byte(2));
        assert_eq!(txs[1].txid, txid_from_byte(1));
        assert_eq!(rpc.fetch_count(&txid_from_byte(1)), 1);
    }

    #[tokio::test]
    async fn timeouts_run_out_after_count() {
        let tx = make_raw_tx(txid_from_byte(1), vec![], vec![addressed_output("x", 1)]);
        let rpc = MockRpc::builder()
            .with_tx(tx)
            .with_timeouts(txid_from_byte(1), 2)
            .build();

        for _ in 0..2 {
            let err = rpc.get_transaction(&txid_from_byte(1)).await.unwrap_err();
            assert!(matches!(err, CoreError::Rpc(RpcError::Timeout)));
        }
        assert!(rpc.get_transaction(&txid_from_byte(1)).await.is_ok());
        assert_eq!(rpc.fetch_count(&txid_from_byte(1)), 3);
    }

    #[tokio::test]
    async fn unknown_address_lists_nothing() {
        let rpc = MockRpc::builder().build();
        let txids = rpc.list_transaction_ids("nobody").await.unwrap();
        assert!(txids.is_empty());
        assert_eq!(rpc.listed_addresses(), vec!["nobody".to_owned()]);
    }
}
