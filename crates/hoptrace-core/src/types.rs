//! Domain types for hoptrace's transaction reconstruction model.
//!
//! Contains the raw transaction shape returned by the RPC gateway
//! (`RawTransaction`, `TxInput`, `TxOutput`), the normalized output record
//! (`ResolvedTransaction`), and the seed entity (`FlaggedAddress`).

use bitcoin::{Amount, OutPoint, SignedAmount, Txid};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Coin Type
// ==============================================================================

/// Ledger label written into every record. Only Bitcoin is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CoinType {
    #[default]
    #[serde(rename = "BTC")]
    Btc,
}

impl std::fmt::Display for CoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Btc => write!(f, "BTC"),
        }
    }
}

// ==============================================================================
// Raw Transaction Types
// ==============================================================================

/// A transaction as decoded from `getrawtransaction <txid> 1`.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub txid: Txid,
    /// Unix timestamp of the transaction; `None` for mempool transactions
    /// that the node has not stamped yet.
    pub time: Option<u64>,
    /// Fee as reported by the node. Only present for some node builds and
    /// verbosity levels, and signed because wallet-relative fees are negative.
    pub fee: Option<SignedAmount>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl RawTransaction {
    /// A coinbase transaction has exactly one input whose prevout is `None`.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_none()
    }

    /// Destination addresses of all addressed outputs, in output order.
    pub fn output_addresses(&self) -> Vec<String> {
        self.outputs
            .iter()
            .filter_map(|output| output.address.clone())
            .collect()
    }
}

/// A transaction input. For coinbase inputs, `prevout` is `None`.
#[derive(Debug, Clone)]
pub struct TxInput {
    pub prevout: Option<OutPoint>,
}

/// A transaction output. `address` is `None` for data carriers and
/// scripts the node cannot map to an address.
#[derive(Debug, Clone)]
pub struct TxOutput {
    pub value: Amount,
    pub address: Option<String>,
}

// ==============================================================================
// Resolved Transaction
// ==============================================================================

/// One normalized record per addressed output of a traced transaction.
///
/// Field order matches the column order of the persisted output
/// (see [`ResolvedTransaction::FIELD_NAMES`]). Rows are encoded by
/// `sink::encode_row`, not through serde.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransaction {
    pub tx_hash: Txid,
    /// The address being traced, not derived from the transaction.
    pub sending_wallet: String,
    pub receiving_wallet: String,
    pub transaction_amount: Amount,
    pub coin_type: CoinType,
    pub date_sent: Option<String>,
    pub time_sent: Option<String>,
    /// Parallel to `input_values`. An entry is `None` when the spent output
    /// has no address the node can render.
    pub input_addresses: Vec<Option<String>>,
    pub input_values: Vec<Amount>,
    pub output_addresses: Vec<String>,
    pub total_input_value: Amount,
    pub total_output_value: Amount,
    pub fee: Option<SignedAmount>,
}

impl ResolvedTransaction {
    pub const FIELD_NAMES: [&'static str; 13] = [
        "tx_hash",
        "sending_wallet",
        "receiving_wallet",
        "transaction_amount",
        "coin_type",
        "date_sent",
        "time_sent",
        "input_addresses",
        "input_values",
        "output_addresses",
        "total_input_value",
        "total_output_value",
        "fee",
    ];
}

// ==============================================================================
// Seed Records
// ==============================================================================

/// A reported address together with the report category it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedAddress {
    pub address: String,
    pub report_type: String,
}
