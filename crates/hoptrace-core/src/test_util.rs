//! Shared test helpers for `hoptrace-core` unit tests.
//!
//! Builder functions for raw transactions and resolved records so tests
//! across modules share a single source of truth for dummy data.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::hashes::Hash;
use bitcoin::{Amount, Txid};

use crate::types::{CoinType, RawTransaction, ResolvedTransaction, TxInput, TxOutput};

/// 2023-11-14 22:13:20 UTC.
pub const TEST_TIME: u64 = 1_700_000_000;

// ==============================================================================
// Txid Helpers
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

// ==============================================================================
// Transaction Builders
// ==============================================================================

/// Build a confirmed `RawTransaction` stamped with [`TEST_TIME`] and no fee.
pub fn make_raw_tx(txid: Txid, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> RawTransaction {
    RawTransaction {
        txid,
        time: Some(TEST_TIME),
        fee: None,
        inputs,
        outputs,
    }
}

pub fn coinbase_input() -> TxInput {
    TxInput { prevout: None }
}

/// A spending input referencing `funding_txid:vout`.
pub fn spending_input(funding_txid: Txid, vout: u32) -> TxInput {
    TxInput {
        prevout: Some(bitcoin::OutPoint::new(funding_txid, vout)),
    }
}

pub fn addressed_output(address: &str, sats: u64) -> TxOutput {
    TxOutput {
        value: Amount::from_sat(sats),
        address: Some(address.to_owned()),
    }
}

/// An output the node renders without an address (e.g. `OP_RETURN`).
pub fn unaddressed_output(sats: u64) -> TxOutput {
    TxOutput {
        value: Amount::from_sat(sats),
        address: None,
    }
}

// ==============================================================================
// Record Builders
// ==============================================================================

/// A minimal record whose only meaningful field is `receiving_wallet`.
pub fn record_to(receiving_wallet: &str) -> ResolvedTransaction {
    ResolvedTransaction {
        tx_hash: txid_from_byte(0xEE),
        sending_wallet: "seed".to_owned(),
        receiving_wallet: receiving_wallet.to_owned(),
        transaction_amount: Amount::from_sat(1_000),
        coin_type: CoinType::Btc,
        date_sent: None,
        time_sent: None,
        input_addresses: Vec::new(),
        input_values: Vec::new(),
        output_addresses: vec![receiving_wallet.to_owned()],
        total_input_value: Amount::ZERO,
        total_output_value: Amount::from_sat(1_000),
        fee: None,
    }
}

// ==============================================================================
// Filesystem
// ==============================================================================

static TEMP_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

/// A fresh, unique directory under the system temp dir.
pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time must be after unix epoch")
        .as_nanos();
    let seq = TEMP_DIR_SEQ.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("hoptrace-{prefix}-{unique}-{seq}"));
    std::fs::create_dir_all(&dir).expect("temp dir must be creatable");
    dir
}
