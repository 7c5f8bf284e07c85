//! Transaction Resolver: turns a raw transaction into one normalized
//! record per addressed output.
//!
//! The node does not report the value or address of an input, only the
//! outpoint it spends, so every input is resolved by looking up its
//! funding transaction and indexing into that transaction's outputs.

use std::collections::HashSet;

use bitcoin::{Amount, OutPoint, Txid};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::cache::Cache;
use crate::error::CoreError;
use crate::rpc::BitcoinRpc;
use crate::types::{CoinType, RawTransaction, ResolvedTransaction};

// ==============================================================================
// Resolution
// ==============================================================================

/// The spent output behind one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub address: Option<String>,
    pub value: Amount,
}

/// Resolve `raw` into one [`ResolvedTransaction`] per addressed output,
/// attributing every record to `sending_wallet`.
///
/// Any lookup failure aborts the whole transaction: either every record
/// for `raw` is returned or none is.
pub async fn resolve_transaction(
    rpc: &dyn BitcoinRpc,
    cache: &Cache,
    raw: &RawTransaction,
    sending_wallet: &str,
) -> Result<Vec<ResolvedTransaction>, CoreError> {
    let inputs = resolve_inputs(rpc, cache, raw).await?;
    build_records(raw, sending_wallet, &inputs)
}

/// Resolve every spending input of `raw`, in input order. Coinbase inputs
/// spend nothing and are left out.
///
/// Funding transactions missing from the cache are fetched in one batched
/// call; duplicates are requested once.
pub async fn resolve_inputs(
    rpc: &dyn BitcoinRpc,
    cache: &Cache,
    raw: &RawTransaction,
) -> Result<Vec<ResolvedInput>, CoreError> {
    let outpoints: Vec<OutPoint> = raw.inputs.iter().filter_map(|input| input.prevout).collect();

    let mut funding = Vec::with_capacity(outpoints.len());
    let mut missing: Vec<Txid> = Vec::new();
    let mut seen_missing: HashSet<Txid> = HashSet::new();
    for outpoint in &outpoints {
        let cached = cache.get_tx(&outpoint.txid).await;
        if cached.is_none() && seen_missing.insert(outpoint.txid) {
            missing.push(outpoint.txid);
        }
        funding.push(cached);
    }

    if !missing.is_empty() {
        debug!(
            txid = %raw.txid,
            inputs = outpoints.len(),
            fetching = missing.len(),
            "fetching funding transactions"
        );
        let fetched = rpc.get_transactions(&missing).await?;
        for tx in &fetched {
            cache.insert_tx(tx.clone()).await;
        }
        for (slot, outpoint) in funding.iter_mut().zip(&outpoints) {
            if slot.is_none() {
                *slot = fetched.iter().find(|tx| tx.txid == outpoint.txid).cloned();
            }
        }
    }

    outpoints
        .iter()
        .zip(funding)
        .map(|(outpoint, funding_tx)| {
            let funding_tx = funding_tx.ok_or(CoreError::TxNotFound(outpoint.txid))?;
            let output = funding_tx
                .outputs
                .get(outpoint.vout as usize)
                .ok_or_else(|| {
                    CoreError::InvalidTxData(format!(
                        "{} spends {outpoint} but the funding transaction has only {} outputs",
                        raw.txid,
                        funding_tx.outputs.len()
                    ))
                })?;
            Ok(ResolvedInput {
                address: output.address.clone(),
                value: output.value,
            })
        })
        .collect()
}

/// Assemble the records for `raw` from already-resolved inputs.
pub fn build_records(
    raw: &RawTransaction,
    sending_wallet: &str,
    inputs: &[ResolvedInput],
) -> Result<Vec<ResolvedTransaction>, CoreError> {
    let total_input_value = checked_sum(inputs.iter().map(|input| input.value), raw.txid)?;
    let total_output_value = checked_sum(raw.outputs.iter().map(|output| output.value), raw.txid)?;
    let (date_sent, time_sent) = match raw.time {
        Some(ts) => {
            let (date, time) = split_timestamp(ts)?;
            (Some(date), Some(time))
        }
        None => (None, None),
    };

    let input_addresses: Vec<Option<String>> =
        inputs.iter().map(|input| input.address.clone()).collect();
    let input_values: Vec<Amount> = inputs.iter().map(|input| input.value).collect();
    let output_addresses = raw.output_addresses();

    let records: Vec<ResolvedTransaction> = raw
        .outputs
        .iter()
        .filter_map(|output| Some((output.address.as_ref()?, output.value)))
        .map(|(receiving_wallet, value)| ResolvedTransaction {
            tx_hash: raw.txid,
            sending_wallet: sending_wallet.to_owned(),
            receiving_wallet: receiving_wallet.clone(),
            transaction_amount: value,
            coin_type: CoinType::Btc,
            date_sent: date_sent.clone(),
            time_sent: time_sent.clone(),
            input_addresses: input_addresses.clone(),
            input_values: input_values.clone(),
            output_addresses: output_addresses.clone(),
            total_input_value,
            total_output_value,
            fee: raw.fee,
        })
        .collect();

    trace!(txid = %raw.txid, records = records.len(), "built records");
    Ok(records)
}

fn checked_sum(values: impl Iterator<Item = Amount>, txid: Txid) -> Result<Amount, CoreError> {
    values
        .into_iter()
        .try_fold(Amount::ZERO, |acc, value| acc.checked_add(value))
        .ok_or_else(|| CoreError::InvalidTxData(format!("{txid}: value sum overflows")))
}

/// Split a unix timestamp into `YYYY-MM-DD` and `HH:MM:SS`, in UTC.
pub fn split_timestamp(unix_secs: u64) -> Result<(String, String), CoreError> {
    let invalid =
        |detail: String| CoreError::InvalidTxData(format!("timestamp {unix_secs}: {detail}"));

    let secs = i64::try_from(unix_secs).map_err(|e| invalid(e.to_string()))?;
    let when = OffsetDateTime::from_unix_timestamp(secs).map_err(|e| invalid(e.to_string()))?;
    let date = when
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| invalid(e.to_string()))?;
    let time = when
        .format(format_description!("[hour]:[minute]:[second]"))
        .map_err(|e| invalid(e.to_string()))?;
    Ok((date, time))
}
