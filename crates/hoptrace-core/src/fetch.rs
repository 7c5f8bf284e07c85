//! Address Fetcher: every transaction touching an address, resolved and
//! streamed to a sink as it is produced.

use bitcoin::Txid;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::error::CoreError;
use crate::resolve::resolve_transaction;
use crate::rpc::BitcoinRpc;
use crate::sink::RecordSink;
use crate::types::{RawTransaction, ResolvedTransaction};

/// What one `fetch_all` run produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Records in production order, already persisted.
    pub records: Vec<ResolvedTransaction>,
    /// Transaction ids the node listed for the address.
    pub listed: usize,
    /// Transactions abandoned because they could not be fetched or resolved.
    pub skipped: usize,
}

/// Fetch and resolve every transaction of `address`, attributing each
/// record to `address` as the sending wallet.
///
/// Listing the address is the only call whose failure is returned. A
/// transaction that fails to fetch or resolve is logged and skipped, and
/// the run moves on to the next id. Records are appended to `sink` as soon
/// as their transaction resolves; a sink error stops the run.
pub async fn fetch_all(
    rpc: &dyn BitcoinRpc,
    cache: &Cache,
    address: &str,
    sink: &mut dyn RecordSink,
) -> Result<FetchOutcome, CoreError> {
    let txids = rpc.list_transaction_ids(address).await?;
    info!(address, transactions = txids.len(), "fetching address history");

    let mut outcome = FetchOutcome {
        listed: txids.len(),
        ..FetchOutcome::default()
    };

    for txid in &txids {
        let records = match fetch_and_resolve(rpc, cache, txid, address).await {
            Ok(records) => records,
            Err(e) => {
                warn!(address, %txid, error = %e, "skipping transaction");
                outcome.skipped += 1;
                continue;
            }
        };
        for record in &records {
            sink.append(record)?;
        }
        debug!(%txid, records = records.len(), "transaction resolved");
        outcome.records.extend(records);
    }

    info!(
        address,
        records = outcome.records.len(),
        skipped = outcome.skipped,
        "address history fetched"
    );
    Ok(outcome)
}

async fn fetch_and_resolve(
    rpc: &dyn BitcoinRpc,
    cache: &Cache,
    txid: &Txid,
    address: &str,
) -> Result<Vec<ResolvedTransaction>, CoreError> {
    let raw = get_cached_transaction(rpc, cache, txid).await?;
    resolve_transaction(rpc, cache, &raw, address).await
}

async fn get_cached_transaction(
    rpc: &dyn BitcoinRpc,
    cache: &Cache,
    txid: &Txid,
) -> Result<RawTransaction, CoreError> {
    if let Some(tx) = cache.get_tx(txid).await {
        return Ok(tx);
    }
    let tx = rpc.get_transaction(txid).await?;
    cache.insert_tx(tx.clone()).await;
    Ok(tx)
}
