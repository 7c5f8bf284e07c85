//! Chain Tracer: fetch a flagged address, pick a next hop from its
//! records, and fetch that hop once.
//!
//! Tracing never recurses past the first hop. The seed's records go to
//! the seed destination and the hop's records to a destination that names
//! both addresses, so the two rounds never share a file.

use std::path::{Path, PathBuf};

use tracing::{info, info_span, Instrument};

use crate::cache::Cache;
use crate::error::CoreError;
use crate::fetch::fetch_all;
use crate::heuristic::{find_dominant, DEFAULT_THRESHOLD};
use crate::rpc::BitcoinRpc;
use crate::sink::{CsvSink, Destination};
use crate::types::{FlaggedAddress, ResolvedTransaction};

// ==============================================================================
// Options
// ==============================================================================

/// How the next hop is chosen from the seed's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HopStrategy {
    /// The receiving wallet of the last record produced.
    #[default]
    LastRecord,
    /// The repeated-address heuristic; no hop when nothing repeats.
    Dominant,
}

#[derive(Debug, Clone, Copy)]
pub struct TraceOptions {
    /// Exclusive repeat count for the dominant-address heuristic.
    pub threshold: usize,
    pub hop_strategy: HopStrategy,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            hop_strategy: HopStrategy::default(),
        }
    }
}

// ==============================================================================
// Report
// ==============================================================================

/// Summary of one seed's trace. Records themselves are already on disk.
#[derive(Debug, Clone)]
pub struct TraceReport {
    pub seed: FlaggedAddress,
    pub seed_records: usize,
    pub seed_skipped: usize,
    /// Output of the repeated-address heuristic, computed for every seed.
    pub dominant: Option<String>,
    pub hop: Option<HopReport>,
    /// Files written or appended to, seed first.
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct HopReport {
    pub address: String,
    pub records: usize,
    pub skipped: usize,
}

// ==============================================================================
// Tracing
// ==============================================================================

/// Trace `seed` one hop deep, writing output files under `output_dir`.
///
/// Returns an error only when listing an address fails or an output file
/// cannot be written. Anything persisted before the error stays on disk.
pub async fn trace(
    rpc: &dyn BitcoinRpc,
    cache: &Cache,
    output_dir: &Path,
    seed: &FlaggedAddress,
    options: &TraceOptions,
) -> Result<TraceReport, CoreError> {
    let span = info_span!("trace", seed = %seed.address, report_type = %seed.report_type);
    trace_inner(rpc, cache, output_dir, seed, options)
        .instrument(span)
        .await
}

async fn trace_inner(
    rpc: &dyn BitcoinRpc,
    cache: &Cache,
    output_dir: &Path,
    seed: &FlaggedAddress,
    options: &TraceOptions,
) -> Result<TraceReport, CoreError> {
    let mut outputs = Vec::new();

    let mut seed_sink = CsvSink::new(
        output_dir,
        &Destination::seed(&seed.report_type, &seed.address),
    );
    let seed_outcome = fetch_all(rpc, cache, &seed.address, &mut seed_sink).await?;
    if seed_sink.rows_written() > 0 {
        outputs.push(seed_sink.path().to_path_buf());
    }
    seed_sink.finish()?;

    let mut report = TraceReport {
        seed: seed.clone(),
        seed_records: seed_outcome.records.len(),
        seed_skipped: seed_outcome.skipped,
        dominant: None,
        hop: None,
        outputs,
    };

    if seed_outcome.records.is_empty() {
        info!("no records for seed, nothing to trace");
        return Ok(report);
    }

    report.dominant =
        find_dominant(&seed_outcome.records, options.threshold).map(str::to_owned);
    info!(
        dominant = report.dominant.as_deref().unwrap_or("none"),
        threshold = options.threshold,
        "repeated-address heuristic"
    );

    let Some(hop_address) = select_hop(
        &seed_outcome.records,
        report.dominant.as_deref(),
        options.hop_strategy,
    ) else {
        info!(strategy = ?options.hop_strategy, "no next hop");
        return Ok(report);
    };
    let hop_address = hop_address.to_owned();
    info!(hop = %hop_address, strategy = ?options.hop_strategy, "following next hop");

    let mut hop_sink = CsvSink::new(
        output_dir,
        &Destination::hop(&seed.report_type, &seed.address, &hop_address),
    );
    let hop_outcome = fetch_all(rpc, cache, &hop_address, &mut hop_sink).await?;
    if hop_sink.rows_written() > 0 {
        report.outputs.push(hop_sink.path().to_path_buf());
    }
    hop_sink.finish()?;

    report.hop = Some(HopReport {
        address: hop_address,
        records: hop_outcome.records.len(),
        skipped: hop_outcome.skipped,
    });
    Ok(report)
}

fn select_hop<'a>(
    records: &'a [ResolvedTransaction],
    dominant: Option<&'a str>,
    strategy: HopStrategy,
) -> Option<&'a str> {
    match strategy {
        HopStrategy::LastRecord => records.last().map(|r| r.receiving_wallet.as_str()),
        HopStrategy::Dominant => dominant,
    }
}
