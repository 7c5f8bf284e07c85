mod cli;

use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};

use hoptrace_core::rpc::{BitcoinRpc, HttpRpcClient, RetryPolicy, RpcClientConfig};
use hoptrace_core::seeds::load_flagged_addresses;
use hoptrace_core::{Cache, TraceOptions};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let seeds = load_flagged_addresses(&args.seeds)
        .wrap_err_with(|| format!("load seed file `{}`", args.seeds.display()))?;
    if seeds.is_empty() {
        tracing::warn!(path = %args.seeds.display(), "seed file has no entries");
        return Ok(());
    }
    std::fs::create_dir_all(&args.output_dir)
        .wrap_err_with(|| format!("create output directory `{}`", args.output_dir.display()))?;

    let rpc = HttpRpcClient::new(rpc_config(&args)).context("configure RPC client")?;

    // Probe the node once before doing any work; an unreachable node is
    // the only failure that aborts the run.
    let chain_info = rpc.get_blockchain_info().await.map_err(|err| {
        let message = format_rpc_connect_error(&args.rpc_url, &err.to_string());
        eyre!(message).wrap_err("while attempting to connect to Bitcoin Core RPC")
    })?;

    tracing::info!(
        chain = %chain_info.chain,
        blocks = chain_info.blocks,
        "connected to Bitcoin Core"
    );
    if chain_info.pruned {
        tracing::warn!("node is pruned; transactions in pruned blocks will be skipped");
    }

    let cache = Cache::with_capacity(args.cache_tx_cap);
    let options = TraceOptions {
        threshold: args.threshold,
        hop_strategy: args.hop_strategy.into(),
    };

    let mut summary = RunSummary::default();
    for seed in &seeds {
        match hoptrace_core::trace::trace(&rpc, &cache, &args.output_dir, seed, &options).await {
            Ok(report) => {
                tracing::info!(
                    seed = %report.seed.address,
                    records = report.seed_records,
                    skipped = report.seed_skipped,
                    dominant = report.dominant.as_deref().unwrap_or("none"),
                    hop = report.hop.as_ref().map(|hop| hop.address.as_str()).unwrap_or("none"),
                    hop_records = report.hop.as_ref().map_or(0, |hop| hop.records),
                    "seed traced"
                );
                summary.add(&report);
            }
            Err(err) => {
                tracing::error!(seed = %seed.address, error = %err, "trace failed");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        seeds = seeds.len(),
        failed = summary.failed,
        records = summary.records,
        skipped = summary.skipped,
        hops = summary.hops,
        files = summary.files,
        output_dir = %args.output_dir.display(),
        "run complete"
    );
    Ok(())
}

fn rpc_config(args: &cli::Cli) -> RpcClientConfig {
    let mut config = RpcClientConfig::new(args.rpc_url.clone());
    config.user = args.rpc_user.clone();
    config.pass = args.rpc_pass.clone();
    config.cookie_file = args.rpc_cookie_file.clone();
    config.requests_per_second = args.rpc_requests_per_second;
    config.batch_chunk_size = args.rpc_batch_chunk_size;
    config.timeout = Duration::from_secs(args.rpc_timeout_secs);
    config.retry = RetryPolicy {
        max_attempts: args.rpc_retries.saturating_add(1),
        ..RetryPolicy::default()
    };
    config
}

#[derive(Debug, Default)]
struct RunSummary {
    records: usize,
    skipped: usize,
    hops: usize,
    files: usize,
    failed: usize,
}

impl RunSummary {
    fn add(&mut self, report: &hoptrace_core::TraceReport) {
        self.records += report.seed_records;
        self.skipped += report.seed_skipped;
        self.files += report.outputs.len();
        if let Some(hop) = &report.hop {
            self.hops += 1;
            self.records += hop.records;
            self.skipped += hop.skipped;
        }
    }
}

fn format_rpc_connect_error(rpc_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not connect to RPC endpoint `{rpc_url}`"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("dns error") || source_error.contains("resolve host") {
        lines.push("hint: hostname resolution failed; check the host part of --rpc-url".into());
    } else if source_error.contains("Connection refused")
        || source_error.contains("error sending request")
    {
        lines.push(
            "hint: nothing answered at that address; is bitcoind running with -server=1?".into(),
        );
    } else if source_error.contains("401") || source_error.contains("403") {
        lines.push(
            "hint: authentication failed; check --rpc-user/--rpc-pass or --rpc-cookie-file".into(),
        );
    } else if source_error.contains("timed out") {
        lines.push("hint: the node did not answer in time; raise --rpc-timeout-secs".into());
    } else if source_error.contains("tls") || source_error.contains("certificate") {
        lines.push("hint: TLS handshake failed; check that the endpoint really uses HTTPS".into());
    }

    lines.join("\n")
}
