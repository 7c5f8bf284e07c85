use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use hoptrace_core::cache::DEFAULT_TX_CACHE_CAP;
use hoptrace_core::heuristic::DEFAULT_THRESHOLD;
use hoptrace_core::HopStrategy;

/// hoptrace: reconstruct the transaction history of flagged Bitcoin
/// addresses and follow the funds one hop further.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Bitcoin Core RPC URL. The node needs -addressindex and -txindex.
    #[arg(long, default_value = "http://127.0.0.1:8332", env = "HOPTRACE_RPC_URL")]
    pub rpc_url: String,

    /// RPC username.
    #[arg(long, env = "HOPTRACE_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password.
    #[arg(long, env = "HOPTRACE_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Path to the node's `.cookie` file, used when no user/password is given.
    #[arg(long, env = "HOPTRACE_RPC_COOKIE_FILE")]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Maximum outbound RPC requests per second. Unlimited if omitted.
    #[arg(long, env = "HOPTRACE_RPC_REQUESTS_PER_SECOND")]
    pub rpc_requests_per_second: Option<u32>,

    /// Maximum calls per JSON-RPC batch.
    #[arg(long, default_value = "50", env = "HOPTRACE_RPC_BATCH_CHUNK_SIZE")]
    pub rpc_batch_chunk_size: usize,

    /// Per-request timeout in seconds.
    #[arg(long, default_value = "30", env = "HOPTRACE_RPC_TIMEOUT_SECS")]
    pub rpc_timeout_secs: u64,

    /// Retries after a transport failure or timeout (0 disables retrying).
    #[arg(long, default_value = "2", env = "HOPTRACE_RPC_RETRIES")]
    pub rpc_retries: u32,

    /// Seed file with one `address,report_type` pair per line.
    #[arg(long, env = "HOPTRACE_SEEDS")]
    pub seeds: PathBuf,

    /// Directory receiving the output files.
    #[arg(long, default_value = ".", env = "HOPTRACE_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// A receiving address is dominant when it appears more than this many times.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD, env = "HOPTRACE_THRESHOLD")]
    pub threshold: usize,

    /// How the next hop is chosen from a seed's records.
    #[arg(long, value_enum, default_value_t = HopStrategyArg::LastRecord, env = "HOPTRACE_HOP_STRATEGY")]
    pub hop_strategy: HopStrategyArg,

    /// Maximum number of decoded transactions kept in memory.
    #[arg(long, default_value_t = DEFAULT_TX_CACHE_CAP, env = "HOPTRACE_CACHE_TX_CAP")]
    pub cache_tx_cap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HopStrategyArg {
    /// Follow the receiving wallet of the last record.
    LastRecord,
    /// Follow the first repeated receiving wallet, if any.
    Dominant,
}

impl From<HopStrategyArg> for HopStrategy {
    fn from(arg: HopStrategyArg) -> Self {
        match arg {
            HopStrategyArg::LastRecord => HopStrategy::LastRecord,
            HopStrategyArg::Dominant => HopStrategy::Dominant,
        }
    }
}
