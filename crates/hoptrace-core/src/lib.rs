pub mod cache;
pub mod error;
pub mod fetch;
pub mod heuristic;
pub mod resolve;
pub mod rpc;
pub mod seeds;
pub mod sink;
pub mod trace;
pub mod types;

#[cfg(test)]
mod test_util;

pub use cache::Cache;
pub use error::CoreError;
pub use trace::{HopStrategy, TraceOptions, TraceReport};
pub use types::{FlaggedAddress, ResolvedTransaction};
