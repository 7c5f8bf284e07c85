//! Seed loader for `address,report_type` lines.

use std::path::Path;

use tracing::debug;

use crate::error::CoreError;
use crate::types::FlaggedAddress;

/// Read and parse a seed file. A missing or unreadable file is an error.
pub fn load_flagged_addresses(path: &Path) -> Result<Vec<FlaggedAddress>, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let seeds = parse_flagged_addresses(&content)?;
    debug!(path = %path.display(), seeds = seeds.len(), "loaded seed file");
    Ok(seeds)
}

/// Parse seed lines. Blank lines are skipped and fields are trimmed; any
/// other line must hold exactly two non-empty comma-separated fields.
pub fn parse_flagged_addresses(content: &str) -> Result<Vec<FlaggedAddress>, CoreError> {
    let mut seeds = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        seeds.push(parse_line(line).map_err(|message| CoreError::SeedParse {
            line: idx + 1,
            message,
        })?);
    }
    Ok(seeds)
}

fn parse_line(line: &str) -> Result<FlaggedAddress, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [address, report_type] = fields.as_slice() else {
        return Err(format!(
            "expected `address,report_type`, found {} field(s)",
            fields.len()
        ));
    };
    if address.is_empty() {
        return Err("address is empty".into());
    }
    if report_type.is_empty() {
        return Err("report type is empty".into());
    }
    Ok(FlaggedAddress {
        address: (*address).to_owned(),
        report_type: (*report_type).to_owned(),
    })
}
