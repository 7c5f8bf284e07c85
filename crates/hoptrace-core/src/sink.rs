//! Persistence Sink: append-only delimited output, one file per
//! destination.
//!
//! A destination is keyed by `(report_type, address[, hop])`. The first
//! write to an empty file emits the header row; everything after that is
//! appended. Re-running against an existing file appends duplicate rows.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::types::ResolvedTransaction;

// ==============================================================================
// Destination
// ==============================================================================

/// Where the records of one fetch go.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub report_type: String,
    /// The seed address of the trace.
    pub address: String,
    /// Set for the second round of a trace: the next-hop address.
    pub hop: Option<String>,
}

impl Destination {
    pub fn seed(report_type: &str, address: &str) -> Self {
        Self {
            report_type: report_type.to_owned(),
            address: address.to_owned(),
            hop: None,
        }
    }

    pub fn hop(report_type: &str, seed_address: &str, hop_address: &str) -> Self {
        Self {
            report_type: report_type.to_owned(),
            address: seed_address.to_owned(),
            hop: Some(hop_address.to_owned()),
        }
    }

    /// `{report_type}.Transaction_{address}.csv`, or
    /// `{report_type}.Transaction_{address}_trace{hop}.csv` for a hop.
    pub fn file_name(&self) -> String {
        let report_type = file_name_component(&self.report_type);
        let address = file_name_component(&self.address);
        match &self.hop {
            None => format!("{report_type}.Transaction_{address}.csv"),
            Some(hop) => format!(
                "{report_type}.Transaction_{address}_trace{}.csv",
                file_name_component(hop)
            ),
        }
    }
}

/// Keep ASCII alphanumerics, `-` and `_`; everything else becomes `-`.
/// Addresses pass through untouched; report types with spaces or path
/// separators cannot escape the output directory.
fn file_name_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_owned()
    } else {
        cleaned
    }
}

// ==============================================================================
// Sink Trait
// ==============================================================================

/// Receives records one at a time as they are produced.
pub trait RecordSink: Send {
    fn append(&mut self, record: &ResolvedTransaction) -> Result<(), CoreError>;
}

impl RecordSink for Vec<ResolvedTransaction> {
    fn append(&mut self, record: &ResolvedTransaction) -> Result<(), CoreError> {
        self.push(record.clone());
        Ok(())
    }
}

// ==============================================================================
// CSV Sink
// ==============================================================================

/// Appends records to `<dir>/<destination file name>`.
///
/// The file is opened on the first `append`, so a fetch that produces no
/// records leaves no file behind. Buffered rows are flushed by
/// [`CsvSink::finish`], and on drop as a fallback.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    rows_written: usize,
}

impl CsvSink {
    pub fn new(dir: &Path, destination: &Destination) -> Self {
        Self {
            path: dir.join(destination.file_name()),
            writer: None,
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written by this sink (not counting rows already in the file).
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and close the file. Returns the number of rows written.
    pub fn finish(mut self) -> Result<usize, CoreError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(self.rows_written)
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, CoreError> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let is_empty = file.metadata()?.len() == 0;
            let mut writer = BufWriter::new(file);
            if is_empty {
                writeln!(writer, "{}", ResolvedTransaction::FIELD_NAMES.join(","))?;
                debug!(path = %self.path.display(), "created output file");
            } else {
                debug!(path = %self.path.display(), "appending to existing output file");
            }
            self.writer = Some(writer);
        }
        // Populated just above.
        self.writer
            .as_mut()
            .ok_or_else(|| CoreError::Io(std::io::Error::other("output writer unavailable")))
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &ResolvedTransaction) -> Result<(), CoreError> {
        let row = encode_row(record);
        let writer = self.writer()?;
        writeln!(writer, "{row}")?;
        // Flush per row so an abrupt exit loses nothing already resolved.
        writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "failed to flush output file");
            }
        }
    }
}

// ==============================================================================
// Row Encoding
// ==============================================================================

/// Encode one record as a CSV row in [`ResolvedTransaction::FIELD_NAMES`]
/// order. Sequence fields become bracketed lists, and any field containing
/// a delimiter or quote is quoted.
pub fn encode_row(record: &ResolvedTransaction) -> String {
    let input_values = format!(
        "[{}]",
        record
            .input_values
            .iter()
            .map(|value| format_btc(false, value.to_sat()))
            .collect::<Vec<_>>()
            .join(",")
    );
    let fee = record
        .fee
        .map(|fee| format_btc(fee.is_negative(), fee.to_sat().unsigned_abs()))
        .unwrap_or_default();

    let fields = [
        record.tx_hash.to_string(),
        record.sending_wallet.clone(),
        record.receiving_wallet.clone(),
        format_btc(false, record.transaction_amount.to_sat()),
        record.coin_type.to_string(),
        record.date_sent.clone().unwrap_or_default(),
        record.time_sent.clone().unwrap_or_default(),
        json_list(&record.input_addresses),
        input_values,
        json_list(&record.output_addresses),
        format_btc(false, record.total_input_value.to_sat()),
        format_btc(false, record.total_output_value.to_sat()),
        fee,
    ];

    fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(",")
}

fn json_list<T: serde::Serialize>(items: &[T]) -> String {
    // Serializing strings and options of strings cannot fail.
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_owned())
}

/// BTC with up to eight decimals and no trailing zeros: `0.5`, `12`, `-0.0001`.
fn format_btc(negative: bool, sats: u64) -> String {
    const SATS_PER_BTC: u64 = 100_000_000;
    let sign = if negative && sats != 0 { "-" } else { "" };
    let whole = sats / SATS_PER_BTC;
    let frac = sats % SATS_PER_BTC;
    if frac == 0 {
        return format!("{sign}{whole}");
    }
    let frac = format!("{frac:08}");
    format!("{sign}{whole}.{}", frac.trim_end_matches('0'))
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}
