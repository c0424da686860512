//! Bounded-prefix CSV preview.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::schema::DatasetPreview;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file {filename}: only {expected} files are accepted")]
    Format { filename: String, expected: String },

    #[error("File too large: {size} bytes exceeds the {max} byte limit")]
    Size { size: u64, max: u64 },

    #[error("CSV file is empty or malformed: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct IngestLimits {
    pub max_size: u64,
    pub prefix_len: usize,
    pub sample_rows: usize,
    pub accepted_extension: String,
    /// Reported as `row_count` when the file does not fit in the prefix.
    pub row_count_sentinel: u64,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_size: 50 * 1024 * 1024 * 1024,
            prefix_len: 256 * 1024,
            sample_rows: 10,
            accepted_extension: ".csv".to_string(),
            row_count_sentinel: 1_000_000,
        }
    }
}

impl IngestLimits {
    pub fn check_format(&self, filename: &str) -> Result<(), IngestError> {
        if !filename.ends_with(&self.accepted_extension) {
            return Err(IngestError::Format {
                filename: filename.to_string(),
                expected: self.accepted_extension.clone(),
            });
        }
        Ok(())
    }

    fn check(&self, filename: &str, total_size: u64) -> Result<(), IngestError> {
        self.check_format(filename)?;
        if total_size > self.max_size {
            return Err(IngestError::Size { size: total_size, max: self.max_size });
        }
        Ok(())
    }
}

/// Reads at most `limits.prefix_len` bytes of `path`.
pub fn ingest_file(path: &Path, limits: &IngestLimits) -> Result<DatasetPreview, IngestError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let total_size = std::fs::metadata(path)?.len();
    limits.check(&filename, total_size)?;

    let mut prefix = Vec::with_capacity(limits.prefix_len.min(total_size as usize));
    std::fs::File::open(path)?
        .take(limits.prefix_len as u64)
        .read_to_end(&mut prefix)?;

    ingest_bytes(&filename, total_size, &prefix, limits)
}

/// `prefix` holds the first bytes of a file whose full length is `total_size`.
pub fn ingest_bytes(
    filename: &str,
    total_size: u64,
    prefix: &[u8],
    limits: &IngestLimits,
) -> Result<DatasetPreview, IngestError> {
    limits.check(filename, total_size)?;

    let prefix = &prefix[..prefix.len().min(limits.prefix_len)];
    let truncated = total_size > limits.prefix_len as u64;

    let text = String::from_utf8_lossy(prefix);
    let mut text: &str = &text;
    if truncated {
        // The last line was cut by the prefix boundary.
        text = match text.rfind('\n') {
            Some(end) => &text[..end],
            None => "",
        };
    }

    let lines: Vec<&str> = text.split('\n').map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() < 2 {
        return Err(IngestError::Malformed(format!(
            "expected a header and at least one row, found {} non-blank line(s)",
            lines.len()
        )));
    }

    // One line is one record: a stray quote never spans lines.
    let body = lines[..lines.len().min(limits.sample_rows + 1)].join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(r) => r.map_err(|e| IngestError::Malformed(e.to_string()))?,
        None => return Err(IngestError::Malformed("missing header row".into())),
    };
    let columns: Vec<String> = header
        .iter()
        .map(|c| c.replace(['\'', '"'], "").trim().to_string())
        .collect();

    let mut sample_data = Vec::new();
    for record in records.take(limits.sample_rows) {
        let record = record.map_err(|e| IngestError::Malformed(e.to_string()))?;
        let row: BTreeMap<String, String> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| (col.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        sample_data.push(row);
    }

    let row_count = if truncated {
        limits.row_count_sentinel
    } else {
        (lines.len() - 1) as u64
    };
    let prefix_hash = *blake3::hash(prefix).as_bytes();

    debug!(
        filename,
        columns = columns.len(),
        row_count,
        truncated,
        fingerprint = %hex::encode(&prefix_hash[..8]),
        "dataset preview built"
    );

    Ok(DatasetPreview {
        filename: filename.to_string(),
        columns,
        row_count,
        truncated,
        sample_data,
        prefix_hash,
    })
}
