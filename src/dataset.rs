// Dataset model - raw measurement rows as loaded from delimited text
// Cells stay as raw strings; typing is the profiler's job

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Tokens treated as a missing cell, compared case-insensitively
const MISSING_TOKENS: [&str; 3] = ["null", "nan", "n/a"];

/// Check whether a raw cell counts as missing (empty, null literal, NaN token)
pub fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_lowercase();
    MISSING_TOKENS.contains(&lower.as_str())
}

/// One loaded dataset: ordered headers plus rows of named raw cells.
/// Owned by the pipeline invocation that loaded it; immutable once built.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub source_path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
    /// Header names that appeared more than once in the input
    pub duplicate_headers: Vec<String>,
}

impl Dataset {
    /// Read a delimited file with a header row into named rows.
    /// Structural parse failures (e.g. ragged rows) propagate as errors so the
    /// resilient layer can classify the file as malformed.
    pub fn from_csv_path(path: &Path) -> Result<Dataset> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut seen = HashSet::new();
        let mut duplicate_headers = Vec::new();
        for header in &headers {
            if !seen.insert(header.clone()) && !duplicate_headers.contains(header) {
                duplicate_headers.push(header.clone());
            }
        }

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.context("Failed to parse CSV record")?;

            let mut row = HashMap::with_capacity(headers.len());
            for (i, header) in headers.iter().enumerate() {
                row.insert(header.clone(), record.get(i).unwrap_or("").to_string());
            }

            // Skip rows where every cell is blank, same as the source systems do
            if row.values().any(|v| !v.trim().is_empty()) {
                rows.push(row);
            }
        }

        Ok(Dataset {
            source_path: path.to_path_buf(),
            headers,
            rows,
            duplicate_headers,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// All raw cells of one column, in row order (missing columns yield "")
    pub fn column_values(&self, name: &str) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(name).map(String::as_str).unwrap_or(""))
            .collect()
    }

    /// Numeric view of one cell; None for missing or non-numeric values
    pub fn numeric_cell(row: &HashMap<String, String>, field: &str) -> Option<f64> {
        let raw = row.get(field)?;
        if is_missing(raw) {
            return None;
        }
        raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

// ============================================================================
// TESTS
// ============================================================================
