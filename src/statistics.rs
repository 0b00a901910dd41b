// 📊 Statistics Engine - Descriptive statistics and outlier detection
// Numeric columns get the full spread; everything else gets a frequency summary

use crate::dataset::is_missing;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How many top values a categorical summary keeps
const TOP_VALUE_LIMIT: usize = 10;

// ============================================================================
// NUMERIC STATISTICS
// ============================================================================

/// Descriptive statistics for one numeric column.
/// Invariants: count + invalid_count + missing_count == total rows,
/// q1 ≤ median ≤ q3, extreme_outlier_count ≤ outlier_count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub column: String,
    /// Values that coerced to a finite float
    pub count: usize,
    /// Non-missing cells that failed numeric coercion
    pub invalid_count: usize,
    pub missing_count: usize,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub mean: f64,
    /// Sample variance (N−1 denominator; 0 when count < 2)
    pub variance: f64,
    pub std_dev: f64,
    pub p5: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub p95: f64,
    pub iqr: f64,
    /// Fisher-Pearson skewness; 0 when std_dev is 0
    pub skewness: f64,
    /// Values outside the 1.5·IQR fences
    pub outlier_count: usize,
    /// Values outside the 3.0·IQR fences
    pub extreme_outlier_count: usize,
}

impl ColumnStatistics {
    pub fn outlier_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.outlier_count as f64 / self.count as f64
        }
    }
}

/// Linear-interpolation quantile over an already sorted slice
fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let h = (sorted.len() - 1) as f64 * p;
    let lower = h.floor() as usize;
    let upper = h.ceil() as usize;
    let fraction = h - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Compute full descriptive statistics for a numeric column's raw cells.
/// Returns None when no cell coerces to a finite float.
pub fn numeric_statistics(column: &str, raw_values: &[&str]) -> Option<ColumnStatistics> {
    let mut values = Vec::with_capacity(raw_values.len());
    let mut missing_count = 0usize;
    let mut invalid_count = 0usize;

    for raw in raw_values {
        if is_missing(raw) {
            missing_count += 1;
            continue;
        }
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => values.push(v),
            _ => invalid_count += 1,
        }
    }

    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let variance = if n < 2 {
        0.0
    } else {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    };
    let std_dev = variance.sqrt();

    let mut sorted = values.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let min = sorted[0];
    let max = sorted[n - 1];
    let p5 = quantile(&sorted, 0.05);
    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.50);
    let q3 = quantile(&sorted, 0.75);
    let p95 = quantile(&sorted, 0.95);
    let iqr = q3 - q1;

    let outlier_low = q1 - 1.5 * iqr;
    let outlier_high = q3 + 1.5 * iqr;
    let extreme_low = q1 - 3.0 * iqr;
    let extreme_high = q3 + 3.0 * iqr;

    let outlier_count = values
        .iter()
        .filter(|v| **v < outlier_low || **v > outlier_high)
        .count();
    let extreme_outlier_count = values
        .iter()
        .filter(|v| **v < extreme_low || **v > extreme_high)
        .count();

    let skewness = if std_dev > 0.0 {
        let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n as f64;
        m3 / std_dev.powi(3)
    } else {
        0.0
    };

    Some(ColumnStatistics {
        column: column.to_string(),
        count: n,
        invalid_count,
        missing_count,
        min,
        max,
        range: max - min,
        mean,
        variance,
        std_dev,
        p5,
        q1,
        median,
        q3,
        p95,
        iqr,
        skewness,
        outlier_count,
        extreme_outlier_count,
    })
}

// ============================================================================
// CATEGORICAL SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub count: usize,
    pub fraction: f64,
}

/// Summary for non-numeric columns: cardinality plus the dominant values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub count: usize,
    pub missing_count: usize,
    pub unique_count: usize,
    /// unique_count over non-missing count
    pub cardinality: f64,
    pub top_values: Vec<ValueFrequency>,
}

pub fn categorical_summary(column: &str, raw_values: &[&str]) -> CategoricalSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut missing_count = 0usize;

    for raw in raw_values {
        if is_missing(raw) {
            missing_count += 1;
        } else {
            *counts.entry(raw.trim()).or_insert(0) += 1;
        }
    }

    let count = raw_values.len() - missing_count;
    let unique_count = counts.len();

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Stable ranking: by frequency descending, then value for determinism
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let top_values = ranked
        .into_iter()
        .take(TOP_VALUE_LIMIT)
        .map(|(value, freq)| ValueFrequency {
            value: value.to_string(),
            count: freq,
            fraction: if count > 0 {
                freq as f64 / count as f64
            } else {
                0.0
            },
        })
        .collect();

    CategoricalSummary {
        column: column.to_string(),
        count,
        missing_count,
        unique_count,
        cardinality: if count > 0 {
            unique_count as f64 / count as f64
        } else {
            0.0
        },
        top_values,
    }
}

// ============================================================================
// TESTS
// ============================================================================
