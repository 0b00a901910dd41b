// 🔍 Column Profiler - Confidence-scored type inference
// Coercion cascade over raw cells: boolean → integer → float → datetime → categorical

use crate::config::QualityThresholds;
use crate::dataset::{is_missing, Dataset};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// COLUMN TYPES
// ============================================================================

/// Semantic type inferred for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Integer,
    Boolean,
    Datetime,
    Categorical,
    CategoricalHighCardinality,
    Mixed,
}

impl ColumnType {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
            ColumnType::Categorical => "categorical",
            ColumnType::CategoricalHighCardinality => "categorical_high_cardinality",
            ColumnType::Mixed => "mixed",
        }
    }

    /// Columns of this type get full descriptive statistics
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Numeric | ColumnType::Integer)
    }
}

/// Profile of one column: inferred type plus the evidence behind it.
/// Created once by the profiler, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: ColumnType,
    /// Fraction of non-missing values the winning coercion accepted
    pub confidence: f64,
    pub missing_count: usize,
    /// Distinct non-missing values
    pub unique_count: usize,
}

// ============================================================================
// COERCION CASCADE
// ============================================================================

/// One typed try-coerce strategy. Strategies are evaluated in cascade order;
/// ties on acceptance fraction resolve to the earlier strategy.
trait Coercion: Send + Sync {
    fn inferred(&self) -> ColumnType;
    fn accepts(&self, value: &str) -> bool;
}

struct BooleanCoercion;

impl Coercion for BooleanCoercion {
    fn inferred(&self) -> ColumnType {
        ColumnType::Boolean
    }

    fn accepts(&self, value: &str) -> bool {
        matches!(
            value.trim().to_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "t" | "f" | "y" | "n" | "0" | "1"
        )
    }
}

struct IntegerCoercion;

impl Coercion for IntegerCoercion {
    fn inferred(&self) -> ColumnType {
        ColumnType::Integer
    }

    fn accepts(&self, value: &str) -> bool {
        value.trim().parse::<i64>().is_ok()
    }
}

struct FloatCoercion;

impl Coercion for FloatCoercion {
    fn inferred(&self) -> ColumnType {
        ColumnType::Numeric
    }

    fn accepts(&self, value: &str) -> bool {
        value
            .trim()
            .parse::<f64>()
            .map(|v| v.is_finite())
            .unwrap_or(false)
    }
}

struct DatetimeCoercion;

impl Coercion for DatetimeCoercion {
    fn inferred(&self) -> ColumnType {
        ColumnType::Datetime
    }

    fn accepts(&self, value: &str) -> bool {
        let v = value.trim();
        DateTime::parse_from_rfc3339(v).is_ok()
            || NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S").is_ok()
            || NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
    }
}

fn cascade() -> Vec<Box<dyn Coercion>> {
    vec![
        Box::new(BooleanCoercion),
        Box::new(IntegerCoercion),
        Box::new(FloatCoercion),
        Box::new(DatetimeCoercion),
    ]
}

// ============================================================================
// PROFILER
// ============================================================================

pub struct ColumnProfiler {
    strategies: Vec<Box<dyn Coercion>>,
    min_type_confidence: f64,
    high_cardinality_ratio: f64,
}

impl ColumnProfiler {
    pub fn new(thresholds: &QualityThresholds) -> Self {
        ColumnProfiler {
            strategies: cascade(),
            min_type_confidence: thresholds.min_type_confidence,
            high_cardinality_ratio: thresholds.high_cardinality_ratio,
        }
    }

    /// Profile every column of a dataset, in header order
    pub fn profile_dataset(&self, dataset: &Dataset) -> Vec<ColumnProfile> {
        dataset
            .headers
            .iter()
            .map(|name| {
                let values = dataset.column_values(name);
                self.profile_column(name, &values, dataset.row_count())
            })
            .collect()
    }

    /// Profile one column from its raw cells.
    /// `row_count` is the dataset row count used for the cardinality ratio.
    pub fn profile_column(&self, name: &str, values: &[&str], row_count: usize) -> ColumnProfile {
        let present: Vec<&str> = values.iter().copied().filter(|v| !is_missing(v)).collect();
        let missing_count = values.len() - present.len();

        let unique_count = present
            .iter()
            .map(|v| v.trim())
            .collect::<HashSet<_>>()
            .len();

        if present.is_empty() {
            // Nothing to type against
            return ColumnProfile {
                name: name.to_string(),
                inferred_type: ColumnType::Categorical,
                confidence: 0.0,
                missing_count,
                unique_count: 0,
            };
        }

        // Count acceptances per typed strategy; the categorical fallback
        // claims whatever no typed coercion accepts
        let mut hits = vec![0usize; self.strategies.len()];
        let mut fallback_hits = 0usize;

        for value in &present {
            let mut matched_any = false;
            for (i, strategy) in self.strategies.iter().enumerate() {
                if strategy.accepts(value) {
                    hits[i] += 1;
                    matched_any = true;
                }
            }
            if !matched_any {
                fallback_hits += 1;
            }
        }

        let n = present.len() as f64;
        let mut best_type = ColumnType::Categorical;
        let mut best_fraction = fallback_hits as f64 / n;

        // Cascade order wins ties, so walk strategies in reverse priority:
        // an earlier strategy with an equal fraction replaces a later one
        for (i, strategy) in self.strategies.iter().enumerate().rev() {
            let fraction = hits[i] as f64 / n;
            if fraction >= best_fraction && fraction > 0.0 {
                best_type = strategy.inferred();
                best_fraction = fraction;
            }
        }

        let mut inferred_type = if best_fraction < self.min_type_confidence {
            ColumnType::Mixed
        } else {
            best_type
        };

        // High-cardinality categoricals get tagged so downstream consumers
        // don't enumerate them
        if inferred_type == ColumnType::Categorical && row_count > 0 {
            let cardinality = unique_count as f64 / row_count as f64;
            if cardinality > self.high_cardinality_ratio {
                inferred_type = ColumnType::CategoricalHighCardinality;
            }
        }

        ColumnProfile {
            name: name.to_string(),
            inferred_type,
            confidence: best_fraction,
            missing_count,
            unique_count,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
