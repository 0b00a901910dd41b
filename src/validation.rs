// ✅ Validation Engine - Threshold checks over the profiled dataset
// Produces severity-tagged messages in evaluation order and a sealed
// QualityReport with an overall score and PASS/FAIL status

use crate::config::IntakeConfig;
use crate::dataset::Dataset;
use crate::profiler::ColumnProfile;
use crate::statistics::{CategoricalSummary, ColumnStatistics};
use serde::{Deserialize, Serialize};

/// Weight of the missing-cell ratio in the quality score
const MISSING_WEIGHT: f64 = 0.7;
/// Weight of the outlier ratio in the quality score
const OUTLIER_WEIGHT: f64 = 0.3;

// ============================================================================
// VALIDATION MESSAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub code: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_column: Option<String>,
}

impl ValidationMessage {
    pub fn info(code: &str, text: String) -> Self {
        ValidationMessage {
            severity: Severity::Info,
            code: code.to_string(),
            text,
            related_column: None,
        }
    }

    pub fn warning(code: &str, text: String) -> Self {
        ValidationMessage {
            severity: Severity::Warning,
            code: code.to_string(),
            text,
            related_column: None,
        }
    }

    pub fn error(code: &str, text: String) -> Self {
        ValidationMessage {
            severity: Severity::Error,
            code: code.to_string(),
            text,
            related_column: None,
        }
    }

    pub fn for_column(mut self, column: &str) -> Self {
        self.related_column = Some(column.to_string());
        self
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

/// Full quality picture of one dataset load. Sealed after validation;
/// nothing mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub profiles: Vec<ColumnProfile>,
    pub numeric_statistics: Vec<ColumnStatistics>,
    pub categorical_summaries: Vec<CategoricalSummary>,
    /// Messages in evaluation order, all severities retained
    pub messages: Vec<ValidationMessage>,
    pub quality_score: f64,
    pub validation_status: ValidationStatus,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.validation_status == ValidationStatus::Pass
    }

    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Quality: {:.1}%, Status: {}, {} error(s), {} warning(s)",
            self.quality_score * 100.0,
            match self.validation_status {
                ValidationStatus::Pass => "PASS",
                ValidationStatus::Fail => "FAIL",
            },
            self.error_count(),
            self.warning_count()
        )
    }
}

// ============================================================================
// VALIDATION ENGINE
// ============================================================================

pub struct ValidationEngine {
    config: IntakeConfig,
}

impl ValidationEngine {
    pub fn new(config: IntakeConfig) -> Self {
        ValidationEngine { config }
    }

    /// Run all checks in fixed order and seal the quality report.
    ///
    /// Check order: structural findings, sample size, per-column
    /// completeness, outlier ratios (with invalid-value counts), then
    /// configured range bounds. Only ERROR messages flip the status.
    pub fn validate(
        &self,
        dataset: &Dataset,
        profiles: Vec<ColumnProfile>,
        numeric_statistics: Vec<ColumnStatistics>,
        categorical_summaries: Vec<CategoricalSummary>,
    ) -> QualityReport {
        let mut messages = Vec::new();
        let thresholds = &self.config.quality;
        let rows = dataset.row_count();

        // Structural: duplicate header names survive the reader but poison
        // every per-column lookup downstream
        for header in &dataset.duplicate_headers {
            messages.push(
                ValidationMessage::warning(
                    "duplicate_column_name",
                    format!("Column name '{}' appears more than once", header),
                )
                .for_column(header),
            );
        }

        // Check 1: sample size
        if rows < thresholds.min_sample_size {
            messages.push(ValidationMessage::error(
                "sample_size_below_minimum",
                format!(
                    "Sample size {} below minimum {}",
                    rows, thresholds.min_sample_size
                ),
            ));
        } else {
            messages.push(ValidationMessage::info(
                "sample_size_ok",
                format!("Sample size adequate: {}", rows),
            ));
        }

        // Check 2: per-column completeness
        if rows > 0 {
            for profile in &profiles {
                let completeness = 1.0 - profile.missing_count as f64 / rows as f64;
                if completeness < thresholds.min_completeness {
                    messages.push(
                        ValidationMessage::warning(
                            "column_incomplete",
                            format!(
                                "Column '{}' completeness {:.2}% below threshold {:.2}%",
                                profile.name,
                                completeness * 100.0,
                                thresholds.min_completeness * 100.0
                            ),
                        )
                        .for_column(&profile.name),
                    );
                }
            }
        }

        // Check 3: outlier ratio per numeric column, plus coercion failures
        let mut total_outliers = 0usize;
        let mut total_numeric = 0usize;

        for stats in &numeric_statistics {
            total_outliers += stats.outlier_count;
            total_numeric += stats.count;

            let ratio = stats.outlier_ratio();
            if ratio > thresholds.max_outlier_ratio {
                messages.push(
                    ValidationMessage::warning(
                        "outlier_ratio_exceeded",
                        format!(
                            "Column '{}' outlier ratio {:.2}% above threshold {:.2}%",
                            stats.column,
                            ratio * 100.0,
                            thresholds.max_outlier_ratio * 100.0
                        ),
                    )
                    .for_column(&stats.column),
                );
            }

            if stats.invalid_count > 0 {
                messages.push(
                    ValidationMessage::warning(
                        "invalid_numeric_values",
                        format!(
                            "Column '{}' has {} value(s) that failed numeric coercion",
                            stats.column, stats.invalid_count
                        ),
                    )
                    .for_column(&stats.column),
                );
            }
        }

        let dataset_outlier_ratio = if total_numeric > 0 {
            total_outliers as f64 / total_numeric as f64
        } else {
            0.0
        };

        if total_numeric > 0 {
            if dataset_outlier_ratio <= thresholds.max_outlier_ratio {
                messages.push(ValidationMessage::info(
                    "dataset_outlier_ratio_ok",
                    format!(
                        "Overall outlier ratio {:.2}% within threshold {:.2}%",
                        dataset_outlier_ratio * 100.0,
                        thresholds.max_outlier_ratio * 100.0
                    ),
                ));
            } else {
                messages.push(ValidationMessage::warning(
                    "dataset_outlier_ratio_exceeded",
                    format!(
                        "Overall outlier ratio {:.2}% above threshold {:.2}%",
                        dataset_outlier_ratio * 100.0,
                        thresholds.max_outlier_ratio * 100.0
                    ),
                ));
            }
        }

        // Check 4: configured physical range bounds
        for (field, bound) in &self.config.numeric_range_bounds {
            if !dataset.headers.iter().any(|h| h == field) {
                continue;
            }

            let out_of_range = dataset
                .rows
                .iter()
                .filter_map(|row| Dataset::numeric_cell(row, field))
                .filter(|v| !bound.contains(*v))
                .count();

            if out_of_range > 0 {
                messages.push(
                    ValidationMessage::error(
                        "value_out_of_range",
                        format!(
                            "Column '{}' has {} value(s) outside [{}, {}]",
                            field, out_of_range, bound.min, bound.max
                        ),
                    )
                    .for_column(field),
                );
            }
        }

        let quality_score = self.quality_score(dataset, &profiles, dataset_outlier_ratio);

        let validation_status = if messages.iter().any(|m| m.severity == Severity::Error) {
            ValidationStatus::Fail
        } else {
            ValidationStatus::Pass
        };

        QualityReport {
            profiles,
            numeric_statistics,
            categorical_summaries,
            messages,
            quality_score,
            validation_status,
        }
    }

    /// score = 1 − clamp(0.7·missing_ratio + 0.3·outlier_ratio), so the
    /// score never increases when either ratio grows
    fn quality_score(
        &self,
        dataset: &Dataset,
        profiles: &[ColumnProfile],
        outlier_ratio: f64,
    ) -> f64 {
        let total_cells = dataset.row_count() * dataset.column_count();
        let missing_ratio = if total_cells > 0 {
            let missing: usize = profiles.iter().map(|p| p.missing_count).sum();
            missing as f64 / total_cells as f64
        } else {
            0.0
        };

        let penalty = MISSING_WEIGHT * missing_ratio + OUTLIER_WEIGHT * outlier_ratio;
        (1.0 - penalty.clamp(0.0, 1.0)).clamp(0.0, 1.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntakeConfig;
    use crate::profiler::ColumnProfiler;
    use crate::statistics::{categorical_summary, numeric_statistics};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn dataset_from(headers: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset {
            source_path: PathBuf::from("test.csv"),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|cells| {
                    let mut row = HashMap::new();
                    for (h, c) in headers.iter().zip(cells.iter()) {
                        row.insert(h.to_string(), c.to_string());
                    }
                    row
                })
                .collect(),
            duplicate_headers: Vec::new(),
        }
    }

    fn small_config() -> IntakeConfig {
        let mut config = IntakeConfig::default();
        config.quality.min_sample_size = 2;
        config
    }

    fn run_validation(config: IntakeConfig, dataset: &Dataset) -> QualityReport {
        let profiler = ColumnProfiler::new(&config.quality);
        let profiles = profiler.profile_dataset(dataset);

        let mut stats = Vec::new();
        let mut summaries = Vec::new();
        for profile in &profiles {
            let values = dataset.column_values(&profile.name);
            if profile.inferred_type.is_numeric() {
                if let Some(s) = numeric_statistics(&profile.name, &values) {
                    stats.push(s);
                }
            } else {
                summaries.push(categorical_summary(&profile.name, &values));
            }
        }

        ValidationEngine::new(config).validate(dataset, profiles, stats, summaries)
    }

    #[test]
    fn test_clean_dataset_passes() {
        let ds = dataset_from(
            &["chi_amplitude", "phase"],
            &[
                &["0.15", "quiet"],
                &["0.15", "quiet"],
                &["0.15", "pre"],
                &["0.15", "quiet"],
            ],
        );

        let report = run_validation(small_config(), &ds);

        assert!(report.passed());
        assert_eq!(report.error_count(), 0);
        assert!(report.quality_score > 0.99);
    }

    #[test]
    fn test_sample_size_error_fails_validation() {
        let ds = dataset_from(&["chi_amplitude"], &[&["0.15"]]);
        let report = run_validation(small_config(), &ds);

        assert!(!report.passed());
        assert!(report
            .messages
            .iter()
            .any(|m| m.code == "sample_size_below_minimum" && m.severity == Severity::Error));
    }

    #[test]
    fn test_warnings_do_not_fail_validation() {
        // One missing cell in four rows: 75% completeness on that column
        let ds = dataset_from(
            &["chi_amplitude", "phase"],
            &[
                &["0.15", "quiet"],
                &["0.15", ""],
                &["0.15", "quiet"],
                &["0.15", "quiet"],
            ],
        );

        let report = run_validation(small_config(), &ds);

        assert!(report.passed());
        assert!(report
            .messages
            .iter()
            .any(|m| m.code == "column_incomplete" && m.severity == Severity::Warning));
    }

    #[test]
    fn test_range_violation_is_error() {
        // chi_amplitude bound is [0, 1]
        let ds = dataset_from(
            &["chi_amplitude"],
            &[&["0.15"], &["2.5"], &["0.15"], &["0.15"]],
        );

        let report = run_validation(small_config(), &ds);

        assert!(!report.passed());
        let msg = report
            .messages
            .iter()
            .find(|m| m.code == "value_out_of_range")
            .unwrap();
        assert_eq!(msg.severity, Severity::Error);
        assert_eq!(msg.related_column.as_deref(), Some("chi_amplitude"));
    }

    #[test]
    fn test_status_matches_error_presence() {
        let ds = dataset_from(&["chi_amplitude"], &[&["0.15"], &["0.15"]]);
        let report = run_validation(small_config(), &ds);

        let has_error = report
            .messages
            .iter()
            .any(|m| m.severity == Severity::Error);
        assert_eq!(report.passed(), !has_error);
    }

    #[test]
    fn test_messages_keep_evaluation_order() {
        let ds = dataset_from(&["chi_amplitude"], &[&["0.15"], &["3.0"]]);
        let report = run_validation(small_config(), &ds);

        let sample_pos = report
            .messages
            .iter()
            .position(|m| m.code == "sample_size_ok")
            .unwrap();
        let range_pos = report
            .messages
            .iter()
            .position(|m| m.code == "value_out_of_range")
            .unwrap();
        assert!(sample_pos < range_pos);
    }

    #[test]
    fn test_quality_score_decreases_with_missing_ratio() {
        let clean = dataset_from(
            &["a", "b"],
            &[&["1", "x"], &["2", "y"], &["3", "x"], &["4", "y"]],
        );
        let gappy = dataset_from(
            &["a", "b"],
            &[&["1", ""], &["2", ""], &["3", "x"], &["", "y"]],
        );

        let clean_score = run_validation(small_config(), &clean).quality_score;
        let gappy_score = run_validation(small_config(), &gappy).quality_score;

        assert!(clean_score >= gappy_score);
        assert!((0.0..=1.0).contains(&clean_score));
        assert!((0.0..=1.0).contains(&gappy_score));
    }

    #[test]
    fn test_quality_score_decreases_with_outliers() {
        let tight: Vec<Vec<&str>> = vec![
            vec!["10.0"],
            vec!["10.1"],
            vec!["9.9"],
            vec!["10.0"],
            vec!["10.1"],
            vec!["9.9"],
            vec!["10.0"],
            vec!["10.2"],
        ];
        let mut with_outlier = tight.clone();
        with_outlier[7] = vec!["80.0"];

        let tight_rows: Vec<&[&str]> = tight.iter().map(|r| r.as_slice()).collect();
        let outlier_rows: Vec<&[&str]> = with_outlier.iter().map(|r| r.as_slice()).collect();

        let tight_score =
            run_validation(small_config(), &dataset_from(&["a"], &tight_rows)).quality_score;
        let outlier_score =
            run_validation(small_config(), &dataset_from(&["a"], &outlier_rows)).quality_score;

        assert!(tight_score >= outlier_score);
    }

    #[test]
    fn test_duplicate_header_warning() {
        let mut ds = dataset_from(&["a", "a"], &[&["1", "2"], &["3", "4"]]);
        ds.duplicate_headers = vec!["a".to_string()];

        let report = run_validation(small_config(), &ds);
        assert!(report
            .messages
            .iter()
            .any(|m| m.code == "duplicate_column_name"));
    }
}
