// Streak Classifier - Run-length state machine over χ amplitude locks
// QUIET below 3 consecutive matches, ACTIVE from 3, SUPERSTREAK from 18

use crate::config::StreakConfig;
use crate::dataset::Dataset;
use crate::resilient::{heartbeat_is_placeholder, ChiObservation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreakStatus {
    Quiet,
    Active,
    Superstreak,
}

impl StreakStatus {
    pub fn name(&self) -> &str {
        match self {
            StreakStatus::Quiet => "QUIET",
            StreakStatus::Active => "ACTIVE",
            StreakStatus::Superstreak => "SUPERSTREAK",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StreakState {
    pub current_run_length: u32,
    pub status: StreakStatus,
    pub last_value: Option<f64>,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Incremental streak state machine. No terminal state: status escalates and
/// de-escalates freely as observations arrive, for the life of the session.
pub struct StreakClassifier {
    target_value: f64,
    tolerance: f64,
    active_after: u32,
    superstreak_after: u32,
    state: StreakState,
}

impl StreakClassifier {
    pub fn new(config: &StreakConfig) -> Self {
        StreakClassifier {
            target_value: config.target_value,
            tolerance: config.tolerance,
            active_after: config.active_after,
            superstreak_after: config.superstreak_after,
            state: StreakState {
                current_run_length: 0,
                status: StreakStatus::Quiet,
                last_value: None,
            },
        }
    }

    pub fn state(&self) -> &StreakState {
        &self.state
    }

    /// Feed one observation and return the post-transition status
    pub fn observe(&mut self, value: f64) -> StreakStatus {
        if (value - self.target_value).abs() < self.tolerance {
            self.state.current_run_length += 1;
        } else {
            self.state.current_run_length = 0;
        }
        self.state.last_value = Some(value);
        self.state.status = self.status_for(self.state.current_run_length);

        debug!(
            value,
            run_length = self.state.current_run_length,
            status = self.state.status.name(),
            "streak observation"
        );

        self.state.status
    }

    pub fn observe_all<I: IntoIterator<Item = f64>>(&mut self, values: I) -> StreakStatus {
        for value in values {
            self.observe(value);
        }
        self.state.status
    }

    fn status_for(&self, run_length: u32) -> StreakStatus {
        if run_length >= self.superstreak_after {
            StreakStatus::Superstreak
        } else if run_length >= self.active_after {
            StreakStatus::Active
        } else {
            StreakStatus::Quiet
        }
    }
}

// ============================================================================
// HEARTBEAT REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataMode {
    Real,
    Placeholder,
}

/// Streak analysis of one heartbeat dataset plus latest-row context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakReport {
    pub status: StreakStatus,
    pub current_run_length: u32,
    pub total_observations: usize,
    pub latest_value: Option<f64>,
    pub latest_timestamp: Option<String>,
    pub data_mode: DataMode,
}

/// Run the classifier over a heartbeat dataset's χ column in row order.
/// Rows without a numeric χ cell are skipped rather than treated as misses.
pub fn heartbeat_report(dataset: &Dataset, classifier: &mut StreakClassifier) -> StreakReport {
    let mut observed = 0usize;
    for row in &dataset.rows {
        if let Some(chi) = Dataset::numeric_cell(row, "chi_amplitude") {
            classifier.observe(chi);
            observed += 1;
        }
    }

    let state = classifier.state();
    let latest_timestamp = dataset
        .rows
        .last()
        .and_then(|row| row.get("timestamp_utc"))
        .cloned();

    let report = StreakReport {
        status: state.status,
        current_run_length: state.current_run_length,
        total_observations: observed,
        latest_value: state.last_value,
        latest_timestamp,
        data_mode: if heartbeat_is_placeholder(dataset) {
            DataMode::Placeholder
        } else {
            DataMode::Real
        },
    };

    info!(
        status = report.status.name(),
        run_length = report.current_run_length,
        observations = report.total_observations,
        "heartbeat streak analysis complete"
    );

    report
}

/// Fold the side-channel's freshest χ readings into an existing report.
/// These arrive after the heartbeat backlog, so they extend (or break) the
/// current run rather than restarting the machine.
pub fn extend_with_side_channel(
    report: &mut StreakReport,
    classifier: &mut StreakClassifier,
    observations: &[ChiObservation],
) {
    if observations.is_empty() {
        return;
    }

    for obs in observations {
        classifier.observe(obs.chi_amplitude);
    }

    let state = classifier.state();
    report.status = state.status;
    report.current_run_length = state.current_run_length;
    report.total_observations += observations.len();
    report.latest_value = state.last_value;
    if let Some(last) = observations.last() {
        report.latest_timestamp = Some(last.timestamp.clone());
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreakConfig;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn classifier() -> StreakClassifier {
        StreakClassifier::new(&StreakConfig::default())
    }

    #[test]
    fn test_starts_quiet() {
        let c = classifier();
        assert_eq!(c.state().status, StreakStatus::Quiet);
        assert_eq!(c.state().current_run_length, 0);
        assert_eq!(c.state().last_value, None);
    }

    #[test]
    fn test_two_matches_stay_quiet_third_goes_active() {
        let mut c = classifier();
        assert_eq!(c.observe(0.15), StreakStatus::Quiet);
        assert_eq!(c.observe(0.15), StreakStatus::Quiet);
        assert_eq!(c.observe(0.15), StreakStatus::Active);
    }

    #[test]
    fn test_seventeen_matches_active_eighteenth_superstreak() {
        let mut c = classifier();
        for _ in 0..17 {
            assert_ne!(c.observe(0.15), StreakStatus::Superstreak);
        }
        assert_eq!(c.state().status, StreakStatus::Active);

        // The 18th consecutive match flips status on that same call
        assert_eq!(c.observe(0.15), StreakStatus::Superstreak);
        assert_eq!(c.state().current_run_length, 18);
    }

    #[test]
    fn test_miss_resets_to_quiet() {
        let mut c = classifier();
        for _ in 0..10 {
            c.observe(0.15);
        }
        assert_eq!(c.state().status, StreakStatus::Active);

        assert_eq!(c.observe(0.20), StreakStatus::Quiet);
        assert_eq!(c.state().current_run_length, 0);
        assert_eq!(c.state().last_value, Some(0.20));

        // The machine is not terminal; it can climb again
        c.observe(0.15);
        c.observe(0.15);
        assert_eq!(c.observe(0.15), StreakStatus::Active);
    }

    #[test]
    fn test_observe_all_folds_sequence() {
        let mut c = classifier();
        let status = c.observe_all([0.15, 0.15, 0.15, 0.15]);
        assert_eq!(status, StreakStatus::Active);
        assert_eq!(c.state().current_run_length, 4);
    }

    #[test]
    fn test_tolerance_window() {
        let mut c = classifier();
        c.observe(0.15005);
        assert_eq!(c.state().current_run_length, 1);

        c.observe(0.1502);
        assert_eq!(c.state().current_run_length, 0);
    }

    #[test]
    fn test_superstreak_deescalates_after_miss() {
        let mut c = classifier();
        for _ in 0..20 {
            c.observe(0.15);
        }
        assert_eq!(c.state().status, StreakStatus::Superstreak);

        assert_eq!(c.observe(0.0), StreakStatus::Quiet);
    }

    fn heartbeat_rows(chis: &[&str], source: &str) -> Dataset {
        let headers = vec![
            "timestamp_utc".to_string(),
            "chi_amplitude".to_string(),
            "source".to_string(),
        ];
        let rows = chis
            .iter()
            .enumerate()
            .map(|(i, chi)| {
                let mut row = HashMap::new();
                row.insert(
                    "timestamp_utc".to_string(),
                    format!("2025-12-16 {:02}:00:00", i),
                );
                row.insert("chi_amplitude".to_string(), chi.to_string());
                row.insert("source".to_string(), source.to_string());
                row
            })
            .collect();
        Dataset {
            source_path: PathBuf::from("heartbeat.csv"),
            headers,
            rows,
            duplicate_headers: Vec::new(),
        }
    }

    #[test]
    fn test_heartbeat_report_counts_trailing_run() {
        let ds = heartbeat_rows(&["0.134", "0.15", "0.15", "0.15"], "ACE");
        let mut c = classifier();
        let report = heartbeat_report(&ds, &mut c);

        assert_eq!(report.status, StreakStatus::Active);
        assert_eq!(report.current_run_length, 3);
        assert_eq!(report.total_observations, 4);
        assert_eq!(report.latest_value, Some(0.15));
        assert_eq!(
            report.latest_timestamp.as_deref(),
            Some("2025-12-16 03:00:00")
        );
        assert_eq!(report.data_mode, DataMode::Real);
    }

    #[test]
    fn test_heartbeat_report_flags_placeholder_data() {
        let ds = heartbeat_rows(&["0.15", "0.15"], "PLACEHOLDER");
        let mut c = classifier();
        let report = heartbeat_report(&ds, &mut c);

        assert_eq!(report.data_mode, DataMode::Placeholder);
    }

    #[test]
    fn test_side_channel_extends_current_run() {
        let ds = heartbeat_rows(&["0.15", "0.15"], "ACE");
        let mut c = classifier();
        let mut report = heartbeat_report(&ds, &mut c);
        assert_eq!(report.status, StreakStatus::Quiet);

        let fresh = vec![ChiObservation {
            timestamp: "2025-12-16 04:00:00".to_string(),
            chi_amplitude: 0.15,
            quality_flag: "NOMINAL".to_string(),
        }];
        extend_with_side_channel(&mut report, &mut c, &fresh);

        assert_eq!(report.status, StreakStatus::Active);
        assert_eq!(report.current_run_length, 3);
        assert_eq!(report.total_observations, 3);
        assert_eq!(
            report.latest_timestamp.as_deref(),
            Some("2025-12-16 04:00:00")
        );
    }

    #[test]
    fn test_side_channel_miss_breaks_run() {
        let ds = heartbeat_rows(&["0.15", "0.15", "0.15"], "ACE");
        let mut c = classifier();
        let mut report = heartbeat_report(&ds, &mut c);
        assert_eq!(report.status, StreakStatus::Active);

        let fresh = vec![ChiObservation {
            timestamp: "2025-12-16 04:00:00".to_string(),
            chi_amplitude: 0.30,
            quality_flag: "NOMINAL".to_string(),
        }];
        extend_with_side_channel(&mut report, &mut c, &fresh);

        assert_eq!(report.status, StreakStatus::Quiet);
        assert_eq!(report.current_run_length, 0);
        assert_eq!(report.latest_value, Some(0.30));
    }

    #[test]
    fn test_heartbeat_report_skips_non_numeric_cells() {
        let ds = heartbeat_rows(&["0.15", "bad", "0.15"], "ACE");
        let mut c = classifier();
        let report = heartbeat_report(&ds, &mut c);

        assert_eq!(report.total_observations, 2);
        assert_eq!(report.current_run_length, 2);
    }
}
