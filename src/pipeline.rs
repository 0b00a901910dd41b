// 🚀 Pipeline Orchestration - One invocation, start to finish
// intake: hash → load → profile → validate → audit → event scan
// monitor: resilient loads → latest observations → streak → run summary

use crate::capsule::{hash_file, AuditCapsule, CapsuleLedger};
use crate::config::IntakeConfig;
use crate::events::{EventCapsule, EventRuleEngine};
use crate::profiler::ColumnProfiler;
use crate::resilient::{
    load_measurement_csv, MagObservation, ObservationFile, PlasmaObservation, ResilientLoader,
    SourceState,
};
use crate::statistics::{categorical_summary, numeric_statistics};
use crate::streak::{
    extend_with_side_channel, heartbeat_report, DataMode, StreakClassifier, StreakReport,
};
use crate::validation::ValidationEngine;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// INTAKE
// ============================================================================

/// Everything one intake run produced, for display and tests;
/// the durable records are already in the ledger by the time this returns
#[derive(Debug)]
pub struct IntakeOutcome {
    pub audit: AuditCapsule,
    pub events: Vec<EventCapsule>,
    pub source_state: SourceState,
    pub recovered: bool,
}

/// Run the full intake pipeline over one measurement CSV.
/// Recoverable input defects heal inside the resilient layer; the only
/// error paths left are fatal environment failures.
pub fn run_intake(input: &Path, config: &IntakeConfig) -> Result<IntakeOutcome> {
    info!(input = %input.display(), "intake run starting");

    let loaded = load_measurement_csv(input)?;
    let dataset = loaded.data;

    // Hash after recovery so the capsule covers the exact bytes processed
    let input_file_hash = hash_file(input)?;

    let profiler = ColumnProfiler::new(&config.quality);
    let profiles = profiler.profile_dataset(&dataset);

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

    let engine = ValidationEngine::new(config.clone());
    let report = engine.validate(&dataset, profiles, stats, summaries);

    info!(
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        score = report.quality_score,
        passed = report.passed(),
        "dataset validated"
    );

    let ledger = CapsuleLedger::open(&config.capsule_dir)?;

    let audit = AuditCapsule::build(
        report,
        input,
        input_file_hash,
        dataset.row_count(),
        dataset.column_count(),
    );
    ledger.append_audit(&audit)?;

    let rule_engine = EventRuleEngine::from_config(&config.event_rules);
    let events = rule_engine.scan(&dataset);
    for event in &events {
        ledger.append_event(event)?;
    }

    info!(
        capsule_id = %audit.capsule_id,
        events = events.len(),
        "intake run complete"
    );

    Ok(IntakeOutcome {
        audit,
        events,
        source_state: loaded.source_state,
        recovered: loaded.recovered,
    })
}

// ============================================================================
// MONITOR
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlasmaSnapshot {
    pub density: f64,
    pub speed: f64,
    pub temperature: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagSnapshot {
    pub bx: f64,
    pub by: f64,
    pub bz: f64,
    pub bt: f64,
    pub timestamp: String,
}

/// Probe result for one source, kept in the run summary as the audit trail
/// of what recovery did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source: String,
    pub state: SourceState,
    pub recovered: bool,
}

/// Per-run monitoring record persisted to the summaries directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp_utc: DateTime<Utc>,
    pub data_mode: DataMode,
    pub plasma: Option<PlasmaSnapshot>,
    pub magnetic_field: Option<MagSnapshot>,
    pub streak: StreakReport,
    pub sources: Vec<SourceStatus>,
}

#[derive(Debug)]
pub struct MonitorOutcome {
    pub summary: RunSummary,
    pub summary_path: PathBuf,
}

fn plasma_snapshot(file: &ObservationFile<PlasmaObservation>) -> Option<PlasmaSnapshot> {
    file.latest().map(|obs| PlasmaSnapshot {
        density: obs.proton_density,
        speed: obs.proton_speed,
        temperature: obs.proton_temperature,
        timestamp: obs.timestamp.clone(),
    })
}

fn mag_snapshot(file: &ObservationFile<MagObservation>) -> Option<MagSnapshot> {
    file.latest().map(|obs| MagSnapshot {
        bx: obs.bx_gsm,
        by: obs.by_gsm,
        bz: obs.bz_gsm,
        bt: obs.bt,
        timestamp: obs.timestamp.clone(),
    })
}

/// Run the monitoring pipeline: every source loads resiliently, the streak
/// classifier consumes the heartbeat χ column, and a summary record lands in
/// the summaries directory. Recovered sources still mean a successful run.
pub fn run_monitor(data_dir: &Path, config: &IntakeConfig) -> Result<MonitorOutcome> {
    info!(data_dir = %data_dir.display(), "monitor run starting");

    let loader = ResilientLoader::new(data_dir)?;

    let plasma = loader.load_plasma()?;
    let mag = loader.load_mag()?;
    let heartbeat = loader.load_heartbeat()?;
    let chi = loader.load_chi()?;

    let mut classifier = StreakClassifier::new(&config.streak);
    let mut streak = heartbeat_report(&heartbeat.data, &mut classifier);
    extend_with_side_channel(&mut streak, &mut classifier, &chi.data.observations);

    let any_placeholder = plasma.recovered
        || mag.recovered
        || heartbeat.recovered
        || chi.recovered
        || plasma.data.is_placeholder()
        || mag.data.is_placeholder()
        || chi.data.is_placeholder()
        || streak.data_mode == DataMode::Placeholder;

    let summary = RunSummary {
        timestamp_utc: Utc::now(),
        data_mode: if any_placeholder {
            DataMode::Placeholder
        } else {
            DataMode::Real
        },
        plasma: plasma_snapshot(&plasma.data),
        magnetic_field: mag_snapshot(&mag.data),
        streak,
        sources: vec![
            SourceStatus {
                source: "plasma".to_string(),
                state: plasma.source_state,
                recovered: plasma.recovered,
            },
            SourceStatus {
                source: "magnetometer".to_string(),
                state: mag.source_state,
                recovered: mag.recovered,
            },
            SourceStatus {
                source: "heartbeat".to_string(),
                state: heartbeat.source_state,
                recovered: heartbeat.recovered,
            },
            SourceStatus {
                source: "chi_side_channel".to_string(),
                state: chi.source_state,
                recovered: chi.recovered,
            },
        ],
    };

    fs::create_dir_all(&config.summary_dir).with_context(|| {
        format!(
            "Cannot create summary directory: {}",
            config.summary_dir.display()
        )
    })?;

    let summary_path = config.summary_dir.join(format!(
        "run_summary_{}.json",
        summary.timestamp_utc.format("%Y%m%d_%H%M%S")
    ));
    let json = serde_json::to_string_pretty(&summary).context("Cannot serialize run summary")?;
    fs::write(&summary_path, json)
        .with_context(|| format!("Cannot write run summary: {}", summary_path.display()))?;

    info!(
        summary = %summary_path.display(),
        status = summary.streak.status.name(),
        "monitor run complete"
    );

    Ok(MonitorOutcome {
        summary,
        summary_path,
    })
}

// ============================================================================
// TESTS
// ============================================================================
