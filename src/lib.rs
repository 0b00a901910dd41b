// Helio Intake - Measurement Quality Audit & Event Capsule Pipeline
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod dataset;
pub mod profiler;
pub mod statistics;
pub mod validation;
pub mod capsule;
pub mod events;
pub mod resilient;
pub mod streak;
pub mod pipeline;

// Re-export commonly used types
pub use config::{EventThresholds, IntakeConfig, QualityThresholds, RangeBound, StreakConfig};
pub use dataset::{is_missing, Dataset};
pub use profiler::{ColumnProfile, ColumnProfiler, ColumnType};
pub use statistics::{
    categorical_summary, numeric_statistics, CategoricalSummary, ColumnStatistics, ValueFrequency,
};
pub use validation::{
    QualityReport, Severity, ValidationEngine, ValidationMessage, ValidationStatus,
};
pub use capsule::{hash_file, AuditCapsule, CapsuleLedger, CAPSULE_SCHEMA_VERSION};
pub use events::{Comparator, Comparison, EventCapsule, EventRule, EventRuleEngine};
pub use resilient::{
    heartbeat_is_placeholder, load_measurement_csv, ChiObservation, LoadOutcome, MagObservation,
    ObservationFile, PlasmaObservation, ResilientLoader, SourceState, HEARTBEAT_HEADERS,
};
pub use streak::{
    extend_with_side_channel, heartbeat_report, DataMode, StreakClassifier, StreakReport,
    StreakStatus,
};
pub use pipeline::{run_intake, run_monitor, IntakeOutcome, MonitorOutcome, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
