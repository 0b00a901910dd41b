// ⚙️ Intake Configuration - Thresholds as Data
// Quality gates, range bounds, event rule thresholds, and streak bands
// all load from a single JSON document with compiled defaults as fallback

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

// ============================================================================
// QUALITY THRESHOLDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum number of rows before the dataset counts as a real sample
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,

    /// Minimum fraction of non-missing cells per column
    #[serde(default = "default_min_completeness")]
    pub min_completeness: f64,

    /// Maximum fraction of IQR outliers per numeric column
    #[serde(default = "default_max_outlier_ratio")]
    pub max_outlier_ratio: f64,

    /// Coercion fraction below which a column is typed `mixed`
    #[serde(default = "default_min_type_confidence")]
    pub min_type_confidence: f64,

    /// unique/row ratio above which a categorical column is high-cardinality
    #[serde(default = "default_high_cardinality_ratio")]
    pub high_cardinality_ratio: f64,
}

fn default_min_sample_size() -> usize {
    100
}

fn default_min_completeness() -> f64 {
    0.95
}

fn default_max_outlier_ratio() -> f64 {
    0.02
}

fn default_min_type_confidence() -> f64 {
    0.6
}

fn default_high_cardinality_ratio() -> f64 {
    0.5
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            min_sample_size: default_min_sample_size(),
            min_completeness: default_min_completeness(),
            max_outlier_ratio: default_max_outlier_ratio(),
            min_type_confidence: default_min_type_confidence(),
            high_cardinality_ratio: default_high_cardinality_ratio(),
        }
    }
}

// ============================================================================
// RANGE BOUNDS
// ============================================================================

/// Plausible physical range for one measured field
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RangeBound {
    pub min: f64,
    pub max: f64,
}

impl RangeBound {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

fn default_range_bounds() -> BTreeMap<String, RangeBound> {
    let mut bounds = BTreeMap::new();
    bounds.insert(
        "chi_amplitude".to_string(),
        RangeBound { min: 0.0, max: 1.0 },
    );
    bounds.insert(
        "density_p_cm3".to_string(),
        RangeBound {
            min: 0.0,
            max: 100.0,
        },
    );
    bounds.insert(
        "speed_km_s".to_string(),
        RangeBound {
            min: 200.0,
            max: 3000.0,
        },
    );
    bounds.insert(
        "temperature_kK".to_string(),
        RangeBound {
            min: 1.0,
            max: 10_000.0,
        },
    );
    bounds.insert(
        "bz_nT".to_string(),
        RangeBound {
            min: -100.0,
            max: 100.0,
        },
    );
    bounds
}

// ============================================================================
// EVENT RULE THRESHOLDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventThresholds {
    /// HIGH_IMPACT: proton density at or above this (p/cm³)
    #[serde(default = "default_high_impact_density")]
    pub high_impact_density: f64,

    /// HIGH_IMPACT: Bz at or below this (nT, southward)
    #[serde(default = "default_high_impact_bz")]
    pub high_impact_bz: f64,

    /// FLARE: solar wind speed at or above this (km/s)
    #[serde(default = "default_flare_speed")]
    pub flare_speed: f64,

    /// FLARE: proton temperature at or above this (kK)
    #[serde(default = "default_flare_temperature")]
    pub flare_temperature: f64,

    /// CLUFT_DEVIATION: χ amplitude at or above this
    #[serde(default = "default_cluft_chi")]
    pub cluft_chi: f64,
}

fn default_high_impact_density() -> f64 {
    15.0
}

fn default_high_impact_bz() -> f64 {
    -10.0
}

fn default_flare_speed() -> f64 {
    600.0
}

fn default_flare_temperature() -> f64 {
    500.0
}

fn default_cluft_chi() -> f64 {
    0.18
}

impl Default for EventThresholds {
    fn default() -> Self {
        EventThresholds {
            high_impact_density: default_high_impact_density(),
            high_impact_bz: default_high_impact_bz(),
            flare_speed: default_flare_speed(),
            flare_temperature: default_flare_temperature(),
            cluft_chi: default_cluft_chi(),
        }
    }
}

// ============================================================================
// STREAK CLASSIFIER SETTINGS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Target χ amplitude that counts as a lock
    #[serde(default = "default_streak_target")]
    pub target_value: f64,

    /// |observed - target| below this counts as a match
    #[serde(default = "default_streak_tolerance")]
    pub tolerance: f64,

    /// Run length at which the sequence becomes ACTIVE
    #[serde(default = "default_active_after")]
    pub active_after: u32,

    /// Run length at which the sequence becomes SUPERSTREAK
    #[serde(default = "default_superstreak_after")]
    pub superstreak_after: u32,
}

fn default_streak_target() -> f64 {
    0.15
}

fn default_streak_tolerance() -> f64 {
    1e-4
}

fn default_active_after() -> u32 {
    3
}

fn default_superstreak_after() -> u32 {
    18
}

impl Default for StreakConfig {
    fn default() -> Self {
        StreakConfig {
            target_value: default_streak_target(),
            tolerance: default_streak_tolerance(),
            active_after: default_active_after(),
            superstreak_after: default_superstreak_after(),
        }
    }
}

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default = "default_config_version")]
    pub version: String,

    #[serde(default)]
    pub quality: QualityThresholds,

    /// Per-field plausible physical ranges; values outside are validation errors
    #[serde(default = "default_range_bounds")]
    pub numeric_range_bounds: BTreeMap<String, RangeBound>,

    #[serde(default)]
    pub event_rules: EventThresholds,

    #[serde(default)]
    pub streak: StreakConfig,

    /// Directory for the append-only capsule ledgers
    #[serde(default = "default_capsule_dir")]
    pub capsule_dir: PathBuf,

    /// Directory for per-run summary records
    #[serde(default = "default_summary_dir")]
    pub summary_dir: PathBuf,
}

fn default_config_version() -> String {
    "1.0".to_string()
}

fn default_capsule_dir() -> PathBuf {
    PathBuf::from("capsules")
}

fn default_summary_dir() -> PathBuf {
    PathBuf::from("summaries")
}

impl Default for IntakeConfig {
    fn default() -> Self {
        IntakeConfig {
            version: default_config_version(),
            quality: QualityThresholds::default(),
            numeric_range_bounds: default_range_bounds(),
            event_rules: EventThresholds::default(),
            streak: StreakConfig::default(),
            capsule_dir: default_capsule_dir(),
            summary_dir: default_summary_dir(),
        }
    }
}

impl IntakeConfig {
    /// Parse a configuration file, failing on any I/O or syntax problem
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: IntakeConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Load a configuration file, falling back to compiled defaults.
    /// A missing or unparseable config is a recoverable condition, never fatal.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return IntakeConfig::default();
        }

        match IntakeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "invalid config, using defaults");
                IntakeConfig::default()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IntakeConfig::default();

        assert_eq!(config.quality.min_sample_size, 100);
        assert_eq!(config.quality.min_completeness, 0.95);
        assert_eq!(config.streak.active_after, 3);
        assert_eq!(config.streak.superstreak_after, 18);
        assert_eq!(config.event_rules.high_impact_density, 15.0);
        assert!(config.numeric_range_bounds.contains_key("chi_amplitude"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = IntakeConfig::load_or_default("/nonexistent/config.json");
        assert_eq!(config.quality.min_sample_size, 100);
    }

    #[test]
    fn test_invalid_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let config = IntakeConfig::load_or_default(&path);
        assert_eq!(config.quality.max_outlier_ratio, 0.02);
    }

    #[test]
    fn test_partial_config_keeps_defaults_for_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "quality": { "min_sample_size": 5 }, "streak": { "target_value": 0.2 } }"#,
        )
        .unwrap();

        let config = IntakeConfig::from_file(&path).unwrap();
        assert_eq!(config.quality.min_sample_size, 5);
        assert_eq!(config.quality.min_completeness, 0.95);
        assert_eq!(config.streak.target_value, 0.2);
        assert_eq!(config.streak.superstreak_after, 18);
    }

    #[test]
    fn test_range_bound_contains() {
        let bound = RangeBound {
            min: -100.0,
            max: 100.0,
        };
        assert!(bound.contains(0.0));
        assert!(bound.contains(-100.0));
        assert!(bound.contains(100.0));
        assert!(!bound.contains(100.1));
    }
}
