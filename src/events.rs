// ⚡ Event Rule Engine - Rules as data over raw measurement rows
// Each rule is a conjunction of field comparisons; one capsule per trigger

use crate::config::EventThresholds;
use crate::dataset::Dataset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::capsule::CAPSULE_SCHEMA_VERSION;

/// Column carrying the observation timestamp in measurement rows
const TIMESTAMP_FIELD: &str = "timestamp_utc";

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// field value ≥ threshold
    Gte,
    /// field value ≤ threshold
    Lte,
}

impl Comparator {
    pub fn symbol(&self) -> &str {
        match self {
            Comparator::Gte => ">=",
            Comparator::Lte => "<=",
        }
    }
}

/// One threshold comparison against a named field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl Comparison {
    pub fn new(field: &str, comparator: Comparator, threshold: f64) -> Self {
        Comparison {
            field: field.to_string(),
            comparator,
            threshold,
        }
    }

    /// A missing or non-numeric field simply fails the comparison
    pub fn holds(&self, row: &HashMap<String, String>) -> bool {
        match Dataset::numeric_cell(row, &self.field) {
            Some(value) => match self.comparator {
                Comparator::Gte => value >= self.threshold,
                Comparator::Lte => value <= self.threshold,
            },
            None => false,
        }
    }

    pub fn render(&self) -> String {
        format!("{} {} {}", self.field, self.comparator.symbol(), self.threshold)
    }
}

/// An event rule: either a plain conjunction of comparisons, or a composite
/// that fires only when every named constituent rule fired on the same row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRule {
    pub event_type: String,
    #[serde(default)]
    pub conditions: Vec<Comparison>,
    /// Non-empty marks this rule as composite
    #[serde(default)]
    pub constituents: Vec<String>,
}

impl EventRule {
    pub fn simple(event_type: &str, conditions: Vec<Comparison>) -> Self {
        EventRule {
            event_type: event_type.to_string(),
            conditions,
            constituents: Vec::new(),
        }
    }

    pub fn composite(event_type: &str, constituents: &[&str]) -> Self {
        EventRule {
            event_type: event_type.to_string(),
            conditions: Vec::new(),
            constituents: constituents.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn is_composite(&self) -> bool {
        !self.constituents.is_empty()
    }

    /// Human-readable predicate, recorded verbatim in emitted capsules
    pub fn expression(&self) -> String {
        if self.is_composite() {
            self.constituents.join(" AND ")
        } else {
            self.conditions
                .iter()
                .map(Comparison::render)
                .collect::<Vec<_>>()
                .join(" AND ")
        }
    }
}

// ============================================================================
// EVENT CAPSULE
// ============================================================================

/// Immutable record of one rule firing on one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCapsule {
    pub capsule_id: String,
    pub schema_version: String,
    pub event_type: String,
    /// The triggering row's timestamp cell, verbatim
    pub triggering_row_timestamp: String,
    /// Values of exactly the fields the predicate read
    pub triggering_values: BTreeMap<String, f64>,
    pub rule_expression: String,
    pub created_utc: DateTime<Utc>,
}

// ============================================================================
// RULE ENGINE
// ============================================================================

pub struct EventRuleEngine {
    rules: Vec<EventRule>,
}

impl EventRuleEngine {
    /// Build the fixed event catalog with thresholds taken from configuration
    pub fn from_config(thresholds: &EventThresholds) -> Self {
        let rules = vec![
            EventRule::simple(
                "HIGH_IMPACT",
                vec![
                    Comparison::new(
                        "density_p_cm3",
                        Comparator::Gte,
                        thresholds.high_impact_density,
                    ),
                    Comparison::new("bz_nT", Comparator::Lte, thresholds.high_impact_bz),
                ],
            ),
            EventRule::simple(
                "FLARE",
                vec![
                    Comparison::new("speed_km_s", Comparator::Gte, thresholds.flare_speed),
                    Comparison::new(
                        "temperature_kK",
                        Comparator::Gte,
                        thresholds.flare_temperature,
                    ),
                ],
            ),
            EventRule::simple(
                "CLUFT_DEVIATION",
                vec![Comparison::new(
                    "chi_amplitude",
                    Comparator::Gte,
                    thresholds.cluft_chi,
                )],
            ),
            EventRule::composite(
                "TRIPLE_COINCIDENCE",
                &["HIGH_IMPACT", "FLARE", "CLUFT_DEVIATION"],
            ),
        ];

        EventRuleEngine { rules }
    }

    pub fn from_rules(rules: Vec<EventRule>) -> Self {
        EventRuleEngine { rules }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate every rule against every row, in row order.
    /// Rules are independent: one row may trigger several event types.
    pub fn scan(&self, dataset: &Dataset) -> Vec<EventCapsule> {
        let mut capsules = Vec::new();

        for row in &dataset.rows {
            let mut fired: HashSet<&str> = HashSet::new();

            // Plain rules first so composites can see what fired on this row
            for rule in self.rules.iter().filter(|r| !r.is_composite()) {
                if !rule.conditions.is_empty() && rule.conditions.iter().all(|c| c.holds(row)) {
                    fired.insert(rule.event_type.as_str());
                    capsules.push(self.capsule_for(rule, row, &rule.conditions));
                }
            }

            for rule in self.rules.iter().filter(|r| r.is_composite()) {
                let all_fired = rule
                    .constituents
                    .iter()
                    .all(|name| fired.contains(name.as_str()));
                if all_fired {
                    let conditions = self.constituent_conditions(rule);
                    capsules.push(self.capsule_for(rule, row, &conditions));
                }
            }
        }

        capsules
    }

    /// All comparisons of a composite's constituent rules
    fn constituent_conditions(&self, composite: &EventRule) -> Vec<Comparison> {
        self.rules
            .iter()
            .filter(|r| composite.constituents.contains(&r.event_type))
            .flat_map(|r| r.conditions.iter().cloned())
            .collect()
    }

    fn capsule_for(
        &self,
        rule: &EventRule,
        row: &HashMap<String, String>,
        conditions: &[Comparison],
    ) -> EventCapsule {
        let mut triggering_values = BTreeMap::new();
        for condition in conditions {
            if let Some(value) = Dataset::numeric_cell(row, &condition.field) {
                triggering_values.insert(condition.field.clone(), value);
            }
        }

        EventCapsule {
            capsule_id: uuid::Uuid::new_v4().to_string(),
            schema_version: CAPSULE_SCHEMA_VERSION.to_string(),
            event_type: rule.event_type.clone(),
            triggering_row_timestamp: row.get(TIMESTAMP_FIELD).cloned().unwrap_or_default(),
            triggering_values,
            rule_expression: rule.expression(),
            created_utc: Utc::now(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventThresholds;
    use std::path::PathBuf;

    fn heartbeat_dataset(rows: Vec<Vec<(&str, &str)>>) -> Dataset {
        let headers = vec![
            "timestamp_utc".to_string(),
            "chi_amplitude".to_string(),
            "density_p_cm3".to_string(),
            "temperature_kK".to_string(),
            "speed_km_s".to_string(),
            "bz_nT".to_string(),
        ];
        Dataset {
            source_path: PathBuf::from("heartbeat.csv"),
            headers,
            rows: rows
                .into_iter()
                .map(|cells| {
                    cells
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
                .collect(),
            duplicate_headers: Vec::new(),
        }
    }

    fn engine() -> EventRuleEngine {
        EventRuleEngine::from_config(&EventThresholds::default())
    }

    #[test]
    fn test_high_impact_fires_alone() {
        // density ≥ 15 and Bz ≤ −10, but no flare or χ deviation
        let ds = heartbeat_dataset(vec![vec![
            ("timestamp_utc", "2025-12-16 10:00:00"),
            ("chi_amplitude", "0.15"),
            ("density_p_cm3", "16.49"),
            ("temperature_kK", "100.0"),
            ("speed_km_s", "400.0"),
            ("bz_nT", "-14.35"),
        ]]);

        let capsules = engine().scan(&ds);

        assert_eq!(capsules.len(), 1);
        let capsule = &capsules[0];
        assert_eq!(capsule.event_type, "HIGH_IMPACT");
        assert_eq!(capsule.triggering_row_timestamp, "2025-12-16 10:00:00");
        assert_eq!(capsule.triggering_values["density_p_cm3"], 16.49);
        assert_eq!(capsule.triggering_values["bz_nT"], -14.35);
        assert!(capsule.rule_expression.contains("density_p_cm3 >= 15"));
    }

    #[test]
    fn test_quiet_row_emits_nothing() {
        let ds = heartbeat_dataset(vec![vec![
            ("timestamp_utc", "2025-12-16 10:00:00"),
            ("chi_amplitude", "0.15"),
            ("density_p_cm3", "2.5"),
            ("temperature_kK", "100.0"),
            ("speed_km_s", "400.0"),
            ("bz_nT", "-2.0"),
        ]]);

        assert!(engine().scan(&ds).is_empty());
    }

    #[test]
    fn test_triple_coincidence_needs_all_constituents() {
        // All three plain rules fire: expect those three plus the composite
        let ds = heartbeat_dataset(vec![vec![
            ("timestamp_utc", "2025-12-16 10:00:00"),
            ("chi_amplitude", "0.21"),
            ("density_p_cm3", "18.0"),
            ("temperature_kK", "750.0"),
            ("speed_km_s", "820.0"),
            ("bz_nT", "-12.0"),
        ]]);

        let capsules = engine().scan(&ds);
        let types: Vec<&str> = capsules.iter().map(|c| c.event_type.as_str()).collect();

        assert_eq!(capsules.len(), 4);
        assert!(types.contains(&"HIGH_IMPACT"));
        assert!(types.contains(&"FLARE"));
        assert!(types.contains(&"CLUFT_DEVIATION"));
        assert!(types.contains(&"TRIPLE_COINCIDENCE"));
    }

    #[test]
    fn test_two_of_three_does_not_fire_composite() {
        // HIGH_IMPACT and CLUFT_DEVIATION but no FLARE
        let ds = heartbeat_dataset(vec![vec![
            ("timestamp_utc", "2025-12-16 10:00:00"),
            ("chi_amplitude", "0.21"),
            ("density_p_cm3", "18.0"),
            ("temperature_kK", "100.0"),
            ("speed_km_s", "400.0"),
            ("bz_nT", "-12.0"),
        ]]);

        let capsules = engine().scan(&ds);
        let types: Vec<&str> = capsules.iter().map(|c| c.event_type.as_str()).collect();

        assert_eq!(capsules.len(), 2);
        assert!(!types.contains(&"TRIPLE_COINCIDENCE"));
    }

    #[test]
    fn test_composite_capsule_carries_constituent_fields() {
        let ds = heartbeat_dataset(vec![vec![
            ("timestamp_utc", "2025-12-16 10:00:00"),
            ("chi_amplitude", "0.21"),
            ("density_p_cm3", "18.0"),
            ("temperature_kK", "750.0"),
            ("speed_km_s", "820.0"),
            ("bz_nT", "-12.0"),
        ]]);

        let capsules = engine().scan(&ds);
        let triple = capsules
            .iter()
            .find(|c| c.event_type == "TRIPLE_COINCIDENCE")
            .unwrap();

        assert_eq!(triple.triggering_values.len(), 5);
        assert!(triple.triggering_values.contains_key("chi_amplitude"));
        assert!(triple.triggering_values.contains_key("speed_km_s"));
        assert_eq!(triple.rule_expression, "HIGH_IMPACT AND FLARE AND CLUFT_DEVIATION");
    }

    #[test]
    fn test_missing_field_fails_comparison_quietly() {
        let ds = heartbeat_dataset(vec![vec![
            ("timestamp_utc", "2025-12-16 10:00:00"),
            ("chi_amplitude", "not-a-number"),
            ("density_p_cm3", ""),
            ("temperature_kK", "750.0"),
            ("speed_km_s", "820.0"),
            ("bz_nT", "-12.0"),
        ]]);

        let capsules = engine().scan(&ds);
        let types: Vec<&str> = capsules.iter().map(|c| c.event_type.as_str()).collect();

        // Only FLARE has both of its fields present and numeric
        assert_eq!(types, vec!["FLARE"]);
    }

    #[test]
    fn test_each_triggering_row_gets_its_own_capsule() {
        let hot = vec![
            ("timestamp_utc", "2025-12-16 10:00:00"),
            ("chi_amplitude", "0.15"),
            ("density_p_cm3", "16.0"),
            ("temperature_kK", "100.0"),
            ("speed_km_s", "400.0"),
            ("bz_nT", "-11.0"),
        ];
        let mut later = hot.clone();
        later[0] = ("timestamp_utc", "2025-12-16 11:00:00");

        let ds = heartbeat_dataset(vec![hot, later]);
        let capsules = engine().scan(&ds);

        assert_eq!(capsules.len(), 2);
        assert_ne!(capsules[0].capsule_id, capsules[1].capsule_id);
        assert_ne!(
            capsules[0].triggering_row_timestamp,
            capsules[1].triggering_row_timestamp
        );
    }
}
