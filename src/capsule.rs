// 🔐 Audit Capsules - Hash-verifiable, append-only run records
// One capsule per pipeline run; the ledger only ever grows

use crate::events::EventCapsule;
use crate::validation::{QualityReport, ValidationStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Fixed schema version stamped into every persisted capsule
pub const CAPSULE_SCHEMA_VERSION: &str = "1.0";

const HASH_BLOCK_SIZE: usize = 4096;

/// SHA-256 over the exact bytes of a file, streamed in fixed-size blocks.
/// Failure to hash the input is a fatal condition for the run.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BLOCK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// AUDIT CAPSULE
// ============================================================================

/// Immutable audit record of one intake run. Never edited after persisting;
/// re-running the same file yields a new capsule with a fresh id and
/// timestamp even when the input hash is identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditCapsule {
    pub capsule_id: String,
    pub schema_version: String,
    pub timestamp_utc: DateTime<Utc>,
    pub input_file: String,
    pub input_file_hash: String,
    pub row_count: usize,
    pub column_count: usize,
    pub quality_score: f64,
    pub validation_status: ValidationStatus,
    pub report: QualityReport,
}

impl AuditCapsule {
    pub fn build(
        report: QualityReport,
        input_file: &Path,
        input_file_hash: String,
        row_count: usize,
        column_count: usize,
    ) -> Self {
        AuditCapsule {
            capsule_id: uuid::Uuid::new_v4().to_string(),
            schema_version: CAPSULE_SCHEMA_VERSION.to_string(),
            timestamp_utc: Utc::now(),
            input_file: input_file.display().to_string(),
            input_file_hash,
            row_count,
            column_count,
            quality_score: report.quality_score,
            validation_status: report.validation_status,
            report,
        }
    }
}

// ============================================================================
// CAPSULE LEDGER
// ============================================================================

/// Explicit handle to the append-only capsule store. One JSON record per
/// line; files are opened in append mode and never truncated or rewritten.
pub struct CapsuleLedger {
    root: PathBuf,
}

impl CapsuleLedger {
    const AUDIT_FILE: &'static str = "audit_ledger.jsonl";
    const EVENT_FILE: &'static str = "event_capsules.jsonl";

    /// Open (creating if needed) the ledger directory.
    /// An unwritable directory is a fatal environment failure.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Cannot create ledger directory: {}", root.display()))?;
        Ok(CapsuleLedger { root })
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join(Self::AUDIT_FILE)
    }

    pub fn event_path(&self) -> PathBuf {
        self.root.join(Self::EVENT_FILE)
    }

    pub fn append_audit(&self, capsule: &AuditCapsule) -> Result<()> {
        self.append_record(&self.audit_path(), capsule)?;
        info!(
            capsule_id = %capsule.capsule_id,
            hash = %capsule.input_file_hash,
            "audit capsule appended"
        );
        Ok(())
    }

    pub fn append_event(&self, capsule: &EventCapsule) -> Result<()> {
        self.append_record(&self.event_path(), capsule)?;
        info!(
            capsule_id = %capsule.capsule_id,
            event_type = %capsule.event_type,
            "event capsule appended"
        );
        Ok(())
    }

    fn append_record<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize capsule")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Cannot open ledger file for append: {}", path.display()))?;

        writeln!(file, "{}", json)
            .with_context(|| format!("Cannot append to ledger file: {}", path.display()))?;

        Ok(())
    }

    /// Load every audit capsule currently in the ledger, oldest first
    pub fn read_audit_capsules(&self) -> Result<Vec<AuditCapsule>> {
        let path = self.audit_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read ledger file: {}", path.display()))?;

        let mut capsules = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let capsule: AuditCapsule =
                serde_json::from_str(line).context("Corrupt record in audit ledger")?;
            capsules.push(capsule);
        }

        Ok(capsules)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::QualityReport;

    fn empty_report() -> QualityReport {
        QualityReport {
            profiles: Vec::new(),
            numeric_statistics: Vec::new(),
            categorical_summaries: Vec::new(),
            messages: Vec::new(),
            quality_score: 1.0,
            validation_status: ValidationStatus::Pass,
        }
    }

    #[test]
    fn test_hash_is_deterministic_and_content_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        std::fs::write(&a, "x,y\n1,2\n").unwrap();
        std::fs::write(&b, "x,y\n1,3\n").unwrap();

        let h1 = hash_file(&a).unwrap();
        let h2 = hash_file(&a).unwrap();
        let h3 = hash_file(&b).unwrap();

        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_hash_missing_file_is_error() {
        assert!(hash_file(Path::new("/nonexistent/input.csv")).is_err());
    }

    #[test]
    fn test_rerun_yields_new_capsule_same_hash() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        std::fs::write(&input, "x\n1\n").unwrap();
        let hash = hash_file(&input).unwrap();

        let first = AuditCapsule::build(empty_report(), &input, hash.clone(), 1, 1);
        let second = AuditCapsule::build(empty_report(), &input, hash, 1, 1);

        assert_eq!(first.input_file_hash, second.input_file_hash);
        assert_ne!(first.capsule_id, second.capsule_id);
    }

    #[test]
    fn test_ledger_appends_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CapsuleLedger::open(dir.path().join("capsules")).unwrap();

        let input = dir.path().join("input.csv");
        std::fs::write(&input, "x\n1\n").unwrap();
        let hash = hash_file(&input).unwrap();

        let first = AuditCapsule::build(empty_report(), &input, hash.clone(), 1, 1);
        ledger.append_audit(&first).unwrap();

        // A second ledger handle over the same directory must append, not
        // replace, matching sequential multi-run access
        let reopened = CapsuleLedger::open(dir.path().join("capsules")).unwrap();
        let second = AuditCapsule::build(empty_report(), &input, hash, 1, 1);
        reopened.append_audit(&second).unwrap();

        let capsules = reopened.read_audit_capsules().unwrap();
        assert_eq!(capsules.len(), 2);
        assert_eq!(capsules[0].capsule_id, first.capsule_id);
        assert_eq!(capsules[1].capsule_id, second.capsule_id);
        assert_eq!(capsules[0].schema_version, CAPSULE_SCHEMA_VERSION);
    }

    #[test]
    fn test_unwritable_ledger_root_is_fatal() {
        // A file standing where the directory should go makes create_dir_all fail
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("capsules");
        std::fs::write(&blocker, "not a directory").unwrap();

        assert!(CapsuleLedger::open(&blocker).is_err());
    }
}
