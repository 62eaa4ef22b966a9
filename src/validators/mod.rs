//! Validation framework: findings, the shared validator contract, and the
//! run context.
//!
//! Validators are a closed set of tagged variants behind one trait, held
//! in declaration order by the runner. Each run loads the registry into a
//! `StoreSnapshot` once, so validators never interleave live reads with a
//! concurrent writer. All validators are read-only.

pub mod adr;
pub mod debt;
pub mod freshness;
pub mod runner;
pub mod snapshot;

use crate::core::adr::{AdrLink, AdrRecord};
use crate::core::config::ValidationConfig;
use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::registry::{DependencyEdge, SystemRecord};
use crate::core::store::Store;
use crate::core::time;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Keyed remediation request attached to a fixable finding.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct FixRequest {
    pub fix_id: String,
    /// Fix parameters, e.g. the system path for `missing_snapshot`.
    pub params: Vec<(String, String)>,
}

/// One structured validator output.
#[derive(Debug, Serialize, Clone)]
pub struct Finding {
    /// Check that raised the finding, e.g. `unresolved_dependency`.
    pub code: String,
    pub severity: Severity,
    pub message: String,
    /// System path or ADR id the finding is anchored to.
    pub system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Remediation hint; always present on errors.
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixRequest>,
}

impl Finding {
    pub fn error(code: &str, system: &str, message: String, hint: &str) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            message,
            system: system.to_string(),
            file: None,
            hint: hint.to_string(),
            fix: None,
        }
    }

    pub fn warning(code: &str, system: &str, message: String, hint: &str) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, system, message, hint)
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_fix(mut self, fix_id: &str, params: Vec<(String, String)>) -> Self {
        self.fix = Some(FixRequest {
            fix_id: fix_id.to_string(),
            params,
        });
        self
    }

    pub fn fixable(&self) -> bool {
        self.fix.is_some()
    }
}

/// Result of one validator run: ordered errors and warnings.
#[derive(Debug, Serialize, Clone)]
pub struct ValidatorOutcome {
    pub name: String,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub checked: usize,
}

impl ValidatorOutcome {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
            checked: 0,
        }
    }

    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
        }
    }
}

/// Registry contents loaded once at run start.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub systems: Vec<SystemRecord>,
    pub dependencies: Vec<DependencyEdge>,
    pub adrs: Vec<AdrRecord>,
    pub links: Vec<AdrLink>,
}

impl StoreSnapshot {
    /// Load all collections in one pass. Registry failures here are
    /// infrastructure failures, not validation findings.
    pub fn load(session: &Session) -> Result<Self, DocPulseError> {
        let lift = |e: DocPulseError| {
            DocPulseError::Infrastructure(format!("cannot read registry: {}", e))
        };
        Ok(Self {
            systems: crate::core::registry::list_systems(session).map_err(lift)?,
            dependencies: crate::core::registry::list_dependencies(session).map_err(lift)?,
            adrs: crate::core::adr::list_adrs(session, None).map_err(lift)?,
            links: crate::core::adr::list_links(session).map_err(lift)?,
        })
    }

    pub fn has_system(&self, path: &str) -> bool {
        self.systems.iter().any(|s| s.path == path)
    }

    /// Registry update watermark across systems and ADRs.
    pub fn watermark(&self) -> Option<String> {
        self.systems
            .iter()
            .map(|s| s.updated_at.as_str())
            .chain(self.adrs.iter().map(|a| a.updated_at.as_str()))
            .max()
            .map(|s| s.to_string())
    }
}

/// External collaborator supplying modification instants.
///
/// Version-control metadata is preferred over filesystem mtimes, since
/// checkouts reset the latter; tests substitute a fixed provider.
pub trait SourceTimes: Send + Sync {
    /// Last-modified instant of one file, or None if it does not exist.
    fn file_instant(&self, path: &Path) -> Option<DateTime<Utc>>;

    /// Latest modification instant among a system's source files
    /// (excluding its documentation bundle).
    fn latest_source_instant(&self, system_dir: &Path) -> Option<DateTime<Utc>>;
}

const SOURCE_EXTENSIONS: [&str; 24] = [
    "ts", "tsx", "js", "jsx", "py", "rs", "go", "java", "kt", "swift", "c", "cpp", "h", "hpp",
    "cs", "rb", "php", "vue", "svelte", "json", "yaml", "yml", "sh", "sql",
];

/// Default provider: git commit timestamps with filesystem fallback.
pub struct RepoTimes {
    pub project_root: PathBuf,
}

impl RepoTimes {
    pub fn new(store: &Store) -> Self {
        Self {
            project_root: store.root.clone(),
        }
    }

    fn git_instant(&self, path: &Path) -> Option<DateTime<Utc>> {
        let output = Command::new("git")
            .args(["log", "-1", "--format=%ai", "--"])
            .arg(path)
            .current_dir(&self.project_root)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let raw = String::from_utf8_lossy(&output.stdout);
        time::parse_timestamp(raw.trim())
    }

    fn fs_instant(path: &Path) -> Option<DateTime<Utc>> {
        let modified = path.metadata().ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    fn collect_source_files(dir: &Path, out: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if path.is_dir() {
                if name == crate::core::store::PULSE_DIR || name == ".git" || name == "target" {
                    continue;
                }
                Self::collect_source_files(&path, out);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
            {
                out.push(path);
            }
        }
    }
}

impl SourceTimes for RepoTimes {
    fn file_instant(&self, path: &Path) -> Option<DateTime<Utc>> {
        if !path.exists() {
            return None;
        }
        self.git_instant(path).or_else(|| Self::fs_instant(path))
    }

    fn latest_source_instant(&self, system_dir: &Path) -> Option<DateTime<Utc>> {
        use rayon::prelude::*;

        let mut files = Vec::new();
        Self::collect_source_files(system_dir, &mut files);
        files
            .par_iter()
            .filter_map(|path| self.file_instant(path))
            .max()
    }
}

/// Everything a validator is allowed to see.
pub struct ValidationContext {
    pub store: Store,
    pub snapshot: StoreSnapshot,
    pub config: ValidationConfig,
    /// Instant the run started; all age math uses this, not repeated
    /// wall-clock reads.
    pub now: DateTime<Utc>,
    pub times: Arc<dyn SourceTimes>,
}

impl ValidationContext {
    pub fn bundle_dir(&self, system_path: &str) -> PathBuf {
        self.store.bundle_dir(system_path)
    }
}

/// Shared validator contract. Implementations are read-only.
pub trait Validator: Send {
    fn name(&self) -> &'static str;
    fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, DocPulseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_builders() {
        let f = Finding::error("broken_reference", "ADR-001", "gone".into(), "restore it")
            .with_file("x.md")
            .with_fix("missing_snapshot", vec![("system".into(), "a".into())]);
        assert_eq!(f.severity, Severity::Error);
        assert!(f.fixable());
        assert_eq!(f.file.as_deref(), Some("x.md"));
    }

    #[test]
    fn test_outcome_routes_by_severity() {
        let mut outcome = ValidatorOutcome::new("t");
        outcome.push(Finding::error("a", "s", "m".into(), "h"));
        outcome.push(Finding::warning("b", "s", "m".into(), "h"));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_snapshot_watermark_spans_adrs() {
        let mut snapshot = StoreSnapshot::default();
        snapshot.systems.push(SystemRecord {
            path: "a".into(),
            name: "A".into(),
            description: None,
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        });
        snapshot.adrs.push(AdrRecord {
            id: "ADR-001".into(),
            title: "t".into(),
            status: "accepted".into(),
            file_path: "f".into(),
            context: None,
            decision: None,
            consequences: None,
            supersedes: None,
            superseded_by: None,
            created_at: "2025-02-01T00:00:00Z".into(),
            updated_at: "2025-02-01T00:00:00Z".into(),
        });
        assert_eq!(snapshot.watermark().unwrap(), "2025-02-01T00:00:00Z");
    }
}
