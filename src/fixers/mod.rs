//! Auto-remediation: a keyed fix catalogue over validation reports.
//!
//! `plan` is a pure preview over a report's fixable findings (no I/O);
//! `apply` performs the writes, one isolated result per planned fix.
//! Every fix is idempotent: re-applying a plan against unchanged state
//! produces no further writes, so retries are always safe.

pub mod graph;
pub mod snapshot;

use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::store::Store;
use crate::core::time;
use crate::fixers::graph::GraphFixer;
use crate::fixers::snapshot::SnapshotFixer;
use crate::validators::runner::Report;
use serde::Serialize;
use std::collections::BTreeMap;
use ulid::Ulid;

/// One remediation to perform, derived from a fixable finding.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct PlannedFix {
    pub fix_id: String,
    /// System path or artifact the fix targets.
    pub target: String,
    pub description: String,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    /// Files were written.
    Applied,
    /// Target already in the desired state; nothing written.
    Skipped,
    /// The fix's own I/O failed; other fixes still ran.
    Failed,
}

#[derive(Debug, Serialize, Clone)]
pub struct FixResult {
    pub fix_id: String,
    pub target: String,
    pub status: FixStatus,
    pub message: String,
    pub files_modified: Vec<String>,
}

/// A single keyed fix implementation.
pub trait Fix {
    fn fix_id(&self) -> &'static str;
    fn describe(&self, fix: &PlannedFix) -> String;
    fn apply(
        &self,
        session: &mut Session,
        store: &Store,
        fix: &PlannedFix,
    ) -> Result<FixResult, DocPulseError>;
}

/// Registry of fixes by id. Extensible: `register` new fixes, or start
/// from `with_defaults` for the built-in catalogue.
pub struct FixCatalogue {
    fixes: BTreeMap<&'static str, Box<dyn Fix>>,
}

impl FixCatalogue {
    pub fn new() -> Self {
        Self {
            fixes: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut catalogue = Self::new();
        catalogue.register(Box::new(SnapshotFixer));
        catalogue.register(Box::new(GraphFixer));
        catalogue
    }

    /// Register a fix; a duplicate id is a programming error.
    pub fn register(&mut self, fix: Box<dyn Fix>) {
        let id = fix.fix_id();
        assert!(
            self.fixes.insert(id, fix).is_none(),
            "fix '{}' registered twice",
            id
        );
    }

    pub fn has_fix(&self, fix_id: &str) -> bool {
        self.fixes.contains_key(fix_id)
    }

    pub fn fix_ids(&self) -> Vec<&'static str> {
        self.fixes.keys().copied().collect()
    }

    /// Pure preview: collect one planned fix per (fix id, target) from the
    /// report's fixable findings, in report order. No I/O happens here.
    pub fn plan(&self, report: &Report) -> Vec<PlannedFix> {
        let mut plans: Vec<PlannedFix> = Vec::new();

        for finding in report.errors.iter().chain(report.warnings.iter()) {
            let request = match &finding.fix {
                Some(request) => request,
                None => continue,
            };
            let fix = match self.fixes.get(request.fix_id.as_str()) {
                Some(fix) => fix,
                None => continue, // unfixable here; stays in the report
            };

            let mut planned = PlannedFix {
                fix_id: request.fix_id.clone(),
                target: finding.system.clone(),
                description: String::new(),
                params: request.params.clone(),
            };
            planned.description = fix.describe(&planned);

            let duplicate = plans
                .iter()
                .any(|p| p.fix_id == planned.fix_id && p.target == planned.target);
            if !duplicate {
                plans.push(planned);
            }
        }

        plans
    }

    /// Perform the writes. One result per planned fix; a failure is
    /// reported in place and never aborts the remaining fixes. Every
    /// outcome is appended to the fix audit log so remediation state
    /// stays visible to the operator.
    pub fn apply(
        &self,
        session: &mut Session,
        store: &Store,
        plan: &[PlannedFix],
    ) -> Vec<FixResult> {
        let results: Vec<FixResult> = plan
            .iter()
            .map(|planned| {
                let fix = match self.fixes.get(planned.fix_id.as_str()) {
                    Some(fix) => fix,
                    None => {
                        return FixResult {
                            fix_id: planned.fix_id.clone(),
                            target: planned.target.clone(),
                            status: FixStatus::Failed,
                            message: format!("no fix registered for '{}'", planned.fix_id),
                            files_modified: vec![],
                        };
                    }
                };
                match fix.apply(session, store, planned) {
                    Ok(result) => result,
                    Err(e) => {
                        let scoped = DocPulseError::FixerApply {
                            fix_id: planned.fix_id.clone(),
                            message: e.to_string(),
                        };
                        FixResult {
                            fix_id: planned.fix_id.clone(),
                            target: planned.target.clone(),
                            status: FixStatus::Failed,
                            message: scoped.to_string(),
                            files_modified: vec![],
                        }
                    }
                }
            })
            .collect();

        log_fix_events(store, &results);
        results
    }
}

#[derive(Serialize)]
struct FixEvent<'a> {
    ts: String,
    event_id: String,
    fix_id: &'a str,
    target: &'a str,
    status: FixStatus,
    message: &'a str,
}

/// Append-only audit log under `.pulse/fix.events.jsonl`. Logging is
/// best-effort: an unwritable log must not fail the fixes themselves.
fn log_fix_events(store: &Store, results: &[FixResult]) {
    use std::io::Write;

    let log_path = store.pulse_dir().join("fix.events.jsonl");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);
    let mut file = match file {
        Ok(f) => f,
        Err(_) => return,
    };

    for result in results {
        let event = FixEvent {
            ts: time::now_rfc3339(),
            event_id: Ulid::new().to_string(),
            fix_id: &result.fix_id,
            target: &result.target,
            status: result.status,
            message: &result.message,
        };
        if let Ok(line) = serde_json::to_string(&event) {
            let _ = writeln!(file, "{}", line);
        }
    }
}

impl Default for FixCatalogue {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Parameter lookup helper shared by fix implementations.
pub(crate) fn param<'a>(fix: &'a PlannedFix, key: &str) -> Option<&'a str> {
    fix.params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
