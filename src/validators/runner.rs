//! Validation runner: bounded concurrent execution over one snapshot.
//!
//! Each selected validator gets its own worker thread and a wall-clock
//! budget. A crashed validator becomes a synthetic error finding; a
//! validator that blows its budget becomes a timed-out warning. Either
//! way the run completes and the other validators' results survive.
//! Findings merge in validator-declaration order, then emission order,
//! so identical inputs always produce identical reports.

use crate::core::config::ValidationConfig;
use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::graph::DependencyGraph;
use crate::core::store::Store;
use crate::validators::adr::AdrValidator;
use crate::validators::debt::DebtAuditor;
use crate::validators::freshness::FreshnessChecker;
use crate::validators::snapshot::SnapshotValidator;
use crate::validators::{
    Finding, RepoTimes, SourceTimes, StoreSnapshot, ValidationContext, Validator, ValidatorOutcome,
};
use chrono::Utc;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// The closed validator set, in declaration (and merge) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorKind {
    Snapshot,
    Adr,
    Debt,
    Freshness,
}

impl ValidatorKind {
    pub const ALL: [ValidatorKind; 4] = [
        ValidatorKind::Snapshot,
        ValidatorKind::Adr,
        ValidatorKind::Debt,
        ValidatorKind::Freshness,
    ];

    /// Fast subset for pre-commit hooks.
    pub const PRE_COMMIT: [ValidatorKind; 2] = [ValidatorKind::Snapshot, ValidatorKind::Adr];

    pub fn name(&self) -> &'static str {
        match self {
            ValidatorKind::Snapshot => "snapshot",
            ValidatorKind::Adr => "adr",
            ValidatorKind::Debt => "debt",
            ValidatorKind::Freshness => "freshness",
        }
    }

    pub fn parse(name: &str) -> Option<ValidatorKind> {
        match name {
            "snapshot" => Some(ValidatorKind::Snapshot),
            "adr" => Some(ValidatorKind::Adr),
            "debt" => Some(ValidatorKind::Debt),
            "freshness" => Some(ValidatorKind::Freshness),
            _ => None,
        }
    }

    fn instantiate(&self) -> Box<dyn Validator> {
        match self {
            ValidatorKind::Snapshot => Box::new(SnapshotValidator),
            ValidatorKind::Adr => Box::new(AdrValidator),
            ValidatorKind::Debt => Box::new(DebtAuditor),
            ValidatorKind::Freshness => Box::new(FreshnessChecker),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "PASS_WITH_WARNINGS")]
    PassWithWarnings,
    #[serde(rename = "FAIL")]
    Fail,
}

#[derive(Debug, Serialize, Clone)]
pub struct Report {
    pub status: RunStatus,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl Report {
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Fail => 1,
            _ => 0,
        }
    }
}

pub struct ValidationRunner {
    ctx: Arc<ValidationContext>,
}

impl ValidationRunner {
    /// Load the registry snapshot and capture the run instant. A registry
    /// read failure here is infrastructure, not a finding.
    pub fn new(
        session: &Session,
        store: &Store,
        config: ValidationConfig,
    ) -> Result<Self, DocPulseError> {
        let times: Arc<dyn SourceTimes> = Arc::new(RepoTimes::new(store));
        Self::with_times(session, store, config, times)
    }

    /// Construction with an explicit `SourceTimes` collaborator.
    pub fn with_times(
        session: &Session,
        store: &Store,
        config: ValidationConfig,
        times: Arc<dyn SourceTimes>,
    ) -> Result<Self, DocPulseError> {
        let snapshot = StoreSnapshot::load(session)?;
        Ok(Self {
            ctx: Arc::new(ValidationContext {
                store: store.clone(),
                snapshot,
                config,
                now: Utc::now(),
                times,
            }),
        })
    }

    pub fn context(&self) -> &ValidationContext {
        &self.ctx
    }

    /// Run the selected validators; `deep` adds structural graph checks.
    pub fn run(&self, selection: &[ValidatorKind], deep: bool) -> Report {
        let budget = Duration::from_secs(self.ctx.config.validator_budget_secs);
        let deadline = Instant::now() + budget;

        let (sender, receiver) = mpsc::channel();
        for (index, kind) in selection.iter().enumerate() {
            let ctx = Arc::clone(&self.ctx);
            let sender = sender.clone();
            let kind = *kind;
            // Workers are detached; a stuck validator is abandoned at the
            // deadline rather than stalling the run.
            thread::spawn(move || {
                let result =
                    catch_unwind(AssertUnwindSafe(|| kind.instantiate().validate(&ctx)));
                let _ = sender.send((index, result));
            });
        }
        drop(sender);

        let mut slots: Vec<Option<Result<ValidatorOutcome, String>>> =
            (0..selection.len()).map(|_| None).collect();
        let mut pending = selection.len();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match receiver.recv_timeout(remaining) {
                Ok((index, Ok(Ok(outcome)))) => {
                    slots[index] = Some(Ok(outcome));
                    pending -= 1;
                }
                Ok((index, Ok(Err(e)))) => {
                    slots[index] = Some(Err(e.to_string()));
                    pending -= 1;
                }
                Ok((index, Err(panic))) => {
                    let detail = panic
                        .downcast_ref::<String>()
                        .map(|s| s.as_str())
                        .or_else(|| panic.downcast_ref::<&str>().copied())
                        .unwrap_or("panicked");
                    slots[index] = Some(Err(detail.to_string()));
                    pending -= 1;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut errors: Vec<Finding> = Vec::new();
        let mut warnings: Vec<Finding> = Vec::new();
        for (index, kind) in selection.iter().enumerate() {
            match slots[index].take() {
                Some(Ok(outcome)) => {
                    errors.extend(outcome.errors);
                    warnings.extend(outcome.warnings);
                }
                Some(Err(detail)) => {
                    errors.push(Finding::error(
                        "validator_crashed",
                        kind.name(),
                        format!("validator '{}' failed internally: {}", kind.name(), detail),
                        "re-run with the other validators; report this as a bug",
                    ));
                }
                None => {
                    warnings.push(Finding::warning(
                        "timed_out",
                        kind.name(),
                        format!(
                            "validator '{}' exceeded its {}s budget and was abandoned",
                            kind.name(),
                            self.ctx.config.validator_budget_secs
                        ),
                        "raise validator_budget_secs in .pulse/config.toml or investigate",
                    ));
                }
            }
        }

        if deep {
            self.structural_findings(&mut errors);
        }

        let status = if !errors.is_empty() {
            RunStatus::Fail
        } else if !warnings.is_empty() {
            RunStatus::PassWithWarnings
        } else {
            RunStatus::Pass
        };

        Report {
            status,
            errors,
            warnings,
        }
    }

    /// Deep-mode structural constraint checks over the same snapshot.
    fn structural_findings(&self, errors: &mut Vec<Finding>) {
        match DependencyGraph::build(&self.ctx.snapshot.systems, &self.ctx.snapshot.dependencies) {
            Err(e) => errors.push(Finding::error(
                "unknown_edge",
                "structural",
                e.to_string(),
                "remove the dangling dependency edge from the registry",
            )),
            Ok(graph) => {
                for cycle in graph.detect_cycles() {
                    errors.push(Finding::error(
                        "dependency_cycle",
                        "structural",
                        format!("dependency cycle detected: [{}]", cycle.join(", ")),
                        "break the cycle by removing or inverting one edge",
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in ValidatorKind::ALL {
            assert_eq!(ValidatorKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(ValidatorKind::parse("nope"), None);
    }

    #[test]
    fn test_report_exit_codes() {
        let pass = Report {
            status: RunStatus::Pass,
            errors: vec![],
            warnings: vec![],
        };
        assert_eq!(pass.exit_code(), 0);

        let fail = Report {
            status: RunStatus::Fail,
            errors: vec![],
            warnings: vec![],
        };
        assert_eq!(fail.exit_code(), 1);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&RunStatus::PassWithWarnings).unwrap(),
            "\"PASS_WITH_WARNINGS\""
        );
    }
}
