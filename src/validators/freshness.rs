//! Freshness checker: documents versus the sources they describe.
//!
//! For every tracked bundle document, the latest source-file instant is
//! compared against the document's own instant, both supplied by the
//! `SourceTimes` collaborator. A lag past the configured threshold is a
//! staleness warning carrying the age in days. The generated graph
//! artifact is checked against the registry's update watermark instead,
//! which catches generation drift even when no file mtime moved.

use crate::core::error::DocPulseError;
use crate::core::graph;
use crate::core::time;
use crate::validators::{Finding, ValidationContext, Validator, ValidatorOutcome};

pub struct FreshnessChecker;

/// Bundle documents tracked for staleness.
const TRACKED_DOCS: [&str; 3] = ["snapshot.md", "constraints.md", "decisions.md"];

fn check_artifact_drift(ctx: &ValidationContext, outcome: &mut ValidatorOutcome) {
    let artifact_path = ctx.store.graph_path();
    let watermark = match ctx.snapshot.watermark() {
        Some(w) => w,
        None => return, // empty registry, nothing to drift from
    };

    if !artifact_path.exists() {
        outcome.push(
            Finding::warning(
                "stale_graph",
                ".pulse",
                "graph artifact has not been generated".to_string(),
                "run `docpulse fix` or `docpulse graph generate`",
            )
            .with_file(".pulse/graph.json")
            .with_fix("stale_graph", vec![]),
        );
        return;
    }

    match graph::load_artifact(&artifact_path) {
        Ok(artifact) => {
            if artifact.generated_at < watermark {
                outcome.push(
                    Finding::warning(
                        "stale_graph",
                        ".pulse",
                        format!(
                            "graph artifact was generated at watermark '{}' but the registry is at '{}'",
                            artifact.generated_at, watermark
                        ),
                        "regenerate the artifact with `docpulse fix`",
                    )
                    .with_file(".pulse/graph.json")
                    .with_fix("stale_graph", vec![]),
                );
            }
        }
        Err(e) => outcome.push(
            Finding::warning(
                "stale_graph",
                ".pulse",
                format!("graph artifact is unreadable: {}", e),
                "regenerate the artifact with `docpulse fix`",
            )
            .with_file(".pulse/graph.json")
            .with_fix("stale_graph", vec![]),
        ),
    }
}

impl Validator for FreshnessChecker {
    fn name(&self) -> &'static str {
        "freshness"
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, DocPulseError> {
        let mut outcome = ValidatorOutcome::new(self.name());

        check_artifact_drift(ctx, &mut outcome);

        for system in &ctx.snapshot.systems {
            let system_dir = ctx.store.root.join(&system.path);
            let latest_source = match ctx.times.latest_source_instant(&system_dir) {
                Some(instant) => instant,
                None => continue, // nothing to compare against
            };
            outcome.checked += 1;

            for doc_name in TRACKED_DOCS {
                let doc_path = ctx.bundle_dir(&system.path).join(doc_name);
                let doc_instant = match ctx.times.file_instant(&doc_path) {
                    Some(instant) => instant,
                    None => continue, // absence is the snapshot validator's concern
                };

                let lag_days = time::days_between(doc_instant, latest_source);
                if lag_days > ctx.config.staleness_days {
                    outcome.push(
                        Finding::warning(
                            "stale_documentation",
                            &system.path,
                            format!(
                                "{} is {} days older than the system's sources",
                                doc_name, lag_days
                            ),
                            "review the document against recent source changes",
                        )
                        .with_file(format!("{}/.pulse/{}", system.path, doc_name)),
                    );
                }
            }
        }

        Ok(outcome)
    }
}
