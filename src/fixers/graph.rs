//! `stale_graph`: regenerate the graph artifact from current registry
//! state. The artifact's `generated_at` is the registry watermark, so
//! unchanged state serializes byte-identically; the write is skipped when
//! the content hash already matches.

use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::graph;
use crate::core::store::Store;
use crate::fixers::{Fix, FixResult, FixStatus, PlannedFix};
use sha2::{Digest, Sha256};
use std::fs;

pub struct GraphFixer;

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl Fix for GraphFixer {
    fn fix_id(&self) -> &'static str {
        "stale_graph"
    }

    fn describe(&self, _fix: &PlannedFix) -> String {
        "regenerate .pulse/graph.json from the registry".to_string()
    }

    fn apply(
        &self,
        session: &mut Session,
        store: &Store,
        fix: &PlannedFix,
    ) -> Result<FixResult, DocPulseError> {
        let artifact = graph::generate_artifact(session)?;
        let artifact_path = store.graph_path();

        let mut rendered = serde_json::to_string_pretty(&artifact)
            .map_err(|e| DocPulseError::Infrastructure(format!("cannot serialize graph: {}", e)))?;
        rendered.push('\n');

        if let Ok(existing) = fs::read(&artifact_path) {
            if content_hash(&existing) == content_hash(rendered.as_bytes()) {
                return Ok(FixResult {
                    fix_id: self.fix_id().to_string(),
                    target: fix.target.clone(),
                    status: FixStatus::Skipped,
                    message: "graph artifact already current".to_string(),
                    files_modified: vec![],
                });
            }
        }

        graph::save_artifact(&artifact, &artifact_path)?;

        Ok(FixResult {
            fix_id: self.fix_id().to_string(),
            target: fix.target.clone(),
            status: FixStatus::Applied,
            message: format!(
                "regenerated graph artifact with {} systems and {} edges",
                artifact.systems.len(),
                artifact.edges.len()
            ),
            files_modified: vec![".pulse/graph.json".to_string()],
        })
    }
}
