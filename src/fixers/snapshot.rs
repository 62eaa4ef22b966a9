//! `missing_snapshot`: render the snapshot document for a system that
//! lacks one. Creation-only: an existing file is never overwritten, so
//! re-application is a no-op.

use crate::core::assets;
use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::registry;
use crate::core::store::Store;
use crate::fixers::{param, Fix, FixResult, FixStatus, PlannedFix};
use std::fs;

pub struct SnapshotFixer;

impl Fix for SnapshotFixer {
    fn fix_id(&self) -> &'static str {
        "missing_snapshot"
    }

    fn describe(&self, fix: &PlannedFix) -> String {
        format!("create snapshot.md from template for system '{}'", fix.target)
    }

    fn apply(
        &self,
        session: &mut Session,
        store: &Store,
        fix: &PlannedFix,
    ) -> Result<FixResult, DocPulseError> {
        let system_path = param(fix, "system").unwrap_or(&fix.target);
        let bundle_dir = store.bundle_dir(system_path);
        let snapshot_path = bundle_dir.join("snapshot.md");
        let rel_path = format!("{}/.pulse/snapshot.md", system_path);

        if snapshot_path.exists() {
            return Ok(FixResult {
                fix_id: self.fix_id().to_string(),
                target: fix.target.clone(),
                status: FixStatus::Skipped,
                message: format!("{} already exists", rel_path),
                files_modified: vec![],
            });
        }

        // Prefer the registered display name; fall back to the path tail
        // for rows that disappeared between plan and apply.
        let system_name = registry::get_system(session, system_path)?
            .map(|s| s.name)
            .unwrap_or_else(|| {
                system_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(system_path)
                    .to_string()
            });

        let content = assets::render_template(
            assets::TEMPLATE_SNAPSHOT,
            &[("System Name", system_name.as_str())],
        );

        fs::create_dir_all(&bundle_dir).map_err(DocPulseError::IoError)?;
        fs::write(&snapshot_path, content).map_err(DocPulseError::IoError)?;

        Ok(FixResult {
            fix_id: self.fix_id().to_string(),
            target: fix.target.clone(),
            status: FixStatus::Applied,
            message: format!("created {}", rel_path),
            files_modified: vec![rel_path],
        })
    }
}
