//! Snapshot validator: bundle snapshots versus recorded dependencies.
//!
//! For every registered system the snapshot document must exist, and its
//! declared Dependencies must agree with the registry's edges in both
//! directions. A declared dependency naming an unregistered path is its
//! own class of error.

use crate::core::error::DocPulseError;
use crate::core::markdown::{self, MarkdownTable};
use crate::validators::{Finding, ValidationContext, Validator, ValidatorOutcome};
use std::collections::BTreeSet;
use std::fs;

pub struct SnapshotValidator;

const NAME_CANDIDATES: [&str; 6] = ["System", "Path", "system", "path", "Name", "name"];

/// References that are not registered systems and must not be validated
/// as such: explicit "(external)" markers, concrete file paths, prose.
fn is_external_reference(reference: &str) -> bool {
    if reference.to_lowercase().contains("(external)") {
        return true;
    }
    const FILE_EXTENSIONS: [&str; 13] = [
        ".ts", ".js", ".tsx", ".jsx", ".py", ".rs", ".go", ".json", ".yaml", ".yml", ".md",
        ".css", ".html",
    ];
    if FILE_EXTENSIONS.iter().any(|ext| reference.ends_with(ext)) {
        return true;
    }
    reference.contains(' ') && !reference.starts_with("src/")
}

/// Declared dependency paths from the snapshot's Dependencies table, or
/// from inline references when the section has no table.
fn declared_dependencies(content: &str) -> BTreeSet<String> {
    let mut declared = BTreeSet::new();

    if let Some(table) = markdown::extract_table_by_header(content, "Dependencies") {
        for row in &table.rows {
            if let Some(path) = MarkdownTable::cell(row, &NAME_CANDIDATES) {
                if !is_external_reference(path) {
                    declared.insert(path.to_string());
                }
            }
        }
        return declared;
    }

    if let Some(section) = markdown::extract_section(content, "Dependencies", 2) {
        for reference in markdown::extract_path_refs(&section) {
            if !is_external_reference(&reference) {
                declared.insert(reference);
            }
        }
    }
    declared
}

impl Validator for SnapshotValidator {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, DocPulseError> {
        let mut outcome = ValidatorOutcome::new(self.name());

        for system in &ctx.snapshot.systems {
            let snapshot_path = ctx.bundle_dir(&system.path).join("snapshot.md");
            let rel_file = format!("{}/.pulse/snapshot.md", system.path);

            if !snapshot_path.exists() {
                outcome.push(
                    Finding::error(
                        "missing_snapshot",
                        &system.path,
                        format!("snapshot.md not found for system '{}'", system.path),
                        "run `docpulse fix` to render it from the template",
                    )
                    .with_file(&rel_file)
                    .with_fix(
                        "missing_snapshot",
                        vec![("system".to_string(), system.path.clone())],
                    ),
                );
                continue;
            }

            outcome.checked += 1;
            let content = fs::read_to_string(&snapshot_path).map_err(DocPulseError::IoError)?;

            let declared = declared_dependencies(&content);
            let recorded: BTreeSet<String> = ctx
                .snapshot
                .dependencies
                .iter()
                .filter(|e| e.system_path == system.path)
                .map(|e| e.depends_on.clone())
                .collect();

            for dep in &declared {
                if !ctx.snapshot.has_system(dep) {
                    outcome.push(
                        Finding::error(
                            "unknown_dependency",
                            &system.path,
                            format!(
                                "snapshot declares dependency '{}' which is not a registered system",
                                dep
                            ),
                            "register the system or remove the stale declaration",
                        )
                        .with_file(&rel_file),
                    );
                } else if !recorded.contains(dep) {
                    outcome.push(
                        Finding::error(
                            "unresolved_dependency",
                            &system.path,
                            format!(
                                "snapshot declares dependency '{}' but the registry records no such edge",
                                dep
                            ),
                            "add the edge with `docpulse dep add` or drop the declaration",
                        )
                        .with_file(&rel_file),
                    );
                }
            }

            for dep in &recorded {
                if !declared.contains(dep) {
                    outcome.push(
                        Finding::error(
                            "unresolved_dependency",
                            &system.path,
                            format!(
                                "registry records dependency on '{}' but the snapshot does not declare it",
                                dep
                            ),
                            "document the dependency in the snapshot's Dependencies table",
                        )
                        .with_file(&rel_file),
                    );
                }
            }
        }

        Ok(outcome)
    }
}
