//! Debt auditor: active-debt tables across all bundles.
//!
//! Every debt row needs an id, a priority, and a parseable creation date.
//! High-priority items aging past the configured threshold are flagged;
//! an id appearing in both the Active and Resolved tables makes the
//! item's state undecidable and blocks the audit as an error.

use crate::core::error::DocPulseError;
use crate::core::markdown::{self, MarkdownTable};
use crate::core::time;
use crate::validators::{Finding, ValidationContext, Validator, ValidatorOutcome};
use std::collections::HashSet;
use std::fs;

pub struct DebtAuditor;

const ID_CANDIDATES: [&str; 3] = ["ID", "Id", "id"];
const PRIORITY_CANDIDATES: [&str; 4] = ["Priority", "priority", "Severity", "severity"];
const CREATED_CANDIDATES: [&str; 4] = ["Created", "created", "Date", "date"];

fn table_ids(table: &markdown::MarkdownTable) -> HashSet<String> {
    table
        .rows
        .iter()
        .filter_map(|row| MarkdownTable::cell(row, &ID_CANDIDATES))
        .map(String::from)
        .collect()
}

impl Validator for DebtAuditor {
    fn name(&self) -> &'static str {
        "debt"
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, DocPulseError> {
        let mut outcome = ValidatorOutcome::new(self.name());

        for system in &ctx.snapshot.systems {
            let debt_path = ctx.bundle_dir(&system.path).join("debt.md");
            if !debt_path.exists() {
                continue;
            }
            outcome.checked += 1;
            let content = fs::read_to_string(&debt_path).map_err(DocPulseError::IoError)?;
            let rel_file = format!("{}/.pulse/debt.md", system.path);

            let active = markdown::extract_table_by_header(&content, "Active");
            let resolved = markdown::extract_table_by_header(&content, "Resolved");

            let active = match active {
                Some(t) => t,
                None => continue,
            };

            for row in &active.rows {
                let debt_id = MarkdownTable::cell(row, &ID_CANDIDATES)
                    .unwrap_or("unknown")
                    .to_string();
                let priority = MarkdownTable::cell(row, &PRIORITY_CANDIDATES);
                let created_raw = MarkdownTable::cell(row, &CREATED_CANDIDATES);

                let priority = match priority {
                    Some(p) => p.to_lowercase(),
                    None => {
                        outcome.push(
                            Finding::error(
                                "debt_missing_priority",
                                &system.path,
                                format!("debt item {} has no priority", debt_id),
                                "set a priority (high/medium/low) on the debt row",
                            )
                            .with_file(&rel_file),
                        );
                        continue;
                    }
                };

                let created = created_raw.and_then(time::parse_timestamp);
                let created = match created {
                    Some(c) => c,
                    None => {
                        outcome.push(
                            Finding::error(
                                "debt_missing_created",
                                &system.path,
                                format!(
                                    "debt item {} has no parseable creation date ('{}')",
                                    debt_id,
                                    created_raw.unwrap_or("")
                                ),
                                "record the creation date as YYYY-MM-DD",
                            )
                            .with_file(&rel_file),
                        );
                        continue;
                    }
                };

                let age_days = time::days_between(created, ctx.now);
                if priority == "high" && age_days > ctx.config.debt_age_days {
                    outcome.push(
                        Finding::warning(
                            "debt_aging",
                            &system.path,
                            format!(
                                "high-priority debt {} aging without resolution ({} days)",
                                debt_id, age_days
                            ),
                            "resolve the item or downgrade its priority deliberately",
                        )
                        .with_file(&rel_file),
                    );
                }
            }

            if let Some(resolved) = resolved {
                let active_ids = table_ids(&active);
                let resolved_ids = table_ids(&resolved);
                let mut duplicated: Vec<&String> =
                    active_ids.intersection(&resolved_ids).collect();
                duplicated.sort();
                for debt_id in duplicated {
                    outcome.push(
                        Finding::error(
                            "duplicate_debt_id",
                            &system.path,
                            format!(
                                "debt id {} appears in both the Active and Resolved tables",
                                debt_id
                            ),
                            "remove the item from whichever table no longer applies",
                        )
                        .with_file(&rel_file),
                    );
                }
            }
        }

        Ok(outcome)
    }
}
