//! ADR validator: files, links, supersession chains, and decision indexes.
//!
//! The registry is the source of truth; the filesystem and the per-system
//! `decisions.md` indexes are checked against it. Orphan links and broken
//! file references are errors; index drift that loses no information is a
//! warning.

use crate::core::adr::{AdrRecord, STATUS_SUPERSEDED};
use crate::core::error::DocPulseError;
use crate::core::markdown::{self, MarkdownTable};
use crate::validators::{Finding, ValidationContext, Validator, ValidatorOutcome};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::OnceLock;

pub struct AdrValidator;

fn adr_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ADR-\d+").unwrap())
}

fn check_supersession(
    adr: &AdrRecord,
    by_id: &HashMap<&str, &AdrRecord>,
    outcome: &mut ValidatorOutcome,
) {
    if adr.status == STATUS_SUPERSEDED {
        match adr.superseded_by.as_deref() {
            None => outcome.push(Finding::error(
                "supersession",
                &adr.id,
                format!("{} is marked superseded but names no successor", adr.id),
                "record the successor with `docpulse adr supersede`",
            )),
            Some(successor_id) => match by_id.get(successor_id) {
                None => outcome.push(Finding::error(
                    "supersession",
                    &adr.id,
                    format!(
                        "{} is superseded by {} which does not exist",
                        adr.id, successor_id
                    ),
                    "create the successor ADR or clear the stale reference",
                )),
                Some(successor) => {
                    if successor.supersedes.as_deref() != Some(adr.id.as_str()) {
                        outcome.push(Finding::error(
                            "supersession",
                            &adr.id,
                            format!(
                                "{} names successor {} but {} does not reference it back",
                                adr.id, successor_id, successor_id
                            ),
                            "repair the back-reference so the chain is symmetric",
                        ));
                    }
                }
            },
        }
    } else if adr.superseded_by.is_some() {
        outcome.push(Finding::error(
            "supersession",
            &adr.id,
            format!(
                "{} has status '{}' but carries a superseded-by reference",
                adr.id, adr.status
            ),
            "either mark the ADR superseded or clear the reference",
        ));
    }

    if let Some(predecessor_id) = adr.supersedes.as_deref() {
        match by_id.get(predecessor_id) {
            None => outcome.push(Finding::error(
                "supersession",
                &adr.id,
                format!(
                    "{} claims to supersede {} which does not exist",
                    adr.id, predecessor_id
                ),
                "clear the dangling supersedes reference",
            )),
            Some(predecessor) => {
                if predecessor.superseded_by.as_deref() != Some(adr.id.as_str()) {
                    outcome.push(Finding::error(
                        "supersession",
                        &adr.id,
                        format!(
                            "{} supersedes {} but {} does not reference it back",
                            adr.id, predecessor_id, predecessor_id
                        ),
                        "repair the back-reference so the chain is symmetric",
                    ));
                }
            }
        }
    }
}

/// Walk every superseded-by chain; report each loop once, anchored at its
/// smallest member id.
fn check_supersession_cycles(adrs: &[AdrRecord], outcome: &mut ValidatorOutcome) {
    let by_id: HashMap<&str, &AdrRecord> =
        adrs.iter().map(|a| (a.id.as_str(), a)).collect();
    let mut reported: HashSet<String> = HashSet::new();

    for adr in adrs {
        let mut seen: Vec<&str> = vec![adr.id.as_str()];
        let mut cursor = adr.superseded_by.as_deref();

        while let Some(current) = cursor {
            if let Some(start) = seen.iter().position(|&n| n == current) {
                let mut cycle: Vec<String> =
                    seen[start..].iter().map(|s| s.to_string()).collect();
                cycle.sort();
                let anchor = cycle[0].clone();
                if reported.insert(anchor.clone()) {
                    outcome.push(Finding::error(
                        "supersession_cycle",
                        &anchor,
                        format!("supersession chain forms a cycle: [{}]", cycle.join(", ")),
                        "break the cycle by clearing one superseded-by reference",
                    ));
                }
                break;
            }
            seen.push(current);
            cursor = by_id.get(current).and_then(|a| a.superseded_by.as_deref());
        }
    }
}

fn check_decision_indexes(ctx: &ValidationContext, outcome: &mut ValidatorOutcome) {
    let by_id: HashMap<&str, &AdrRecord> = ctx
        .snapshot
        .adrs
        .iter()
        .map(|a| (a.id.as_str(), a))
        .collect();

    for system in &ctx.snapshot.systems {
        let decisions_path = ctx.bundle_dir(&system.path).join("decisions.md");
        if !decisions_path.exists() {
            continue;
        }
        let content = match fs::read_to_string(&decisions_path) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let rel_file = format!("{}/.pulse/decisions.md", system.path);

        let indexed: HashSet<&str> = adr_id_re()
            .find_iter(&content)
            .map(|m| m.as_str())
            .collect();

        // Status column per index row, when the index carries one.
        let status_by_id: HashMap<String, String> = markdown::extract_tables(&content)
            .iter()
            .flat_map(|table| table.rows.iter())
            .filter_map(|row| {
                let id = MarkdownTable::cell(row, &["ID", "Id", "id"])?;
                let status = MarkdownTable::cell(row, &["Status", "status"])?;
                Some((id.to_string(), status.to_string()))
            })
            .collect();

        for indexed_id in &indexed {
            match by_id.get(indexed_id) {
                None => outcome.push(
                    Finding::error(
                        "index_desync",
                        &system.path,
                        format!("decisions.md references {} which is not in the registry", indexed_id),
                        "remove the stale index row or register the ADR",
                    )
                    .with_file(&rel_file),
                ),
                Some(adr) => {
                    if let Some(status) = status_by_id.get(*indexed_id) {
                        if !status.eq_ignore_ascii_case(&adr.status) {
                            outcome.push(
                                Finding::warning(
                                    "index_desync",
                                    &system.path,
                                    format!(
                                        "decisions.md lists {} as '{}' but the registry says '{}'",
                                        indexed_id, status, adr.status
                                    ),
                                    "update the index row to the registry status",
                                )
                                .with_file(&rel_file),
                            );
                        }
                    }
                }
            }
        }

        // Linked ADRs this index should mention but does not.
        for link in &ctx.snapshot.links {
            if link.system_path == system.path && !indexed.contains(link.adr_id.as_str()) {
                outcome.push(
                    Finding::warning(
                        "index_desync",
                        &system.path,
                        format!("{} is linked to this system but missing from decisions.md", link.adr_id),
                        "add the ADR to the decision index",
                    )
                    .with_file(&rel_file),
                );
            }
        }
    }
}

impl Validator for AdrValidator {
    fn name(&self) -> &'static str {
        "adr"
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome, DocPulseError> {
        let mut outcome = ValidatorOutcome::new(self.name());
        outcome.checked = ctx.snapshot.adrs.len();

        let by_id: HashMap<&str, &AdrRecord> = ctx
            .snapshot
            .adrs
            .iter()
            .map(|a| (a.id.as_str(), a))
            .collect();

        for adr in &ctx.snapshot.adrs {
            if !ctx.store.root.join(&adr.file_path).exists() {
                outcome.push(
                    Finding::error(
                        "broken_reference",
                        &adr.id,
                        format!("{} recorded at '{}' but the file is missing", adr.id, adr.file_path),
                        "restore the file or update the recorded path",
                    )
                    .with_file(&adr.file_path),
                );
            }
            check_supersession(adr, &by_id, &mut outcome);
        }

        for link in &ctx.snapshot.links {
            if !ctx.snapshot.has_system(&link.system_path) {
                let file = by_id.get(link.adr_id.as_str()).map(|a| a.file_path.clone());
                let mut finding = Finding::error(
                    "orphaned_adr",
                    &link.adr_id,
                    format!(
                        "{} is linked to nonexistent system '{}'",
                        link.adr_id, link.system_path
                    ),
                    "unlink the ADR or re-register the system",
                );
                if let Some(f) = file {
                    finding = finding.with_file(f);
                }
                outcome.push(finding);
            }
        }

        check_supersession_cycles(&ctx.snapshot.adrs, &mut outcome);
        check_decision_indexes(ctx, &mut outcome);

        Ok(outcome)
    }
}
