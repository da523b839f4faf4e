//! Rule application
//!
//! Each rule is applied in two phases: a read-only pass over the buffer
//! plans every [`LineEdit`] against the current positions, then the whole
//! batch is applied highest-position first. The next rule therefore always
//! sees renumbered lines.

use std::collections::BTreeSet;

use serde::Serialize;
use smalipatch_core::matcher::{find_all, find_within};
use smalipatch_core::{
    EditError, LineBuffer, LineEdit, ListingError, MethodTracker, SearchDirection,
};
use thiserror::Error;
use tracing::debug;

use crate::rule::{PatchAction, PatchRule};

/// A rule could not be applied to a listing
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Rule '{rule}': {source}")]
    Listing {
        rule: String,
        #[source]
        source: ListingError,
    },

    #[error("Rule '{rule}': {source}")]
    Edit {
        rule: String,
        #[source]
        source: EditError,
    },
}

/// Number of sites one rule mutated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub sites: usize,
}

/// Per-rule outcomes for one buffer, in rule order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<RuleOutcome>,
}

impl ApplyReport {
    /// Whether any rule changed the buffer
    pub fn is_modified(&self) -> bool {
        self.outcomes.iter().any(|o| o.sites > 0)
    }

    pub fn total_sites(&self) -> usize {
        self.outcomes.iter().map(|o| o.sites).sum()
    }

    /// Sites applied by `rule`, summed over repeated ids
    pub fn sites_for(&self, rule: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.rule == rule)
            .map(|o| o.sites)
            .sum()
    }
}

/// Applies an ordered list of rules to a buffer
pub struct RuleApplier<'r> {
    rules: Vec<&'r PatchRule>,
}

impl<'r> RuleApplier<'r> {
    pub fn new(rules: impl IntoIterator<Item = &'r PatchRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Apply every rule in order
    ///
    /// On error the buffer may hold the output of earlier rules; callers
    /// must discard it rather than write it out.
    pub fn apply(&self, buffer: &mut LineBuffer) -> Result<ApplyReport, ApplyError> {
        let mut report = ApplyReport::default();

        for rule in &self.rules {
            let edits = plan_rule(rule, buffer).map_err(|source| ApplyError::Listing {
                rule: rule.id.clone(),
                source,
            })?;

            for edit in &edits {
                debug!(
                    rule = %rule.id,
                    line = edit.range.start + 1,
                    "{}",
                    edit.message
                );
            }

            buffer.apply(&edits).map_err(|source| ApplyError::Edit {
                rule: rule.id.clone(),
                source,
            })?;

            report.outcomes.push(RuleOutcome {
                rule: rule.id.clone(),
                sites: edits.len(),
            });
        }

        Ok(report)
    }
}

/// Plan the edits of one rule without touching the buffer
///
/// Returns one edit per mutated site. Sites that already carry the change
/// are skipped, so planning against patched output yields nothing.
pub fn plan_rule(rule: &PatchRule, buffer: &LineBuffer) -> Result<Vec<LineEdit>, ListingError> {
    if let PatchAction::ReplaceMethodBody { signature, body } = &rule.action {
        let segments = MethodTracker::new(signature).segments(buffer)?;
        return Ok(segments
            .iter()
            .filter(|segment| !segment.body_equals(body))
            .map(|segment| {
                segment.replace_body_edit(
                    body,
                    format!("{}: force return in {}", rule.id, segment.signature_key),
                )
            })
            .collect());
    }

    let sites = mutation_points(rule, buffer);
    let mut edits = Vec::new();

    match &rule.action {
        PatchAction::InsertConstantBefore(text) => {
            for site in sites {
                let previous = site.checked_sub(1).and_then(|i| buffer.get(i));
                if !same_line(previous, text) {
                    edits.push(LineEdit::insert_before(
                        site,
                        text.clone(),
                        format!("{}: insert '{}'", rule.id, text.trim()),
                    ));
                }
            }
        }
        PatchAction::InsertConstantAfter(text) => {
            for site in sites {
                if !same_line(buffer.get(site + 1), text) {
                    edits.push(LineEdit::insert_after(
                        site,
                        text.clone(),
                        format!("{}: insert '{}'", rule.id, text.trim()),
                    ));
                }
            }
        }
        PatchAction::ReplaceLine(text) => {
            for site in sites {
                if !same_line(buffer.get(site), text) {
                    edits.push(LineEdit::replace_line(
                        site,
                        text.clone(),
                        format!("{}: replace with '{}'", rule.id, text.trim()),
                    ));
                }
            }
        }
        PatchAction::DeleteRunAfter { stop_conditions } => {
            let mut covered_until = 0;
            for site in sites {
                if site < covered_until {
                    continue;
                }
                let start = site + 1;
                let end = (start..buffer.len())
                    .find(|&i| {
                        let text = buffer.get(i).unwrap_or_default();
                        !stop_conditions.iter().any(|p| p.is_match(text))
                    })
                    .unwrap_or(buffer.len());
                if end > start {
                    edits.push(LineEdit::delete(
                        start..end,
                        format!("{}: remove {} line(s)", rule.id, end - start),
                    ));
                    covered_until = end;
                }
            }
        }
        // Planned per method segment above
        PatchAction::ReplaceMethodBody { .. } => {}
    }

    Ok(edits)
}

/// Distinct positions where a rule's action applies, ascending
///
/// Several markers resolving to the same site yield it once.
fn mutation_points(rule: &PatchRule, buffer: &LineBuffer) -> BTreeSet<usize> {
    let markers = find_all(buffer, &rule.target);

    match (&rule.context, rule.direction) {
        (Some(context), direction) if direction != SearchDirection::None => markers
            .into_iter()
            .filter_map(|marker| find_within(buffer, context, marker, direction, rule.window))
            .collect(),
        _ => markers.into_iter().collect(),
    }
}

fn same_line(existing: Option<&str>, text: &str) -> bool {
    existing.is_some_and(|line| line.trim() == text.trim())
}
