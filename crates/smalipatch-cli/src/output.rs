//! Output formatting for smalipatch
//!
//! Supports text (colored terminal), JSON and unified diff output formats.

use colored::*;
use serde::Serialize;
use std::path::Path;

use smalipatch_rules::{RuleOutcome, RuleSetId};

use crate::batch::{FileReport, FileStatus};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Diff,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<OutputFormat> {
        match s.to_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "diff" => Some(OutputFormat::Diff),
            _ => None,
        }
    }
}

/// Result of processing a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub rule_set: RuleSetId,
    pub root: String,
    pub path: String,
    pub status: &'static str,
    pub rules: Vec<RuleOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    pub fn from_report(rule_set: RuleSetId, report: &FileReport) -> Self {
        let (status, error) = match &report.status {
            FileStatus::Patched => ("patched", None),
            FileStatus::Unchanged => ("unchanged", None),
            FileStatus::Failed(e) => ("failed", Some(e.clone())),
            FileStatus::Skipped => ("skipped", None),
        };
        Self {
            rule_set,
            root: report.root.display().to_string(),
            path: report.path.display().to_string(),
            status,
            rules: report.outcomes.clone(),
            error,
        }
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files_matched: usize,
    pub files_patched: usize,
    pub total_sites: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// Full JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub version: String,
    pub rule_sets: Vec<RuleSetId>,
    pub dry_run: bool,
    pub summary: Summary,
    pub missing_roots: Vec<String>,
    pub files: Vec<FileResult>,
}

/// Reporter for accumulating and outputting results
pub struct Reporter {
    format: OutputFormat,
    verbose: bool,
    rule_sets: Vec<RuleSetId>,
    results: Vec<FileResult>,
    missing_roots: Vec<String>,
    summary: Summary,
}

impl Reporter {
    pub fn new(format: OutputFormat, verbose: bool, rule_sets: Vec<RuleSetId>) -> Self {
        Self {
            format,
            verbose,
            rule_sets,
            results: Vec::new(),
            missing_roots: Vec::new(),
            summary: Summary::default(),
        }
    }

    pub fn report_missing_root(&mut self, root: &Path) {
        if self.format == OutputFormat::Text {
            eprintln!("{}: Root does not exist: {}", "Warning".yellow(), root.display());
        }
        self.missing_roots.push(root.display().to_string());
    }

    /// Report one file patched by `rule_set`; `check_mode` shows what would change
    pub fn report(&mut self, rule_set: RuleSetId, report: &FileReport, check_mode: bool) {
        self.summary.files_matched += 1;
        match &report.status {
            FileStatus::Patched => {
                self.summary.files_patched += 1;
                self.summary.total_sites += report.outcomes.iter().map(|o| o.sites).sum::<usize>();
            }
            FileStatus::Failed(_) => self.summary.errors += 1,
            FileStatus::Skipped => self.summary.skipped += 1,
            FileStatus::Unchanged => {}
        }

        match self.format {
            OutputFormat::Text => self.print_text(report, check_mode),
            OutputFormat::Diff => {
                if let Some(change) = &report.change {
                    print_unified_diff(&report.path, &change.old_source, &change.new_source);
                }
            }
            OutputFormat::Json => {
                // JSON output is handled in finish()
            }
        }

        self.results.push(FileResult::from_report(rule_set, report));
    }

    fn print_text(&self, report: &FileReport, check_mode: bool) {
        match &report.status {
            FileStatus::Failed(error) => {
                eprintln!("{}: {} - {}", "Error".red(), report.path.display(), error);
                return;
            }
            FileStatus::Skipped => {
                if self.verbose {
                    println!("{}: skipped", report.path.display());
                }
                return;
            }
            FileStatus::Patched | FileStatus::Unchanged => {}
        }

        println!("{}", report.path.display().to_string().bold());
        for line in outcome_lines(&report.outcomes) {
            println!("  {}", line);
        }

        if let Some(change) = &report.change {
            if check_mode {
                print_diff(&change.old_source, &change.new_source);
            } else {
                let sites: usize = report.outcomes.iter().map(|o| o.sites).sum();
                println!("  {} Applied {} change(s)", "OK".green(), sites);
            }
        }
        println!();
    }

    /// Print final summary/output
    pub fn finish(self, check_mode: bool) {
        match self.format {
            OutputFormat::Text => {
                println!("{}", "Summary".bold().underline());
                let names: Vec<&str> = self.rule_sets.iter().map(|set| set.name()).collect();
                println!("  Rule set: {}", names.join(", "));
                println!("  Files matched: {}", self.summary.files_matched);
                println!("  Files patched: {}", self.summary.files_patched);
                println!("  Total sites: {}", self.summary.total_sites);
                if self.summary.errors > 0 {
                    println!("  Errors: {}", self.summary.errors);
                }
                if self.summary.skipped > 0 {
                    println!("  Skipped: {}", self.summary.skipped);
                }

                if check_mode && self.summary.total_sites > 0 {
                    println!();
                    println!("{}", "Run without --check to apply changes".yellow());
                }
            }
            OutputFormat::Json => {
                let output = JsonOutput {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    rule_sets: self.rule_sets,
                    dry_run: check_mode,
                    summary: self.summary,
                    missing_roots: self.missing_roots,
                    files: self.results,
                };
                match serde_json::to_string_pretty(&output) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("{}: Failed to serialize report: {}", "Error".red(), e),
                }
            }
            OutputFormat::Diff => {
                // Patch-compatible output has no summary
            }
        }
    }

    /// Get summary for exit code determination
    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}

/// One line per rule: its site count, or "no match"
fn outcome_lines(outcomes: &[RuleOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .map(|o| match o.sites {
            0 => format!("{} {}: {}", "-".dimmed(), o.rule, "no match".yellow()),
            n => format!("{} {}: {} site(s)", "->".green(), o.rule, n),
        })
        .collect()
}

/// Print a colored diff between old and new content
fn print_diff(old: &str, new: &str) {
    for diff_result in diff::lines(old, new) {
        match diff_result {
            diff::Result::Left(l) => {
                println!("    {}", format!("- {}", l).red());
            }
            diff::Result::Right(r) => {
                println!("    {}", format!("+ {}", r).green());
            }
            diff::Result::Both(_, _) => {}
        }
    }
}

/// Print unified diff format (standard diff -u compatible)
fn print_unified_diff(path: &Path, old: &str, new: &str) {
    print!("{}", unified_diff(path, old, new));
}

fn unified_diff(path: &Path, old: &str, new: &str) -> String {
    use similar::{ChangeTag, TextDiff};

    let diff = TextDiff::from_lines(old, new);
    let path_str = path.display().to_string();
    let mut out = format!("--- a/{}\n+++ b/{}\n", path_str, path_str);

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        out.push_str(&format!("{}\n", hunk.header()));
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            out.push_str(&format!("{}{}", sign, change));
            if change.missing_newline() {
                out.push('\n');
            }
        }
    }
    out
}
