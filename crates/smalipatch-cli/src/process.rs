//! File processing logic for smalipatch

use anyhow::{Context, Result};
use std::path::Path;

use smalipatch_core::LineBuffer;
use smalipatch_rules::{ApplyReport, PatchRule, RuleApplier};

/// Result of processing a single file
#[derive(Debug)]
pub struct ProcessResult {
    pub report: ApplyReport,
    /// Original file contents
    pub old_source: String,
    /// Patched contents (only if some rule mutated the listing)
    pub new_source: Option<String>,
}

/// Apply `rules` in order to the listing at `path`, entirely in memory
pub fn process_file(path: &Path, rules: &[&PatchRule]) -> Result<ProcessResult> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let mut buffer = LineBuffer::from_source(&source);
    let report = RuleApplier::new(rules.iter().copied())
        .apply(&mut buffer)
        .with_context(|| format!("Failed to patch {}", path.display()))?;

    let new_source = report.is_modified().then(|| buffer.to_source());
    Ok(ProcessResult {
        report,
        old_source: source,
        new_source,
    })
}

/// Write the processed result to the file
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}
