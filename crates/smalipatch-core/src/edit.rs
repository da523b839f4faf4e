//! Line-range editing for listings

use std::ops::Range;
use thiserror::Error;

/// Errors that can occur during edit application
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    #[error("Overlapping edits detected at line {}", .0 + 1)]
    OverlappingEdits(usize),

    #[error("Edit range {start}..{end} out of bounds for {len} lines")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

/// Represents a single listing edit operation
///
/// The `range` is expressed in line positions of the buffer the edit was
/// planned against. An empty range is a pure insertion before `range.start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEdit {
    /// The lines to replace
    pub range: Range<usize>,
    /// The replacement lines, without terminators
    pub replacement: Vec<String>,
    /// Human-readable description of the edit
    pub message: String,
}

impl LineEdit {
    /// Create a new edit
    pub fn new(range: Range<usize>, replacement: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            range,
            replacement,
            message: message.into(),
        }
    }

    /// Insert `line` immediately before position `index`
    pub fn insert_before(index: usize, line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(index..index, vec![line.into()], message)
    }

    /// Insert `line` immediately after position `index`
    pub fn insert_after(index: usize, line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(index + 1..index + 1, vec![line.into()], message)
    }

    /// Remove the lines in `range`
    pub fn delete(range: Range<usize>, message: impl Into<String>) -> Self {
        Self::new(range, Vec::new(), message)
    }

    /// Replace the single line at `index`
    pub fn replace_line(index: usize, line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(index..index + 1, vec![line.into()], message)
    }

    /// Whether this edit only adds lines
    pub fn is_insertion(&self) -> bool {
        self.range.is_empty()
    }

    /// Net change in line count once applied
    pub fn line_delta(&self) -> isize {
        self.replacement.len() as isize - self.range.len() as isize
    }
}

/// Apply edits to a line vector
///
/// Edits are applied in reverse order (from the last line to the first) so
/// that positions planned against the original lines stay valid throughout.
/// Insertions at the same position keep their relative order, and an
/// insertion at the start of a replaced range lands before the replacement.
///
/// # Returns
/// * `Ok(())` - All edits were applied
/// * `Err(EditError)` - If edits overlap or are out of bounds; `lines` is untouched
pub fn apply_edits(lines: &mut Vec<String>, edits: &[LineEdit]) -> Result<(), EditError> {
    if edits.is_empty() {
        return Ok(());
    }

    // Stable sort by (start, end) keeps planning order for equal positions
    let mut sorted: Vec<&LineEdit> = edits.iter().collect();
    sorted.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then(a.range.end.cmp(&b.range.end))
    });

    let len = lines.len();
    let mut prev_end: Option<usize> = None;

    for edit in &sorted {
        let Range { start, end } = edit.range.clone();

        if start > end || end > len {
            return Err(EditError::RangeOutOfBounds { start, end, len });
        }

        if let Some(prev) = prev_end {
            if start < prev {
                return Err(EditError::OverlappingEdits(start));
            }
        }

        prev_end = Some(end);
    }

    for edit in sorted.into_iter().rev() {
        lines.splice(edit.range.clone(), edit.replacement.iter().cloned());
    }

    Ok(())
}
