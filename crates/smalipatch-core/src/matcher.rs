//! Named line patterns and directional search over a [`LineBuffer`]
//!
//! Matching is always line-local. Multi-line anchors are built by callers
//! from a target match plus a windowed search for a second pattern.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::buffer::LineBuffer;

/// A pattern failed to compile
#[derive(Error, Debug)]
#[error("Invalid pattern '{name}': {source}")]
pub struct PatternError {
    pub name: String,
    #[source]
    pub source: regex::Error,
}

/// A compiled regular expression with a name for diagnostics
#[derive(Clone)]
pub struct Pattern {
    name: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a regular expression
    pub fn new(name: impl Into<String>, source: &str) -> Result<Self, PatternError> {
        let name = name.into();
        match Regex::new(source) {
            Ok(regex) => Ok(Self { name, regex }),
            Err(source) => Err(PatternError { name, source }),
        }
    }

    /// Match `text` anywhere in a line, verbatim
    pub fn literal(name: impl Into<String>, text: &str) -> Self {
        let regex = Regex::new(&regex::escape(text)).expect("escaped literal is a valid regex");
        Self {
            name: name.into(),
            regex,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("name", &self.name)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Direction in which a secondary pattern is searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDirection {
    Forward,
    Backward,
    #[default]
    None,
}

/// How many lines a directional search may inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchWindow {
    Lines(usize),
    #[default]
    Unbounded,
}

impl SearchWindow {
    fn limit(&self) -> usize {
        match self {
            SearchWindow::Lines(n) => *n,
            SearchWindow::Unbounded => usize::MAX,
        }
    }
}

static METHOD_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\.method\s").expect("method header pattern"));
static REGISTER_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\.(registers|locals)\b").expect("register directive pattern"));
static BRANCH_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":cond_\w+").expect("branch label pattern"));

/// Marker closing a method body
pub const METHOD_FOOTER: &str = ".end method";

/// Whether `line` opens a method (`.method ...`)
pub fn is_method_header(line: &str) -> bool {
    METHOD_HEADER.is_match(line)
}

/// Whether `line` closes a method
pub fn is_method_footer(line: &str) -> bool {
    line.trim() == METHOD_FOOTER
}

/// Whether `line` declares the register count (`.registers` or `.locals`)
pub fn is_register_declaration(line: &str) -> bool {
    REGISTER_DIRECTIVE.is_match(line)
}

/// Whether `line` references a conditional branch label
pub fn has_branch_label(line: &str) -> bool {
    BRANCH_LABEL.is_match(line)
}

pub fn matches(line: &str, pattern: &Pattern) -> bool {
    pattern.is_match(line)
}

/// Find the first line matching `pattern`, starting at `from` inclusive
///
/// `Forward` walks towards the end of the buffer, `Backward` towards the
/// start; `None` only inspects `from` itself.
pub fn find_first(
    buffer: &LineBuffer,
    pattern: &Pattern,
    from: usize,
    direction: SearchDirection,
) -> Option<usize> {
    if from >= buffer.len() {
        return None;
    }
    match direction {
        SearchDirection::Forward => (from..buffer.len()).find(|&i| line_matches(buffer, i, pattern)),
        SearchDirection::Backward => (0..=from).rev().find(|&i| line_matches(buffer, i, pattern)),
        SearchDirection::None => line_matches(buffer, from, pattern).then_some(from),
    }
}

/// Find the nearest neighbour of `anchor` matching `pattern`
///
/// The search starts next to `anchor` (exclusive) and inspects at most
/// `window` lines in `direction`.
pub fn find_within(
    buffer: &LineBuffer,
    pattern: &Pattern,
    anchor: usize,
    direction: SearchDirection,
    window: SearchWindow,
) -> Option<usize> {
    let limit = window.limit();
    match direction {
        SearchDirection::Forward => {
            let end = anchor.saturating_add(limit).min(buffer.len().saturating_sub(1));
            (anchor + 1..=end).find(|&i| line_matches(buffer, i, pattern))
        }
        SearchDirection::Backward => {
            let start = anchor.saturating_sub(limit);
            (start..anchor).rev().find(|&i| line_matches(buffer, i, pattern))
        }
        SearchDirection::None => None,
    }
}

/// Positions of every line matching `pattern`
pub fn find_all(buffer: &LineBuffer, pattern: &Pattern) -> Vec<usize> {
    buffer
        .iter()
        .filter(|line| pattern.is_match(line.text))
        .map(|line| line.index)
        .collect()
}

fn line_matches(buffer: &LineBuffer, index: usize, pattern: &Pattern) -> bool {
    buffer.get(index).is_some_and(|text| pattern.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> LineBuffer {
        LineBuffer::from_lines([
            "    if-nez v5, :cond_1",
            "    const-string v0, \"x\"",
            "    if-nez v5, :cond_2",
            "    nop",
            "    const-string v1, \"marker\"",
        ])
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Pattern::new("broken", "([a-").unwrap_err();
        assert_eq!(err.name, "broken");
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let pattern = Pattern::literal("manifest", "\"<manifest> specifies bad sharedUserId name \\\"\"");
        assert!(pattern.is_match(
            "    const-string v1, \"<manifest> specifies bad sharedUserId name \\\"\""
        ));
        assert!(!pattern.is_match("    const-string v1, \"<manifest>\""));
    }

    #[test]
    fn test_find_first_directions() {
        let buf = buffer();
        let pattern = Pattern::new("if", r"if-nez v5, :cond_\w+").unwrap();

        assert_eq!(find_first(&buf, &pattern, 1, SearchDirection::Forward), Some(2));
        assert_eq!(find_first(&buf, &pattern, 1, SearchDirection::Backward), Some(0));
        assert_eq!(find_first(&buf, &pattern, 1, SearchDirection::None), None);
        assert_eq!(find_first(&buf, &pattern, 2, SearchDirection::None), Some(2));
        assert_eq!(find_first(&buf, &pattern, 10, SearchDirection::Forward), None);
    }

    #[test]
    fn test_find_within_nearest_preceding() {
        let buf = buffer();
        let pattern = Pattern::new("if", r"if-nez v5, :cond_\w+").unwrap();

        assert_eq!(
            find_within(&buf, &pattern, 4, SearchDirection::Backward, SearchWindow::Unbounded),
            Some(2)
        );
        assert_eq!(
            find_within(&buf, &pattern, 4, SearchDirection::Backward, SearchWindow::Lines(1)),
            None
        );
        assert_eq!(
            find_within(&buf, &pattern, 4, SearchDirection::Backward, SearchWindow::Lines(2)),
            Some(2)
        );
    }

    #[test]
    fn test_find_within_forward_window() {
        let buf = buffer();
        let pattern = Pattern::new("nop", r"^\s*nop$").unwrap();

        assert_eq!(
            find_within(&buf, &pattern, 2, SearchDirection::Forward, SearchWindow::Lines(1)),
            Some(3)
        );
        assert_eq!(
            find_within(&buf, &pattern, 1, SearchDirection::Forward, SearchWindow::Lines(1)),
            None
        );
        assert_eq!(
            find_within(&buf, &pattern, 4, SearchDirection::Forward, SearchWindow::Unbounded),
            None
        );
    }

    #[test]
    fn test_find_all() {
        let buf = buffer();
        let pattern = Pattern::new("label", r":cond_\d").unwrap();
        assert_eq!(find_all(&buf, &pattern), vec![0, 2]);
    }

    #[test]
    fn test_listing_directives() {
        assert!(is_method_header(".method public static foo()Z"));
        assert!(!is_method_header("    .end method"));
        assert!(is_method_footer("    .end method  "));
        assert!(is_register_declaration("    .registers 4"));
        assert!(is_register_declaration("    .locals 0"));
        assert!(!is_register_declaration("    const/4 v0, 0x1"));
        assert!(has_branch_label("    :cond_a1"));
        assert!(has_branch_label("    if-eqz v6, :cond_0"));
        assert!(!has_branch_label("    :goto_0"));
    }
}
