//! In-memory line buffer for a single listing file

use std::ops::Range;

use crate::edit::{apply_edits, EditError, LineEdit};

/// Line terminator detected in a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// A line together with its position at the time of access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub index: usize,
    pub text: &'a str,
}

/// The lines of exactly one listing
///
/// Lines are stored without their terminators. Positions handed out by
/// [`LineBuffer::iter`] are only valid until the next mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl LineBuffer {
    /// Split source text into a buffer
    ///
    /// The first terminator decides the line ending. In an LF buffer a stray
    /// `\r` stays part of its line, so such a file still renders unchanged.
    pub fn from_source(source: &str) -> Self {
        let line_ending = match source.find('\n') {
            Some(i) if source[..i].ends_with('\r') => LineEnding::CrLf,
            _ => LineEnding::Lf,
        };

        let trailing_newline = source.ends_with('\n');
        let body = if trailing_newline {
            &source[..source.len() - 1]
        } else {
            source
        };

        let lines = if source.is_empty() {
            Vec::new()
        } else {
            body.split('\n')
                .map(|l| match line_ending {
                    LineEnding::CrLf => l.strip_suffix('\r').unwrap_or(l).to_string(),
                    LineEnding::Lf => l.to_string(),
                })
                .collect()
        };

        Self {
            lines,
            line_ending,
            trailing_newline,
        }
    }

    /// Build a buffer from individual lines (LF, terminated)
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            line_ending: LineEnding::Lf,
            trailing_newline: true,
        }
    }

    /// Render the buffer back to text using the original terminator
    pub fn to_source(&self) -> String {
        let mut out = self.lines.join(self.line_ending.as_str());
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(self.line_ending.as_str());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Text of the line at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Iterate lines with their current positions
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Line<'_>> + ExactSizeIterator {
        self.lines
            .iter()
            .enumerate()
            .map(|(index, text)| Line { index, text })
    }

    /// All lines as a slice
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn insert_before(&mut self, index: usize, line: impl Into<String>) -> Result<(), EditError> {
        self.apply(&[LineEdit::insert_before(index, line, "insert before")])
    }

    pub fn insert_after(&mut self, index: usize, line: impl Into<String>) -> Result<(), EditError> {
        self.check_index(index)?;
        self.apply(&[LineEdit::insert_after(index, line, "insert after")])
    }

    pub fn delete(&mut self, range: Range<usize>) -> Result<(), EditError> {
        self.apply(&[LineEdit::delete(range, "delete")])
    }

    pub fn replace_range(&mut self, range: Range<usize>, lines: Vec<String>) -> Result<(), EditError> {
        self.apply(&[LineEdit::new(range, lines, "replace")])
    }

    /// Apply a batch of edits planned against the current positions
    pub fn apply(&mut self, edits: &[LineEdit]) -> Result<(), EditError> {
        apply_edits(&mut self.lines, edits)
    }

    fn check_index(&self, index: usize) -> Result<(), EditError> {
        if index >= self.lines.len() {
            return Err(EditError::RangeOutOfBounds {
                start: index,
                end: index + 1,
                len: self.lines.len(),
            });
        }
        Ok(())
    }
}
