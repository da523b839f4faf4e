//! Method body tracking
//!
//! Segments a listing into the methods whose header matches a signature
//! pattern. Methods never nest in smali, so at most one segment is open at a
//! time; anything else is reported as a malformed listing.

use thiserror::Error;

use crate::buffer::LineBuffer;
use crate::edit::LineEdit;
use crate::matcher::{is_method_footer, is_method_header, is_register_declaration, Pattern};

/// The listing does not have the expected method structure
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ListingError {
    #[error("Method header at line {line} while method opened at line {open_line} is still open")]
    NestedMethod { line: usize, open_line: usize },

    #[error("Method opened at line {open_line} is never closed")]
    UnterminatedMethod { open_line: usize },
}

/// One `.method` ... `.end method` span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSegment {
    /// `name(params)return` token of the header
    pub signature_key: String,
    pub header: String,
    pub header_index: usize,
    /// `.registers` / `.locals` line, absent for some zero-register methods
    pub registers: Option<String>,
    pub body: Vec<String>,
    pub footer: String,
    pub footer_index: usize,
}

impl MethodSegment {
    /// Whether the body already consists of exactly `lines`, ignoring indentation
    pub fn body_equals(&self, lines: &[String]) -> bool {
        self.body.len() == lines.len()
            && self
                .body
                .iter()
                .zip(lines)
                .all(|(have, want)| have.trim() == want.trim())
    }

    /// Lines of this method with its body swapped for `body`
    pub fn render_with_body(&self, body: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(body.len() + 3);
        out.push(self.header.clone());
        out.extend(self.registers.iter().cloned());
        out.extend(body.iter().cloned());
        out.push(self.footer.clone());
        out
    }

    /// Edit replacing everything between header and footer
    ///
    /// The header, register declaration and footer are kept verbatim so the
    /// method's calling convention is unchanged.
    pub fn replace_body_edit(&self, body: &[String], message: impl Into<String>) -> LineEdit {
        let mut replacement = Vec::with_capacity(body.len() + 1);
        replacement.extend(self.registers.iter().cloned());
        replacement.extend(body.iter().cloned());
        LineEdit::new(self.header_index + 1..self.footer_index, replacement, message)
    }
}

/// Extract the `name(params)return` token of a method header
pub fn signature_key(header: &str) -> String {
    header
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string()
}

enum TrackerState {
    Outside,
    InMethod(MethodSegment),
}

/// State machine collecting the methods matching one signature pattern
pub struct MethodTracker<'p> {
    signature: &'p Pattern,
}

impl<'p> MethodTracker<'p> {
    pub fn new(signature: &'p Pattern) -> Self {
        Self { signature }
    }

    /// Scan the buffer top to bottom and return every matching method
    ///
    /// Line numbers in errors are 1-based.
    pub fn segments(&self, buffer: &LineBuffer) -> Result<Vec<MethodSegment>, ListingError> {
        let mut segments = Vec::new();
        let mut state = TrackerState::Outside;

        for line in buffer.iter() {
            state = match state {
                TrackerState::Outside => {
                    if is_method_header(line.text) && self.signature.is_match(line.text) {
                        TrackerState::InMethod(MethodSegment {
                            signature_key: signature_key(line.text),
                            header: line.text.to_string(),
                            header_index: line.index,
                            registers: None,
                            body: Vec::new(),
                            footer: String::new(),
                            footer_index: 0,
                        })
                    } else {
                        TrackerState::Outside
                    }
                }
                TrackerState::InMethod(mut segment) => {
                    if is_method_footer(line.text) {
                        segment.footer = line.text.to_string();
                        segment.footer_index = line.index;
                        segments.push(segment);
                        TrackerState::Outside
                    } else if is_method_header(line.text) {
                        return Err(ListingError::NestedMethod {
                            line: line.index + 1,
                            open_line: segment.header_index + 1,
                        });
                    } else {
                        if segment.registers.is_none() && is_register_declaration(line.text) {
                            segment.registers = Some(line.text.to_string());
                        } else {
                            segment.body.push(line.text.to_string());
                        }
                        TrackerState::InMethod(segment)
                    }
                }
            };
        }

        if let TrackerState::InMethod(segment) = state {
            return Err(ListingError::UnterminatedMethod {
                open_line: segment.header_index + 1,
            });
        }

        Ok(segments)
    }
}
