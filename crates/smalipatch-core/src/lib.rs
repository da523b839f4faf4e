//! smalipatch-core: Core abstractions for patching smali listings
//!
//! This crate provides:
//! - `LineBuffer`: The lines of one listing, with position-stable editing
//! - `LineEdit`: A line-range modification
//! - `apply_edits()`: Function to apply a batch of edits highest-first
//! - `Pattern` / `matcher`: Named line patterns and directional search
//! - `MethodTracker`: Segments a listing into method bodies

mod buffer;
mod edit;
pub mod matcher;
pub mod method;

pub use buffer::{Line, LineBuffer, LineEnding};
pub use edit::{apply_edits, EditError, LineEdit};
pub use matcher::{Pattern, PatternError, SearchDirection, SearchWindow};
pub use method::{ListingError, MethodSegment, MethodTracker};
