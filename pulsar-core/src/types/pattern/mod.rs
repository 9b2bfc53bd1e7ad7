//! Nested patterns and their expansion into scheduled events
//!
//! A pattern divides a span of bars into equal slots. Each slot holds a rest,
//! a pitch, a chord (members sharing the slot start) or a sub-pattern that
//! subdivides the slot again.

mod core;
mod cursor;
mod entry;
mod expander;
mod parser;


// Re-export public types
pub use core::Pattern;
pub use cursor::SequenceCursor;
pub use entry::{PatternEntry, PitchValue};
pub use expander::{expand_entries, ExpandParams};
pub use parser::parse_entries;
