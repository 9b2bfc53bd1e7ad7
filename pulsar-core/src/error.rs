//! Error taxonomy shared by every component of the core.

use thiserror::Error;

/// Failures surfaced synchronously to the immediate caller.
///
/// Unmatched note-on/note-off messages in an imported performance are not
/// errors and never show up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencerError {
    /// A symbolic pitch name could not be mapped to a note number
    #[error("unknown pitch name '{name}'")]
    Resolution { name: String },

    /// Ticks-per-beat or tempo was zero or negative
    #[error("invalid time base: {ticks_per_beat} ticks per beat at {tempo} µs per beat")]
    InvalidTimeBase { ticks_per_beat: i64, tempo: i64 },

    /// Structurally invalid input (bad span, out-of-range parameters, syntax)
    #[error("malformed pattern: {0}")]
    MalformedPattern(String),
}

impl SequencerError {
    pub fn malformed(message: impl Into<String>) -> Self {
        SequencerError::MalformedPattern(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SequencerError>;
