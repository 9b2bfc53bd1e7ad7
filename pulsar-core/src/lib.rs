//! # Pulsar Core
//!
//! Synchronous scheduling core for the Pulsar sequencer. Turns declarative
//! musical input into resolved [`ScheduledEvent`]s without touching a clock,
//! a device, or the filesystem.
//!
//! ## Components
//!
//! - **Pattern expander**: nested patterns (rests, pitches, chords and
//!   sub-patterns) subdivided over a span of bars
//! - **Echo generator**: probabilistic, optionally syncopated repeats of a
//!   single trigger
//! - **Performance importer**: paired on/off messages with tick deltas turned
//!   into duration-bearing notes
//!
//! ## Features
//!
//! - **serde**: derive `Serialize`/`Deserialize` on the data types
//!
//! ## Example
//!
//! ```ignore
//! use pulsar_core::types::{ExpandParams, Pattern};
//!
//! let pattern = Pattern::parse("0 _ (0,4) [0 0]")?;
//! let events = pattern.expand(&ExpandParams::default(), &mut rand::thread_rng())?;
//! assert_eq!(events.len(), 5);
//! ```

pub mod echo;
pub mod error;
pub mod import;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use echo::{echo, EchoSpec, Trigger};
pub use error::{Result, SequencerError};
pub use import::{import, ImportedNote, NoteCanvas, PerformanceEvent, TrackImport};
pub use sink::{EventSink, Timeline, Transport};
pub use types::{ExpandParams, Pattern, PatternEntry, ScheduledEvent, SequenceCursor};
