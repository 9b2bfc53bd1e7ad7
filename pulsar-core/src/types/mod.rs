// pulsar-core/src/types/mod.rs

pub mod pattern;
pub mod pitch;
pub mod scheduled_event;
pub mod time;

pub use pattern::{ExpandParams, Pattern, PatternEntry, PitchValue, SequenceCursor};
pub use pitch::{NoteName, NoteNameResolver, PitchResolver, PitchTable};
pub use scheduled_event::ScheduledEvent;
pub use time::{Arc, Time};
