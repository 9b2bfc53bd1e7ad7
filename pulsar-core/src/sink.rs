//! Collaborator contracts at the edges of the core
//!
//! The core emits into an [`EventSink`], materializes imports into a
//! [`Timeline`], and is handed positions read from a [`Transport`]. None of
//! them are implemented against real time here, which keeps every generator
//! testable without a running clock.

use crate::types::ScheduledEvent;

/// Receives scheduled events.
///
/// Offsets are relative to a zero point the caller chose when it built the
/// sink; resolving them into absolute transport time is the sink's job.
pub trait EventSink {
    fn accept(&mut self, event: ScheduledEvent);
}

impl EventSink for Vec<ScheduledEvent> {
    fn accept(&mut self, event: ScheduledEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn accept(&mut self, event: ScheduledEvent) {
        (**self).accept(event);
    }
}

/// A persistent note timeline ("canvas") that imported notes can be written into
pub trait Timeline {
    /// Add one note; times are in seconds from the timeline start
    fn add_note(&mut self, onset: f64, pitch: i32, velocity: u8, length: f64);

    /// Resize the visible range to the notes it holds
    fn fit(&mut self);
}

/// Musical position and tempo, as supplied by the host clock
pub trait Transport {
    /// Current position in fractional bars since the transport started
    fn position_bars(&self) -> f64;

    fn tempo_bpm(&self) -> f64;
}
