//! The universal output unit of every generator in the core
//!
//! Offsets are relative to a zero point chosen by the caller; an
//! [`EventSink`](crate::sink::EventSink) resolves them into absolute time.

/// Highest MIDI velocity
pub const MAX_VELOCITY: u8 = 127;

/// A fully resolved note, ready for dispatch
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduledEvent {
    /// Offset from the caller's zero point (bars for patterns and echoes, seconds for imports)
    pub start_offset: f64,
    /// Note number
    pub pitch: i32,
    /// Velocity (0-127)
    pub velocity: u8,
    /// Length in the same unit as `start_offset`, always > 0
    pub duration: f64,
    /// Stereo position (-1.0 = left, 0.0 = center, 1.0 = right)
    pub pan: f64,
    /// Which downstream output receives the event
    pub output_route: usize,
}

impl ScheduledEvent {
    /// Create a centered event on route 0
    pub fn new(start_offset: f64, pitch: i32, velocity: u8, duration: f64) -> Self {
        Self {
            start_offset,
            pitch,
            velocity,
            duration,
            pan: 0.0,
            output_route: 0,
        }
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.pan = pan.clamp(-1.0, 1.0);
        self
    }

    pub fn with_route(mut self, output_route: usize) -> Self {
        self.output_route = output_route;
        self
    }

    /// Offset at which the note stops sounding
    #[inline]
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.duration
    }
}

/// Clamp a computed velocity into the MIDI range
#[inline]
pub fn clamp_velocity(velocity: f64) -> u8 {
    velocity.round().clamp(0.0, MAX_VELOCITY as f64) as u8
}
