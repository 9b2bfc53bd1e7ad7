//! Recursive expansion of pattern entries into scheduled events.

use super::entry::{PatternEntry, PitchValue};
use crate::error::{Result, SequencerError};
use crate::types::pitch::PitchResolver;
use crate::types::scheduled_event::{clamp_velocity, ScheduledEvent};
use crate::types::time::{bars, origin, to_f64, Arc, Time};
use rand::Rng;

/// Everything the expander needs besides the pattern itself
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpandParams {
    /// Offset of the first slot, in bars from the caller's zero point
    pub start: Time,
    /// Length of the whole pattern in bars (must be > 0)
    pub span: Time,
    /// Added to every resolved pitch
    pub pitch_offset: i32,
    /// Velocity before jitter (0-127)
    pub base_velocity: u8,
    /// Fraction of the slot width each note sounds for, in (0, 1]
    pub sustain_fraction: f64,
    /// Pan before jitter (-1.0 to 1.0)
    pub pan: f64,
    pub output_route: usize,
    /// Velocity is scaled by a uniform draw from [1 - jitter, 1]
    pub velocity_jitter: f64,
    /// Pan is scaled by a uniform draw from [1 - jitter, 1]
    pub pan_jitter: f64,
}

impl Default for ExpandParams {
    fn default() -> Self {
        Self {
            start: origin(),
            span: bars(1),
            pitch_offset: 0,
            base_velocity: 100,
            sustain_fraction: 1.0,
            pan: 0.0,
            output_route: 0,
            velocity_jitter: 0.0,
            pan_jitter: 0.0,
        }
    }
}

impl ExpandParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, start: Time) -> Self {
        self.start = start;
        self
    }

    pub fn with_span(mut self, span: Time) -> Self {
        self.span = span;
        self
    }

    pub fn with_pitch_offset(mut self, pitch_offset: i32) -> Self {
        self.pitch_offset = pitch_offset;
        self
    }

    pub fn with_velocity(mut self, base_velocity: u8) -> Self {
        self.base_velocity = base_velocity;
        self
    }

    pub fn with_sustain(mut self, sustain_fraction: f64) -> Self {
        self.sustain_fraction = sustain_fraction;
        self
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.pan = pan;
        self
    }

    pub fn with_route(mut self, output_route: usize) -> Self {
        self.output_route = output_route;
        self
    }

    /// Set velocity and pan humanization
    pub fn with_jitter(mut self, velocity_jitter: f64, pan_jitter: f64) -> Self {
        self.velocity_jitter = velocity_jitter;
        self.pan_jitter = pan_jitter;
        self
    }

    /// Reject parameter sets that cannot produce well-formed events
    pub fn validate(&self) -> Result<()> {
        if !Arc::with_length(self.start, self.span).is_positive() {
            return Err(SequencerError::malformed(format!(
                "span length must be positive, got {}",
                self.span
            )));
        }
        if !(self.sustain_fraction > 0.0 && self.sustain_fraction <= 1.0) {
            return Err(SequencerError::malformed(format!(
                "sustain fraction must be in (0, 1], got {}",
                self.sustain_fraction
            )));
        }
        for (label, jitter) in [
            ("velocity", self.velocity_jitter),
            ("pan", self.pan_jitter),
        ] {
            if !(0.0..=1.0).contains(&jitter) {
                return Err(SequencerError::malformed(format!(
                    "{} jitter must be in [0, 1], got {}",
                    label, jitter
                )));
            }
        }
        if !self.pan.is_finite() {
            return Err(SequencerError::malformed("pan must be finite"));
        }
        Ok(())
    }
}

/// Expand `entries` over `params.span` starting at `params.start`.
///
/// Slots are visited depth-first in order; every emitted event draws one
/// velocity sample and then one pan sample from `rng`. The first unresolvable
/// pitch name aborts the whole expansion.
pub fn expand_entries<R, P>(
    entries: &[PatternEntry],
    params: &ExpandParams,
    resolver: &P,
    rng: &mut R,
) -> Result<Vec<ScheduledEvent>>
where
    R: Rng + ?Sized,
    P: PitchResolver + ?Sized,
{
    params.validate()?;

    let mut expander = Expander {
        params,
        resolver,
        rng,
        events: Vec::new(),
    };
    expander.expand_slots(
        entries,
        Span::Exact(Arc::with_length(params.start, params.span)),
    )?;
    Ok(expander.events)
}

/// Slot being expanded. Exact ratios are used until a subdivision no longer
/// fits in `i64`, after which the remaining nesting continues in `f64`.
#[derive(Clone, Copy, Debug)]
enum Span {
    Exact(Arc),
    Approx { start: f64, length: f64 },
}

impl Span {
    fn slot(self, index: usize, count: usize) -> Span {
        match self {
            Span::Exact(arc) => match arc.slot(index, count) {
                Some(slot) => Span::Exact(slot),
                None => Span::Approx {
                    start: self.start(),
                    length: self.length(),
                }
                .slot(index, count),
            },
            Span::Approx { start, length } => {
                let width = length / count as f64;
                Span::Approx {
                    start: start + width * index as f64,
                    length: width,
                }
            }
        }
    }

    fn start(self) -> f64 {
        match self {
            Span::Exact(arc) => to_f64(arc.start),
            Span::Approx { start, .. } => start,
        }
    }

    fn length(self) -> f64 {
        match self {
            Span::Exact(arc) => match arc.checked_duration() {
                Some(duration) => to_f64(duration),
                None => to_f64(arc.end) - to_f64(arc.start),
            },
            Span::Approx { length, .. } => length,
        }
    }
}

struct Expander<'a, R: ?Sized, P: ?Sized> {
    params: &'a ExpandParams,
    resolver: &'a P,
    rng: &'a mut R,
    events: Vec<ScheduledEvent>,
}

impl<R, P> Expander<'_, R, P>
where
    R: Rng + ?Sized,
    P: PitchResolver + ?Sized,
{
    fn expand_slots(&mut self, entries: &[PatternEntry], span: Span) -> Result<()> {
        let count = entries.len();
        for (i, entry) in entries.iter().enumerate() {
            self.expand_entry(entry, span.slot(i, count))?;
        }
        Ok(())
    }

    fn expand_entry(&mut self, entry: &PatternEntry, slot: Span) -> Result<()> {
        match entry {
            PatternEntry::Rest => Ok(()),
            // Each member behaves like a one-slot sub-pattern over the same slot
            PatternEntry::Chord(members) => {
                for member in members {
                    self.expand_slots(std::slice::from_ref(member), slot)?;
                }
                Ok(())
            }
            PatternEntry::SubPattern(entries) => self.expand_slots(entries, slot),
            PatternEntry::Pitch(value) => self.emit(value, slot),
        }
    }

    fn emit(&mut self, value: &PitchValue, slot: Span) -> Result<()> {
        let pitch = value.resolve(self.resolver)? + self.params.pitch_offset;

        let velocity_scale = self.sample_scale(self.params.velocity_jitter);
        let pan_scale = self.sample_scale(self.params.pan_jitter);

        self.events.push(ScheduledEvent {
            start_offset: slot.start(),
            pitch,
            velocity: clamp_velocity(self.params.base_velocity as f64 * velocity_scale),
            duration: slot.length() * self.params.sustain_fraction,
            pan: (self.params.pan * pan_scale).clamp(-1.0, 1.0),
            output_route: self.params.output_route,
        });
        Ok(())
    }

    /// Uniform draw from [1 - jitter, 1]
    fn sample_scale(&mut self, jitter: f64) -> f64 {
        self.rng.gen_range((1.0 - jitter)..=1.0)
    }
}
