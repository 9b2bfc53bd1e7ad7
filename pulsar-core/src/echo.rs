//! Echo generator: bounded, probabilistic repeats of a single trigger
//!
//! Repeats are spaced `loop_length` bars apart. Each one can be dropped by
//! chance, nudged onto the 1/16 grid, or pulled a sixteenth early when the
//! caller's position sits on a syncopation-eligible step.

use crate::types::scheduled_event::ScheduledEvent;
use crate::types::time::{coarse_step_mod4, quantize_correction, GRID_DIVISION};
use rand::Rng;

/// Shortest note an echo will emit, in bars
pub const MIN_NOTE_LENGTH: f64 = 1.0 / 128.0;

/// The note that sets off an echo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trigger {
    pub pitch: i32,
    pub velocity: u8,
}

impl Trigger {
    pub fn new(pitch: i32, velocity: u8) -> Self {
        Self { pitch, velocity }
    }
}

impl From<&ScheduledEvent> for Trigger {
    fn from(event: &ScheduledEvent) -> Self {
        Trigger {
            pitch: event.pitch,
            velocity: event.velocity,
        }
    }
}

/// Echo configuration, built once and reused for every trigger
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EchoSpec {
    /// How many repeats (including repeat 0) to consider
    pub repeat_count: usize,
    /// Spacing between repeats, in bars
    pub loop_length: f64,
    /// Length of every emitted note, in bars
    pub note_length: f64,
    /// Chance that an eligible repeat is pulled a sixteenth early
    pub syncopate_chance: f64,
    /// Chance that any single repeat plays
    pub play_probability: f64,
    /// Route for every repeat after the first (repeat 0 always uses route 0)
    pub secondary_output_route: usize,
    /// Drop repeat 0 entirely
    pub suppress_first: bool,
    /// Snap offsets onto the 1/16 grid relative to the caller's position
    pub quantize: bool,
    pub pan: f64,
}

impl Default for EchoSpec {
    fn default() -> Self {
        Self {
            repeat_count: 4,
            loop_length: 0.125,
            note_length: 1.0 / 16.0,
            syncopate_chance: 0.0,
            play_probability: 1.0,
            secondary_output_route: 1,
            suppress_first: false,
            quantize: false,
            pan: 0.0,
        }
    }
}

impl EchoSpec {
    pub fn new(repeat_count: usize, loop_length: f64) -> Self {
        Self {
            repeat_count,
            loop_length: clamp_loop_length(loop_length),
            ..Self::default()
        }
    }

    /// This spec with every builder clamp applied, for fields set directly
    pub fn normalized(&self) -> Self {
        Self::new(self.repeat_count, self.loop_length)
            .with_note_length(self.note_length)
            .with_probabilities(self.play_probability, self.syncopate_chance)
            .with_secondary_route(self.secondary_output_route)
            .suppress_first(self.suppress_first)
            .quantized(self.quantize)
            .with_pan(self.pan)
    }

    pub fn with_note_length(mut self, note_length: f64) -> Self {
        // NaN falls through to the minimum
        self.note_length = note_length.max(MIN_NOTE_LENGTH);
        self
    }

    pub fn with_probabilities(mut self, play_probability: f64, syncopate_chance: f64) -> Self {
        self.play_probability = clamp_probability(play_probability);
        self.syncopate_chance = clamp_probability(syncopate_chance);
        self
    }

    pub fn with_secondary_route(mut self, route: usize) -> Self {
        self.secondary_output_route = route;
        self
    }

    pub fn suppress_first(mut self, suppress: bool) -> Self {
        self.suppress_first = suppress;
        self
    }

    pub fn quantized(mut self, quantize: bool) -> Self {
        self.quantize = quantize;
        self
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
        self
    }
}

fn clamp_loop_length(loop_length: f64) -> f64 {
    if loop_length.is_finite() {
        loop_length.max(0.0)
    } else {
        0.0
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Generate the repeats of `trigger`.
///
/// `current_grid_position` is the caller's position in fractional bars; it
/// drives both the quantize correction and syncopation eligibility, and is
/// read once per call. Random draws per repeat, in order: one play draw, then
/// one syncopation draw if the repeat is eligible.
pub fn echo<R: Rng + ?Sized>(
    trigger: Trigger,
    spec: &EchoSpec,
    current_grid_position: f64,
    rng: &mut R,
) -> Vec<ScheduledEvent> {
    let spec = &spec.normalized();
    let correction = if spec.quantize {
        quantize_correction(current_grid_position)
    } else {
        0.0
    };
    let syncopated_step = matches!(coarse_step_mod4(current_grid_position), 0 | 3);

    let mut events = Vec::new();
    for i in 0..spec.repeat_count {
        if i == 0 && spec.suppress_first {
            continue;
        }
        if !chance(rng, spec.play_probability) {
            continue;
        }

        let mut pos = i as f64 * spec.loop_length + correction;
        if i > 0 && syncopated_step && chance(rng, spec.syncopate_chance) {
            pos -= 1.0 / GRID_DIVISION;
        }

        let output_route = if i == 0 {
            0
        } else {
            spec.secondary_output_route
        };

        events.push(ScheduledEvent {
            start_offset: pos,
            pitch: trigger.pitch,
            velocity: trigger.velocity,
            duration: spec.note_length,
            pan: spec.pan,
            output_route,
        });
    }

    log::trace!(
        "echo of pitch {} at {:.4}: {} of {} repeats",
        trigger.pitch,
        current_grid_position,
        events.len(),
        spec.repeat_count
    );
    events
}

/// Echo every event of an expanded pattern, keeping each echo anchored at its source event
pub fn echo_each<R: Rng + ?Sized>(
    sources: &[ScheduledEvent],
    spec: &EchoSpec,
    current_grid_position: f64,
    rng: &mut R,
) -> Vec<ScheduledEvent> {
    let mut events = Vec::new();
    for source in sources {
        for mut repeat in echo(source.into(), spec, current_grid_position, rng) {
            repeat.start_offset += source.start_offset;
            events.push(repeat);
        }
    }
    events
}

/// True with probability `p` (always for p >= 1, never for p <= 0)
fn chance<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_four_repeats_one_bar_apart() {
        let spec = EchoSpec::new(4, 1.0).with_secondary_route(2);
        let events = echo(Trigger::new(60, 100), &spec, 0.0, &mut rng());

        let offsets: Vec<f64> = events.iter().map(|e| e.start_offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(events.iter().all(|e| e.pitch == 60 && e.velocity == 100));
        assert_eq!(events[0].output_route, 0);
        assert!(events[1..].iter().all(|e| e.output_route == 2));
    }

    #[test]
    fn test_fields_set_directly_are_clamped() {
        let spec = EchoSpec {
            repeat_count: 3,
            loop_length: -0.5,
            note_length: 0.0,
            play_probability: 4.0,
            pan: 9.0,
            ..EchoSpec::default()
        };
        let events = echo(Trigger::new(60, 100), &spec, 0.0, &mut rng());

        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.start_offset == 0.0));
        assert!(events.iter().all(|e| e.duration == MIN_NOTE_LENGTH));
        assert!(events.iter().all(|e| e.pan == 1.0));
    }

    #[test]
    fn test_zero_repeats_is_empty() {
        let spec = EchoSpec::new(0, 1.0);
        assert!(echo(Trigger::new(60, 100), &spec, 0.0, &mut rng()).is_empty());
    }

    #[test]
    fn test_suppress_first_drops_repeat_zero() {
        let spec = EchoSpec::new(3, 0.5).suppress_first(true);
        let events = echo(Trigger::new(64, 90), &spec, 0.0, &mut rng());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start_offset, 0.5);
        assert_eq!(events[0].output_route, spec.secondary_output_route);
    }

    #[test]
    fn test_zero_play_probability_silences_everything() {
        let spec = EchoSpec::new(16, 0.25).with_probabilities(0.0, 0.0);
        assert!(echo(Trigger::new(60, 100), &spec, 0.0, &mut rng()).is_empty());
    }

    #[test]
    fn test_partial_probability_filters_independently() {
        let spec = EchoSpec::new(200, 0.25).with_probabilities(0.5, 0.0);
        let events = echo(Trigger::new(60, 100), &spec, 0.0, &mut rng());
        assert!(!events.is_empty() && events.len() < 200);
        // Survivors stay on their nominal positions
        for e in &events {
            let slot = e.start_offset / 0.25;
            assert_eq!(slot, slot.round());
        }
    }

    #[test]
    fn test_syncopation_pulls_eligible_repeats_early() {
        let spec = EchoSpec::new(3, 1.0).with_probabilities(1.0, 1.0);
        // Position 0.0 sits on coarse step 0, which is eligible
        let events = echo(Trigger::new(60, 100), &spec, 0.0, &mut rng());
        let offsets: Vec<f64> = events.iter().map(|e| e.start_offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0 - 0.0625, 2.0 - 0.0625]);
    }

    #[test]
    fn test_syncopation_ignored_on_ineligible_step() {
        let spec = EchoSpec::new(3, 1.0).with_probabilities(1.0, 1.0);
        // 1/32 of a bar is coarse step 1
        let events = echo(Trigger::new(60, 100), &spec, 1.0 / 32.0, &mut rng());
        let offsets: Vec<f64> = events.iter().map(|e| e.start_offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_quantize_applies_one_correction_to_every_repeat() {
        let spec = EchoSpec::new(3, 0.5).quantized(true);
        // 0.3 bars snaps to 0.3125, a correction of +0.0125
        let events = echo(Trigger::new(60, 100), &spec, 0.3, &mut rng());
        let expected = [0.0125, 0.5125, 1.0125];
        for (e, want) in events.iter().zip(expected) {
            assert!((e.start_offset - want).abs() < 1e-9);
        }
    }

    #[test]
    fn test_spec_pan_and_note_length_copied() {
        let spec = EchoSpec::new(2, 0.25)
            .with_pan(-0.5)
            .with_note_length(0.125);
        let events = echo(Trigger::new(48, 70), &spec, 0.0, &mut rng());
        assert!(events.iter().all(|e| e.pan == -0.5 && e.duration == 0.125));
    }

    #[test]
    fn test_echo_each_anchors_on_sources() {
        let sources = vec![
            ScheduledEvent::new(0.0, 60, 100, 0.25),
            ScheduledEvent::new(0.5, 67, 80, 0.25),
        ];
        let spec = EchoSpec::new(2, 0.125);
        let events = echo_each(&sources, &spec, 0.0, &mut rng());
        let summary: Vec<(f64, i32)> = events.iter().map(|e| (e.start_offset, e.pitch)).collect();
        assert_eq!(
            summary,
            vec![(0.0, 60), (0.125, 60), (0.5, 67), (0.625, 67)]
        );
    }
}
