//! Time helpers for exact subdivision and tick conversion
//!
//! Pattern slots are computed with rationals so that nested subdivisions
//! (thirds inside fifths inside a bar) stay exact no matter how deep the
//! nesting goes. Values only become `f64` when they leave the expander.

use num_rational::Ratio;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Signed, Zero};

/// Exact time point in bars from a caller-chosen origin
pub type Time = Ratio<i64>;

/// Grid resolution used by echo quantization and syncopation (1/16 of a bar)
pub const GRID_DIVISION: f64 = 16.0;

/// Coarse steps per bar used to decide syncopation eligibility
pub const COARSE_STEPS_PER_BAR: f64 = 32.0;

/// Microseconds per second, for tempo conversion
const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// A time arc [start, end) covering one slot or one whole pattern span
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arc {
    pub start: Time,
    pub end: Time,
}

impl Arc {
    /// Create a new arc from start to end
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    /// Create an arc from a start point and a length
    pub fn with_length(start: Time, length: Time) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    /// Duration of this arc
    pub fn duration(&self) -> Time {
        self.end - self.start
    }

    /// Check that the arc covers a strictly positive length
    pub fn is_positive(&self) -> bool {
        self.duration().is_positive()
    }

    /// The `index`-th of `count` equal slots of this arc, or `None` when the
    /// exact result no longer fits in an `i64` ratio (or `count` is zero).
    pub fn slot(&self, index: usize, count: usize) -> Option<Arc> {
        let width = self
            .checked_duration()?
            .checked_div(&Ratio::from_integer(i64::try_from(count).ok()?))?;
        let offset = width.checked_mul(&Ratio::from_integer(i64::try_from(index).ok()?))?;
        let start = self.start.checked_add(&offset)?;
        Some(Arc::new(start, start.checked_add(&width)?))
    }

    /// Duration, or `None` on overflow
    pub fn checked_duration(&self) -> Option<Time> {
        self.end.checked_sub(&self.start)
    }

    /// Check if a time point falls within this arc [start, end)
    pub fn contains(&self, t: Time) -> bool {
        t >= self.start && t < self.end
    }
}

/// Helper to create Time from a ratio n/d
#[inline]
pub fn time(n: i64, d: i64) -> Time {
    Ratio::new(n, d)
}

/// Create Time from an integer (whole bars)
#[inline]
pub fn bars(n: i64) -> Time {
    Ratio::from_integer(n)
}

/// The zero point
#[inline]
pub fn origin() -> Time {
    Time::zero()
}

/// Convert rational to f64 for event output
#[inline]
pub fn to_f64(t: Time) -> f64 {
    *t.numer() as f64 / *t.denom() as f64
}

/// Convert f64 to approximate Time (for values typed by a user or read from config)
/// Uses a fixed denominator for reasonable precision
pub fn from_f64(f: f64) -> Time {
    // 9600 = LCM of common musical divisions: 24, 32, 48, etc.
    let denom = 9600i64;
    let numer = (f * denom as f64).round() as i64;
    Ratio::new(numer, denom)
}

/// Convert a tick delta into seconds for a given resolution and tempo.
///
/// `tempo` is in microseconds per beat, as stored in Standard MIDI Files.
#[inline]
pub fn ticks_to_seconds(ticks: u64, ticks_per_beat: u32, tempo: u32) -> f64 {
    ticks as f64 * tempo as f64 / MICROS_PER_SECOND / ticks_per_beat as f64
}

/// Convert beats per minute to microseconds per beat
#[inline]
pub fn bpm_to_tempo(bpm: f64) -> u32 {
    (60.0 * MICROS_PER_SECOND / bpm).round() as u32
}

/// Signed offset that moves `position` onto the nearest 1/16 grid point
pub fn quantize_correction(position: f64) -> f64 {
    (position * GRID_DIVISION).round() / GRID_DIVISION - position
}

/// Index of the coarse (1/32) step `position` falls in, folded onto a 4-step cycle
pub fn coarse_step_mod4(position: f64) -> i64 {
    ((position * COARSE_STEPS_PER_BAR).floor() as i64).rem_euclid(4)
}
