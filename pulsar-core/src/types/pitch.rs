//! Symbolic pitch resolution
//!
//! Pattern entries may name pitches instead of numbering them. A
//! [`PitchResolver`] turns those names into note numbers once, at expansion
//! time, and reports unknown names as [`SequencerError::Resolution`].

use crate::error::{Result, SequencerError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Maps a pitch name to a note number
pub trait PitchResolver {
    fn resolve(&self, name: &str) -> Result<i32>;
}

/// A note name in scientific pitch notation (C4 = middle C = 60)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pitch_class: u8,
    octave: i8,
}

impl NoteName {
    /// Chromatic pitch class (0-11)
    pub fn pitch_class(&self) -> u8 {
        self.pitch_class
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    /// MIDI-style note number: (octave + 1) * 12 + pitch_class
    pub fn note_number(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.pitch_class as i32
    }
}

impl FromStr for NoteName {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || SequencerError::Resolution {
            name: s.to_string(),
        };
        let upper = s.trim().to_uppercase();

        // Note name is the letter plus an optional accidental; the rest is the octave
        let mut note_part_end = match upper.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => 1,
            _ => return Err(unknown()),
        };
        if let Some(c) = upper[1..].chars().next() {
            if c == '#' || c == 'B' || c == 'S' {
                note_part_end += 1;
            }
        }

        let natural: i8 = match &upper[..1] {
            "C" => 0,
            "D" => 2,
            "E" => 4,
            "F" => 5,
            "G" => 7,
            "A" => 9,
            "B" => 11,
            _ => return Err(unknown()),
        };
        let accidental: i8 = match &upper[1..note_part_end] {
            "" => 0,
            "#" | "S" => 1,
            _ => -1,
        };

        let octave_part = &upper[note_part_end..];
        let written_octave = if octave_part.is_empty() {
            4
        } else {
            octave_part.parse::<i8>().map_err(|_| unknown())?
        };

        // Cb, Fb, E# and B# spill into the neighbouring pitch class, and Cb and
        // B# into the neighbouring octave too
        let raw = natural + accidental;
        let octave = written_octave
            .checked_add(raw.div_euclid(12))
            .ok_or_else(unknown)?;
        let pitch_class = raw.rem_euclid(12) as u8;

        Ok(NoteName {
            pitch_class,
            octave,
        })
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        write!(f, "{}{}", NAMES[self.pitch_class as usize], self.octave)
    }
}

/// Resolves scientific pitch names such as `C4`, `F#3`, `Bb-1`
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteNameResolver;

impl PitchResolver for NoteNameResolver {
    fn resolve(&self, name: &str) -> Result<i32> {
        name.parse::<NoteName>().map(|n| n.note_number())
    }
}

/// Named pitches checked before falling back to note names.
///
/// Useful for drum kits where `kick` or `hh` read better than `C2` or `F#2`.
#[derive(Debug, Clone, Default)]
pub struct PitchTable {
    aliases: HashMap<String, i32>,
}

impl PitchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias (names are matched case-insensitively)
    pub fn with_alias(mut self, name: &str, pitch: i32) -> Self {
        self.aliases.insert(name.to_lowercase(), pitch);
        self
    }

    /// General MIDI percussion names (channel 10 note numbers)
    pub fn general_midi_drums() -> Self {
        Self::new()
            .with_alias("kick", 36)
            .with_alias("bd", 36)
            .with_alias("rim", 37)
            .with_alias("snare", 38)
            .with_alias("sd", 38)
            .with_alias("clap", 39)
            .with_alias("cp", 39)
            .with_alias("hh", 42)
            .with_alias("hihat", 42)
            .with_alias("tom", 45)
            .with_alias("oh", 46)
            .with_alias("crash", 49)
            .with_alias("ride", 51)
            .with_alias("cowbell", 56)
    }
}

impl PitchResolver for PitchTable {
    fn resolve(&self, name: &str) -> Result<i32> {
        match self.aliases.get(&name.trim().to_lowercase()) {
            Some(&pitch) => Ok(pitch),
            None => NoteNameResolver.resolve(name),
        }
    }
}
