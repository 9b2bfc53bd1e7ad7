//! Writing imported notes into persistent timelines

use super::importer::{ImportedNote, TrackImport};
use crate::sink::Timeline;
use std::fmt;

/// Write `notes` into `timeline`, then fit its visible range
pub fn render<T: Timeline + ?Sized>(notes: &[ImportedNote], timeline: &mut T) {
    for note in notes {
        timeline.add_note(note.onset, note.pitch, note.velocity, note.duration);
    }
    timeline.fit();
}

/// Create one timeline per non-empty track via `factory`, which receives the
/// timeline's name (`"MIDI Track {n}"`). Empty tracks are skipped.
pub fn materialize<T, F>(import: &TrackImport, mut factory: F) -> Vec<(usize, T)>
where
    T: Timeline,
    F: FnMut(&str) -> T,
{
    let mut timelines = Vec::new();
    for (&track, notes) in import.iter() {
        if notes.is_empty() {
            log::info!("skipping empty track {}", track);
            continue;
        }
        let mut timeline = factory(&format!("MIDI Track {}", track));
        render(notes, &mut timeline);
        timelines.push((track, timeline));
    }
    timelines
}

/// A note held by a [`NoteCanvas`], times in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanvasNote {
    pub onset: f64,
    pub pitch: i32,
    pub velocity: u8,
    pub length: f64,
}

/// In-memory timeline
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteCanvas {
    pub name: String,
    notes: Vec<CanvasNote>,
    /// Visible length in seconds, set by `fit`
    length: f64,
}

impl NoteCanvas {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn notes(&self) -> &[CanvasNote] {
        &self.notes
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Lowest and highest pitch on the canvas
    pub fn pitch_range(&self) -> Option<(i32, i32)> {
        let low = self.notes.iter().map(|n| n.pitch).min()?;
        let high = self.notes.iter().map(|n| n.pitch).max()?;
        Some((low, high))
    }
}

impl Timeline for NoteCanvas {
    fn add_note(&mut self, onset: f64, pitch: i32, velocity: u8, length: f64) {
        self.notes.push(CanvasNote {
            onset,
            pitch,
            velocity,
            length,
        });
    }

    fn fit(&mut self) {
        self.length = self
            .notes
            .iter()
            .map(|n| n.onset + n.length)
            .fold(0.0, f64::max);
    }
}

impl fmt::Display for NoteCanvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} notes, {:.2}s", self.name, self.notes.len(), self.length)?;
        if let Some((low, high)) = self.pitch_range() {
            write!(f, ", pitches {}-{}", low, high)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{import, PerformanceEvent};

    #[test]
    fn test_render_adds_then_fits() {
        let notes = [
            ImportedNote {
                pitch: 60,
                velocity: 100,
                onset: 0.0,
                duration: 0.5,
            },
            ImportedNote {
                pitch: 67,
                velocity: 80,
                onset: 1.0,
                duration: 0.25,
            },
        ];
        let mut canvas = NoteCanvas::new("test");
        render(&notes, &mut canvas);

        assert_eq!(canvas.notes().len(), 2);
        assert_eq!(canvas.length(), 1.25);
        assert_eq!(canvas.pitch_range(), Some((60, 67)));
    }

    #[test]
    fn test_materialize_names_and_skips_empty() {
        let note = vec![PerformanceEvent::on(60, 100, 0), PerformanceEvent::off(60, 0, 480)];
        let result = import(&[Vec::new(), note], 480, 500_000).unwrap();

        let canvases = materialize(&result, NoteCanvas::new);
        assert_eq!(canvases.len(), 1);
        assert_eq!(canvases[0].0, 1);
        assert_eq!(canvases[0].1.name, "MIDI Track 1");
        assert_eq!(canvases[0].1.to_string(), "MIDI Track 1: 1 notes, 0.50s, pitches 60-60");
    }
}
