//! Standard MIDI File decoding
//!
//! Reads a file with `midly` and flattens each track into the note on/off
//! stream the importer pairs. Messages the importer has no use for (meta
//! events, controllers, sysex) still carry time, so their deltas are folded
//! into the next note message on the same track.

use anyhow::{anyhow, Context, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use pulsar_core::import::{import_tracks, PerformanceEvent, TrackImport};
use std::path::Path;

/// A decoded file, ready for import
#[derive(Debug, Clone, PartialEq)]
pub struct Performance {
    pub ticks_per_beat: u32,
    /// First tempo found in the file, in microseconds per beat
    pub tempo: Option<u32>,
    pub tracks: Vec<Vec<PerformanceEvent>>,
}

impl Performance {
    /// Pair the selected tracks, using the file's tempo or `fallback_tempo`
    pub fn import(&self, fallback_tempo: u32, selection: &[usize]) -> Result<TrackImport> {
        let tempo = self.tempo.unwrap_or(fallback_tempo);
        let imported = import_tracks(
            &self.tracks,
            self.ticks_per_beat as i64,
            tempo as i64,
            selection,
        )?;
        Ok(imported)
    }
}

pub fn load_performance(path: &Path) -> Result<Performance> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    decode(&bytes).with_context(|| format!("failed to decode {}", path.display()))
}

pub fn decode(bytes: &[u8]) -> Result<Performance> {
    let smf = Smf::parse(bytes).map_err(|e| anyhow!("not a MIDI file: {}", e))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as u32,
        Timing::Timecode(..) => return Err(anyhow!("SMPTE timecode files are not supported")),
    };

    let mut tempo = None;
    let mut tracks = Vec::with_capacity(smf.tracks.len());

    for track in &smf.tracks {
        let mut events = Vec::new();
        let mut pending_ticks: u64 = 0;

        for event in track {
            pending_ticks += event.delta.as_int() as u64;

            let (pitch, velocity, on) = match event.kind {
                TrackEventKind::Midi { message, .. } => match message {
                    // Note-on with zero velocity is a note-off
                    MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int(), vel.as_int() > 0),
                    MidiMessage::NoteOff { key, vel } => (key.as_int(), vel.as_int(), false),
                    _ => continue,
                },
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    tempo.get_or_insert(t.as_int());
                    continue;
                }
                _ => continue,
            };

            let pitch = pitch as i32;
            events.push(if on {
                PerformanceEvent::on(pitch, velocity, pending_ticks)
            } else {
                PerformanceEvent::off(pitch, velocity, pending_ticks)
            });
            pending_ticks = 0;
        }

        tracks.push(events);
    }

    log::debug!(
        "decoded {} tracks at {} ticks per beat, tempo {:?}",
        tracks.len(),
        ticks_per_beat,
        tempo
    );

    Ok(Performance {
        ticks_per_beat,
        tempo,
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, TrackEvent};

    fn note(delta: u32, key: u8, vel: u8, on: bool) -> TrackEvent<'static> {
        let message = if on {
            MidiMessage::NoteOn {
                key: key.into(),
                vel: vel.into(),
            }
        } else {
            MidiMessage::NoteOff {
                key: key.into(),
                vel: vel.into(),
            }
        };
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message,
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn write(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(480.into())));
        smf.tracks = tracks;
        let mut buffer = Vec::new();
        smf.write(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_decode_tempo_and_notes() {
        let conductor = vec![
            meta(0, MetaMessage::Tempo(250_000.into())),
            meta(0, MetaMessage::EndOfTrack),
        ];
        let melody = vec![
            note(0, 60, 100, true),
            note(480, 60, 0, true),
            meta(0, MetaMessage::EndOfTrack),
        ];
        let performance = decode(&write(vec![conductor, melody])).unwrap();

        assert_eq!(performance.ticks_per_beat, 480);
        assert_eq!(performance.tempo, Some(250_000));
        assert!(performance.tracks[0].is_empty());
        assert_eq!(
            performance.tracks[1],
            vec![
                PerformanceEvent::on(60, 100, 0),
                PerformanceEvent::off(60, 0, 480),
            ]
        );

        let imported = performance.import(500_000, &[]).unwrap();
        assert_eq!(imported.notes(1)[0].duration, 0.25);
    }

    #[test]
    fn test_skipped_events_keep_their_time() {
        let track = vec![
            meta(240, MetaMessage::TrackName(b"lead")),
            note(240, 64, 90, true),
            meta(120, MetaMessage::Marker(b"x")),
            note(360, 64, 40, false),
            meta(0, MetaMessage::EndOfTrack),
        ];
        let performance = decode(&write(vec![track])).unwrap();

        assert_eq!(performance.tempo, None);
        assert_eq!(
            performance.tracks[0],
            vec![
                PerformanceEvent::on(64, 90, 480),
                PerformanceEvent::off(64, 40, 480),
            ]
        );

        let imported = performance.import(500_000, &[]).unwrap();
        let n = imported.notes(0)[0];
        assert_eq!((n.onset, n.duration), (0.5, 0.5));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode(b"definitely not midi").is_err());
    }
}
