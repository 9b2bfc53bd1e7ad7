use crate::error::{Result, SequencerError};
use crate::sink::EventSink;
use crate::types::scheduled_event::ScheduledEvent;
use crate::types::time::ticks_to_seconds;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Deref;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PerformanceKind {
    On,
    Off,
}

/// One recorded message: its kind, pitch, velocity and the ticks since the
/// previous message on the same track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerformanceEvent {
    pub kind: PerformanceKind,
    pub pitch: i32,
    pub velocity: u8,
    pub delta_ticks: u64,
}

impl PerformanceEvent {
    pub fn on(pitch: i32, velocity: u8, delta_ticks: u64) -> Self {
        Self {
            kind: PerformanceKind::On,
            pitch,
            velocity,
            delta_ticks,
        }
    }

    pub fn off(pitch: i32, velocity: u8, delta_ticks: u64) -> Self {
        Self {
            kind: PerformanceKind::Off,
            pitch,
            velocity,
            delta_ticks,
        }
    }
}

/// A paired note, times in seconds from the start of its track
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportedNote {
    pub pitch: i32,
    /// Velocity of the opening `on` message
    pub velocity: u8,
    pub onset: f64,
    pub duration: f64,
}

impl fmt::Display for ImportedNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{:.3}s -> {:.3}s [{}/{}]",
            self.onset, self.duration, self.pitch, self.velocity
        )
    }
}

/// Notes per track, keyed by the track's index in the source performance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackImport {
    tracks: BTreeMap<usize, Vec<ImportedNote>>,
}

impl TrackImport {
    pub fn into_inner(self) -> BTreeMap<usize, Vec<ImportedNote>> {
        self.tracks
    }

    /// Notes of one track (empty for a track that was not imported)
    pub fn notes(&self, track: usize) -> &[ImportedNote] {
        self.tracks.get(&track).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn note_count(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    /// End of the latest note across all tracks, in seconds
    pub fn length_seconds(&self) -> f64 {
        self.tracks
            .values()
            .flatten()
            .map(|n| n.onset + n.duration)
            .fold(0.0, f64::max)
    }

    /// Replay every note through `sink`.
    ///
    /// Offsets and durations stay in seconds. Imported tracks are given
    /// consecutive output routes in ascending track order, empty tracks
    /// included, so routes line up with the track listing.
    pub fn schedule<S: EventSink + ?Sized>(&self, sink: &mut S) -> usize {
        let mut sent = 0;
        for (route, notes) in self.tracks.values().enumerate() {
            for note in notes {
                sink.accept(
                    ScheduledEvent::new(note.onset, note.pitch, note.velocity, note.duration)
                        .with_route(route),
                );
                sent += 1;
            }
        }
        log::debug!("scheduled {} imported notes", sent);
        sent
    }
}

impl Deref for TrackImport {
    type Target = BTreeMap<usize, Vec<ImportedNote>>;

    fn deref(&self) -> &Self::Target {
        &self.tracks
    }
}

/// Pair every track of a recorded performance.
///
/// `tempo` is in microseconds per beat. Both it and `ticks_per_beat` must be
/// positive.
pub fn import(
    tracks: &[Vec<PerformanceEvent>],
    ticks_per_beat: i64,
    tempo: i64,
) -> Result<TrackImport> {
    import_tracks(tracks, ticks_per_beat, tempo, &[])
}

/// Like [`import`], restricted to the track indices in `selection`.
///
/// An empty selection imports every track; indices past the last track are
/// skipped.
pub fn import_tracks(
    tracks: &[Vec<PerformanceEvent>],
    ticks_per_beat: i64,
    tempo: i64,
    selection: &[usize],
) -> Result<TrackImport> {
    let (tpb, tempo_us) = match (u32::try_from(ticks_per_beat), u32::try_from(tempo)) {
        (Ok(tpb), Ok(t)) if tpb > 0 && t > 0 => (tpb, t),
        _ => {
            return Err(SequencerError::InvalidTimeBase {
                ticks_per_beat,
                tempo,
            })
        }
    };

    let selected: Vec<usize> = if selection.is_empty() {
        (0..tracks.len()).collect()
    } else {
        selection.to_vec()
    };

    let mut result = TrackImport::default();
    for index in selected {
        let Some(events) = tracks.get(index) else {
            log::warn!("track {} not present, skipping", index);
            continue;
        };
        let notes = pair_track(events, tpb, tempo_us);
        log::debug!("track {}: {} notes", index, notes.len());
        result.tracks.insert(index, notes);
    }
    Ok(result)
}

/// Pair on/off messages of a single track against its own running clock.
///
/// An off in the same tick as its on still yields a note, one tick long.
fn pair_track(events: &[PerformanceEvent], ticks_per_beat: u32, tempo: u32) -> Vec<ImportedNote> {
    let one_tick = ticks_to_seconds(1, ticks_per_beat, tempo);
    let mut now = 0.0;
    let mut held: HashMap<i32, (f64, u8)> = HashMap::new();
    let mut notes = Vec::new();

    for event in events {
        now += ticks_to_seconds(event.delta_ticks, ticks_per_beat, tempo);
        match event.kind {
            // A repeated `on` replaces the earlier unmatched one
            PerformanceKind::On => {
                held.insert(event.pitch, (now, event.velocity));
            }
            PerformanceKind::Off => match held.remove(&event.pitch) {
                Some((onset, velocity)) => notes.push(ImportedNote {
                    pitch: event.pitch,
                    velocity,
                    onset,
                    duration: (now - onset).max(one_tick),
                }),
                None => log::trace!("unmatched off for pitch {} at {:.3}s", event.pitch, now),
            },
        }
    }

    if !held.is_empty() {
        log::trace!("{} notes left open at end of track", held.len());
    }

    // Stable, so notes closing in message order keep that order on ties
    notes.sort_by(|a, b| a.onset.total_cmp(&b.onset));
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    const TPB: i64 = 480;
    const TEMPO: i64 = 500_000;

    #[test]
    fn test_single_note_half_second() {
        let track = vec![PerformanceEvent::on(60, 100, 0), PerformanceEvent::off(60, 0, 480)];
        let result = import(&[track], TPB, TEMPO).unwrap();

        assert_eq!(
            result.notes(0),
            &[ImportedNote {
                pitch: 60,
                velocity: 100,
                onset: 0.0,
                duration: 0.5,
            }]
        );
    }

    #[test]
    fn test_same_tick_pair_lasts_one_tick() {
        let track = vec![PerformanceEvent::on(36, 110, 0), PerformanceEvent::off(36, 0, 0)];
        let result = import(&[track], TPB, TEMPO).unwrap();

        let mut events: Vec<ScheduledEvent> = Vec::new();
        assert_eq!(result.schedule(&mut events), 1);
        assert_eq!(events[0].start_offset, 0.0);
        assert!(events[0].duration > 0.0);
        assert!((events[0].duration - 0.5 / 480.0).abs() < 1e-12);
    }

    #[test]
    fn test_unmatched_messages_are_dropped() {
        let track = vec![
            PerformanceEvent::off(62, 0, 0),
            PerformanceEvent::on(60, 90, 240),
            PerformanceEvent::on(64, 90, 0),
            PerformanceEvent::off(60, 0, 240),
        ];
        let result = import(&[track], TPB, TEMPO).unwrap();
        let notes = result.notes(0);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].onset, 0.25);
        assert_eq!(notes[0].duration, 0.25);
    }

    #[test]
    fn test_repeated_on_overwrites() {
        let track = vec![
            PerformanceEvent::on(60, 50, 0),
            PerformanceEvent::on(60, 110, 480),
            PerformanceEvent::off(60, 0, 480),
        ];
        let result = import(&[track], TPB, TEMPO).unwrap();
        let notes = result.notes(0);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].onset, 0.5);
        assert_eq!(notes[0].duration, 0.5);
        assert_eq!(notes[0].velocity, 110);
    }

    #[test]
    fn test_notes_sorted_by_onset() {
        // Outer note closes after the inner one
        let track = vec![
            PerformanceEvent::on(48, 80, 0),
            PerformanceEvent::on(60, 80, 120),
            PerformanceEvent::off(60, 0, 120),
            PerformanceEvent::off(48, 0, 240),
        ];
        let result = import(&[track], TPB, TEMPO).unwrap();
        let pitches: Vec<i32> = result.notes(0).iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![48, 60]);
    }

    #[test]
    fn test_tracks_have_independent_clocks() {
        let a = vec![PerformanceEvent::on(60, 100, 960), PerformanceEvent::off(60, 0, 480)];
        let b = vec![PerformanceEvent::on(60, 100, 0), PerformanceEvent::off(60, 0, 240)];
        let result = import(&[a, b], TPB, TEMPO).unwrap();

        assert_eq!(result.notes(0)[0].onset, 1.0);
        assert_eq!(result.notes(1)[0].onset, 0.0);
        assert_eq!(result.notes(1)[0].duration, 0.25);
    }

    #[test]
    fn test_invalid_time_base() {
        let track = vec![PerformanceEvent::on(60, 100, 0)];
        for (tpb, tempo) in [(0, TEMPO), (-96, TEMPO), (TPB, 0), (TPB, -1)] {
            assert_eq!(
                import(&[track.clone()], tpb, tempo),
                Err(SequencerError::InvalidTimeBase {
                    ticks_per_beat: tpb,
                    tempo,
                })
            );
        }
    }

    #[test]
    fn test_track_selection() {
        let note = vec![PerformanceEvent::on(60, 100, 0), PerformanceEvent::off(60, 0, 480)];
        let tracks = vec![note.clone(), Vec::new(), note];

        let result = import_tracks(&tracks, TPB, TEMPO, &[2, 7]).unwrap();
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![2]);

        let all = import(&tracks, TPB, TEMPO).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.note_count(), 2);
        assert_eq!(all.length_seconds(), 0.5);
    }

    #[test]
    fn test_schedule_assigns_consecutive_routes() {
        let note = |p| vec![PerformanceEvent::on(p, 100, 0), PerformanceEvent::off(p, 0, 480)];
        let tracks = vec![note(60), Vec::new(), note(64)];
        let result = import(&tracks, TPB, TEMPO).unwrap();

        let mut sink: Vec<ScheduledEvent> = Vec::new();
        assert_eq!(result.schedule(&mut sink), 2);
        assert_eq!(sink[0].output_route, 0);
        assert_eq!(sink[1].output_route, 2);
        assert!(sink.iter().all(|e| e.pan == 0.0 && e.duration == 0.5));
    }
}
