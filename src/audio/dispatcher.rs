//! Event dispatcher
//!
//! Scheduled events from the core arrive through a [`TransportSink`], which
//! anchors them at a beat on the master clock and splits each one into timed
//! note messages. The dispatcher thread keeps those messages in a min-heap
//! and releases them to the output as clock ticks pass their beat.

use crate::audio::clock::{ClockTick, TICKS_PER_BEAT};
use crate::audio::midi::{pan_to_cc, pitch_to_midi, NoteOutput};
use crossbeam_channel::{unbounded, Receiver, Sender};
use pulsar_core::{EventSink, ScheduledEvent};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// What a single timed message does
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    NoteOff { note: u8 },
    Pan { value: u8 },
    NoteOn { note: u8, velocity: u8 },
}

impl MessageKind {
    /// Order among messages sharing a beat: offs first so a repeated pitch
    /// retriggers, then pan so it applies to the note that follows
    fn priority(&self) -> u8 {
        match self {
            MessageKind::NoteOff { .. } => 0,
            MessageKind::Pan { .. } => 1,
            MessageKind::NoteOn { .. } => 2,
        }
    }
}

/// A message due at an absolute beat on the master clock
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedMessage {
    pub beat: f64,
    pub route: usize,
    pub kind: MessageKind,
    seq: u64,
}

impl TimedMessage {
    pub fn new(beat: f64, route: usize, kind: MessageKind) -> Self {
        Self {
            beat,
            route,
            kind,
            seq: 0,
        }
    }
}

impl Eq for TimedMessage {}

impl PartialOrd for TimedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedMessage {
    // Reversed so BinaryHeap pops the earliest message first
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .beat
            .total_cmp(&self.beat)
            .then_with(|| other.kind.priority().cmp(&self.kind.priority()))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of pending messages; insertion order breaks remaining ties
#[derive(Debug, Default)]
pub struct NoteQueue {
    heap: BinaryHeap<TimedMessage>,
    next_seq: u64,
}

impl NoteQueue {
    pub fn push(&mut self, mut message: TimedMessage) {
        message.seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(message);
    }

    /// Remove and return every message due at or before `beat`, in play order
    pub fn pop_due(&mut self, beat: f64) -> Vec<TimedMessage> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|m| m.beat <= beat) {
            if let Some(message) = self.heap.pop() {
                due.push(message);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[derive(Debug)]
pub enum DispatcherCommand {
    Schedule(Vec<TimedMessage>),
    /// Drop everything queued and silence the output
    StopAll,
    Shutdown,
}

/// Handle for sending commands to the dispatcher thread
#[derive(Clone)]
pub struct DispatcherHandle {
    command_tx: Sender<DispatcherCommand>,
    is_running: Arc<AtomicBool>,
}

impl DispatcherHandle {
    pub fn schedule(&self, messages: Vec<TimedMessage>) {
        let _ = self.command_tx.send(DispatcherCommand::Schedule(messages));
    }

    pub fn stop_all(&self) {
        let _ = self.command_tx.send(DispatcherCommand::StopAll);
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(DispatcherCommand::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// A handle with no thread behind it; commands pile up in the receiver
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, Receiver<DispatcherCommand>) {
        let (command_tx, command_rx) = unbounded();
        let handle = DispatcherHandle {
            command_tx,
            is_running: Arc::new(AtomicBool::new(true)),
        };
        (handle, command_rx)
    }
}

/// Shortest gate the sink schedules: one clock tick, so a note-off can never
/// share its note-on's beat and jump ahead of it in the queue
pub const MIN_GATE_BEATS: f64 = 1.0 / TICKS_PER_BEAT as f64;

/// How a sink reads event offsets and durations
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeUnit {
    /// Fractional bars, as emitted by patterns and echoes
    Bars { beats_per_bar: u32 },
    /// Seconds, as emitted by imported performances
    Seconds { bpm: f64 },
}

impl TimeUnit {
    pub fn beats_per_unit(self) -> f64 {
        match self {
            TimeUnit::Bars { beats_per_bar } => beats_per_bar as f64,
            TimeUnit::Seconds { bpm } => bpm / 60.0,
        }
    }
}

/// Sink that resolves event offsets against a fixed beat on the master clock
pub struct TransportSink {
    handle: DispatcherHandle,
    origin_beat: f64,
    unit: TimeUnit,
    accepted: usize,
    dropped: usize,
}

impl TransportSink {
    pub fn new(handle: DispatcherHandle, origin_beat: f64, unit: TimeUnit) -> Self {
        Self {
            handle,
            origin_beat,
            unit,
            accepted: 0,
            dropped: 0,
        }
    }

    /// Events queued so far
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Events skipped because their pitch has no MIDI note number
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Note messages for one event, or None if the pitch is out of MIDI range
    pub fn messages_for(&self, event: &ScheduledEvent) -> Option<Vec<TimedMessage>> {
        let note = pitch_to_midi(event.pitch)?;
        let scale = self.unit.beats_per_unit();
        let on_beat = self.origin_beat + event.start_offset * scale;
        let off_beat = on_beat + (event.duration * scale).max(MIN_GATE_BEATS);
        let route = event.output_route;

        Some(vec![
            TimedMessage::new(
                on_beat,
                route,
                MessageKind::Pan {
                    value: pan_to_cc(event.pan),
                },
            ),
            TimedMessage::new(
                on_beat,
                route,
                MessageKind::NoteOn {
                    note,
                    velocity: event.velocity,
                },
            ),
            TimedMessage::new(off_beat, route, MessageKind::NoteOff { note }),
        ])
    }
}

impl EventSink for TransportSink {
    fn accept(&mut self, event: ScheduledEvent) {
        match self.messages_for(&event) {
            Some(messages) => {
                self.handle.schedule(messages);
                self.accepted += 1;
            }
            None => {
                log::warn!("pitch {} is outside the MIDI range, skipped", event.pitch);
                self.dropped += 1;
            }
        }
    }
}

pub struct EventDispatcher {
    queue: NoteQueue,
    output: Arc<dyn NoteOutput>,
    command_rx: Receiver<DispatcherCommand>,
    tick_rx: Receiver<ClockTick>,
    is_running: Arc<AtomicBool>,
}

impl EventDispatcher {
    /// Start the dispatcher thread
    pub fn spawn(output: Arc<dyn NoteOutput>, tick_rx: Receiver<ClockTick>) -> DispatcherHandle {
        let (command_tx, command_rx) = unbounded();
        let is_running = Arc::new(AtomicBool::new(true));

        let dispatcher = EventDispatcher {
            queue: NoteQueue::default(),
            output,
            command_rx,
            tick_rx,
            is_running: is_running.clone(),
        };

        thread::spawn(move || dispatcher.run_loop());

        DispatcherHandle {
            command_tx,
            is_running,
        }
    }

    fn run_loop(mut self) {
        loop {
            crossbeam_channel::select! {
                recv(self.command_rx) -> msg => match msg {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(self.tick_rx) -> msg => match msg {
                    Ok(tick) => self.process_tick(&tick),
                    Err(_) => break,
                },
            }
        }

        let _ = self.output.all_notes_off();
        self.is_running.store(false, Ordering::Relaxed);
    }

    /// Returns false on shutdown
    fn handle_command(&mut self, cmd: DispatcherCommand) -> bool {
        match cmd {
            DispatcherCommand::Schedule(messages) => {
                for message in messages {
                    self.queue.push(message);
                }
            }
            DispatcherCommand::StopAll => {
                self.queue.clear();
                if let Err(e) = self.output.all_notes_off() {
                    log::warn!("failed to silence output: {}", e);
                }
            }
            DispatcherCommand::Shutdown => return false,
        }
        true
    }

    fn process_tick(&mut self, tick: &ClockTick) {
        for message in self.queue.pop_due(tick.beat) {
            let result = match message.kind {
                MessageKind::NoteOn { note, velocity } => {
                    self.output.note_on(message.route, note, velocity)
                }
                MessageKind::NoteOff { note } => self.output.note_off(message.route, note),
                MessageKind::Pan { value } => self.output.pan(message.route, value),
            };
            if let Err(e) = result {
                log::warn!("dropped message at beat {:.3}: {}", message.beat, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingOutput {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingOutput {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl NoteOutput for RecordingOutput {
        fn note_on(&self, route: usize, note: u8, velocity: u8) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(format!("on {} {} {}", route, note, velocity));
            Ok(())
        }

        fn note_off(&self, route: usize, note: u8) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(format!("off {} {}", route, note));
            Ok(())
        }

        fn pan(&self, route: usize, value: u8) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(format!("pan {} {}", route, value));
            Ok(())
        }

        fn all_notes_off(&self) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push("all off".to_string());
            Ok(())
        }
    }

    fn tick(beat: f64) -> ClockTick {
        ClockTick {
            beat,
            beat_number: beat.floor() as u64,
            tick_in_beat: 0,
            timestamp: Instant::now(),
        }
    }

    fn dispatcher(output: Arc<RecordingOutput>) -> EventDispatcher {
        let (_, command_rx) = unbounded();
        let (_, tick_rx) = unbounded();
        EventDispatcher {
            queue: NoteQueue::default(),
            output,
            command_rx,
            tick_rx,
            is_running: Arc::new(AtomicBool::new(true)),
        }
    }

    #[test]
    fn test_queue_orders_by_beat_then_kind() {
        let mut queue = NoteQueue::default();
        queue.push(TimedMessage::new(1.0, 0, MessageKind::NoteOn { note: 60, velocity: 100 }));
        queue.push(TimedMessage::new(1.0, 0, MessageKind::NoteOff { note: 60 }));
        queue.push(TimedMessage::new(0.5, 0, MessageKind::Pan { value: 64 }));
        queue.push(TimedMessage::new(2.0, 0, MessageKind::NoteOff { note: 62 }));

        let due = queue.pop_due(1.0);
        let kinds: Vec<MessageKind> = due.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Pan { value: 64 },
                MessageKind::NoteOff { note: 60 },
                MessageKind::NoteOn { note: 60, velocity: 100 },
            ]
        );
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_due(1.9).is_empty());
    }

    #[test]
    fn test_zero_length_note_releases_after_its_on() {
        let (handle, commands) = DispatcherHandle::detached();
        let mut sink = TransportSink::new(handle, 4.0, TimeUnit::Seconds { bpm: 120.0 });
        sink.accept(ScheduledEvent::new(0.0, 36, 110, 0.0));

        let mut queue = NoteQueue::default();
        while let Ok(DispatcherCommand::Schedule(batch)) = commands.try_recv() {
            for message in batch {
                queue.push(message);
            }
        }

        let kinds: Vec<MessageKind> = queue
            .pop_due(4.0 + MIN_GATE_BEATS)
            .iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Pan { value: 64 },
                MessageKind::NoteOn { note: 36, velocity: 110 },
                MessageKind::NoteOff { note: 36 },
            ]
        );
    }

    #[test]
    fn test_sink_converts_bars_to_beats() {
        let (handle, commands) = DispatcherHandle::detached();
        let mut sink = TransportSink::new(handle, 8.0, TimeUnit::Bars { beats_per_bar: 4 });
        sink.accept(ScheduledEvent::new(0.25, 60, 90, 0.125).with_pan(1.0).with_route(2));

        match commands.try_recv() {
            Ok(DispatcherCommand::Schedule(messages)) => {
                assert_eq!(messages.len(), 3);
                assert_eq!(messages[0].beat, 9.0);
                assert_eq!(messages[0].kind, MessageKind::Pan { value: 127 });
                assert_eq!(messages[1].kind, MessageKind::NoteOn { note: 60, velocity: 90 });
                assert_eq!(messages[2].beat, 9.5);
                assert!(messages.iter().all(|m| m.route == 2));
            }
            other => panic!("expected a schedule command, got {:?}", other),
        }
        assert_eq!(sink.accepted(), 1);
    }

    #[test]
    fn test_sink_converts_seconds_to_beats() {
        let (handle, _commands) = DispatcherHandle::detached();
        let sink = TransportSink::new(handle, 0.0, TimeUnit::Seconds { bpm: 120.0 });
        let messages = sink
            .messages_for(&ScheduledEvent::new(1.0, 64, 100, 0.5))
            .unwrap();
        assert_eq!(messages[1].beat, 2.0);
        assert_eq!(messages[2].beat, 3.0);
    }

    #[test]
    fn test_sink_skips_out_of_range_pitches() {
        let (handle, commands) = DispatcherHandle::detached();
        let mut sink = TransportSink::new(handle, 0.0, TimeUnit::Bars { beats_per_bar: 4 });
        sink.accept(ScheduledEvent::new(0.0, 200, 100, 0.25));
        sink.accept(ScheduledEvent::new(0.0, -3, 100, 0.25));
        assert_eq!(sink.dropped(), 2);
        assert!(commands.try_recv().is_err());
    }

    #[test]
    fn test_dispatcher_releases_messages_on_ticks() {
        let output = Arc::new(RecordingOutput::default());
        let mut d = dispatcher(output.clone());
        let (handle, commands) = DispatcherHandle::detached();
        let mut sink = TransportSink::new(handle, 0.0, TimeUnit::Bars { beats_per_bar: 4 });
        sink.accept(ScheduledEvent::new(0.0, 60, 100, 0.25));
        sink.accept(ScheduledEvent::new(0.25, 62, 80, 0.25).with_route(1));
        while let Ok(cmd) = commands.try_recv() {
            assert!(d.handle_command(cmd));
        }

        d.process_tick(&tick(0.0));
        assert_eq!(output.take(), vec!["pan 0 64", "on 0 60 100"]);

        d.process_tick(&tick(1.0));
        assert_eq!(output.take(), vec!["off 0 60", "pan 1 64", "on 1 62 80"]);

        d.process_tick(&tick(2.0));
        assert_eq!(output.take(), vec!["off 1 62"]);
        assert!(d.queue.is_empty());
    }

    #[test]
    fn test_stop_all_clears_queue() {
        let output = Arc::new(RecordingOutput::default());
        let mut d = dispatcher(output.clone());
        d.queue
            .push(TimedMessage::new(4.0, 0, MessageKind::NoteOn { note: 60, velocity: 1 }));

        assert!(d.handle_command(DispatcherCommand::StopAll));
        assert!(d.queue.is_empty());
        assert_eq!(output.take(), vec!["all off"]);
        assert!(!d.handle_command(DispatcherCommand::Shutdown));
    }
}
