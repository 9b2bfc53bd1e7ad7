//! Master clock for the player
//!
//! Runs in its own thread and broadcasts ticks at 24 PPQN (the MIDI clock
//! rate) to every subscriber. The latest beat position is also published
//! through an atomic so callers can read the transport without subscribing.

use crossbeam_channel::{unbounded, Receiver, Sender};
use pulsar_core::Transport;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Ticks per quarter note (MIDI standard)
pub const TICKS_PER_BEAT: u8 = 24;

/// A single clock tick broadcast to all subscribers
#[derive(Clone, Debug)]
pub struct ClockTick {
    /// Beat position (fractional, e.g. 4.5 = halfway through beat 5)
    pub beat: f64,
    /// Whole beats since the clock started
    pub beat_number: u64,
    /// Tick within the current beat (0-23)
    pub tick_in_beat: u8,
    pub timestamp: Instant,
}

impl ClockTick {
    pub fn is_beat_boundary(&self) -> bool {
        self.tick_in_beat == 0
    }

    pub fn is_bar_boundary(&self, beats_per_bar: u32) -> bool {
        beats_per_bar > 0 && self.tick_in_beat == 0 && self.beat_number % beats_per_bar as u64 == 0
    }
}

#[derive(Debug)]
enum ClockCommand {
    Start,
    Stop,
    Reset,
    AddSubscriber(Sender<ClockTick>),
    Shutdown,
}

/// Values shared between the handle and the clock thread
struct SharedState {
    /// BPM as f64 bits
    bpm: AtomicU64,
    /// Latest beat position as f64 bits
    beat: AtomicU64,
    beats_per_bar: AtomicU32,
    running: AtomicBool,
}

impl SharedState {
    fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm.load(Ordering::Relaxed))
    }

    fn beat(&self) -> f64 {
        f64::from_bits(self.beat.load(Ordering::Relaxed))
    }
}

/// Master clock handle; the thread stops when this is dropped
pub struct MasterClock {
    state: Arc<SharedState>,
    command_tx: Sender<ClockCommand>,
    thread: Option<JoinHandle<()>>,
}

impl MasterClock {
    pub fn new(bpm: f64, beats_per_bar: u32) -> Self {
        let state = Arc::new(SharedState {
            bpm: AtomicU64::new(bpm.to_bits()),
            beat: AtomicU64::new(0.0f64.to_bits()),
            beats_per_bar: AtomicU32::new(beats_per_bar.max(1)),
            running: AtomicBool::new(false),
        });
        let (command_tx, command_rx) = crossbeam_channel::bounded(64);

        let thread_state = state.clone();
        let thread = thread::spawn(move || {
            ClockThread::new(thread_state, command_rx).run();
        });

        MasterClock {
            state,
            command_tx,
            thread: Some(thread),
        }
    }

    /// Receive every tick from now on
    pub fn subscribe(&self) -> Receiver<ClockTick> {
        let (tx, rx) = unbounded();
        let _ = self.command_tx.send(ClockCommand::AddSubscriber(tx));
        rx
    }

    pub fn start(&self) {
        let _ = self.command_tx.send(ClockCommand::Start);
    }

    pub fn stop(&self) {
        let _ = self.command_tx.send(ClockCommand::Stop);
    }

    /// Rewind to beat 0
    pub fn reset(&self) {
        let _ = self.command_tx.send(ClockCommand::Reset);
    }

    /// Takes effect from the next tick
    pub fn set_bpm(&self, bpm: f64) {
        self.state.bpm.store(bpm.to_bits(), Ordering::Relaxed);
    }

    pub fn bpm(&self) -> f64 {
        self.state.bpm()
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.state.beats_per_bar.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed)
    }

    /// Beat position of the latest tick
    pub fn current_beat(&self) -> f64 {
        self.state.beat()
    }

    /// Length of one beat in seconds at the current tempo
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.bpm()
    }
}

impl Transport for MasterClock {
    fn position_bars(&self) -> f64 {
        self.current_beat() / self.beats_per_bar() as f64
    }

    fn tempo_bpm(&self) -> f64 {
        self.bpm()
    }
}

impl Drop for MasterClock {
    fn drop(&mut self) {
        let _ = self.command_tx.send(ClockCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct ClockThread {
    state: Arc<SharedState>,
    command_rx: Receiver<ClockCommand>,
    subscribers: Vec<Sender<ClockTick>>,
    beat_number: u64,
    tick_in_beat: u8,
}

impl ClockThread {
    fn new(state: Arc<SharedState>, command_rx: Receiver<ClockCommand>) -> Self {
        Self {
            state,
            command_rx,
            subscribers: Vec::new(),
            beat_number: 0,
            tick_in_beat: 0,
        }
    }

    fn tick_duration(&self) -> Duration {
        let bpm = self.state.bpm().max(1.0);
        Duration::from_secs_f64(60.0 / bpm / TICKS_PER_BEAT as f64)
    }

    fn run(&mut self) {
        let mut next_tick: Option<Instant> = None;

        loop {
            if self.state.running.load(Ordering::Relaxed) {
                if let Ok(cmd) = self.command_rx.try_recv() {
                    if self.handle_command(cmd) {
                        break;
                    }
                    if !self.state.running.load(Ordering::Relaxed) {
                        next_tick = None;
                        continue;
                    }
                }

                let now = Instant::now();
                let target = *next_tick.get_or_insert(now);
                if now >= target {
                    self.emit_tick();
                    self.advance_tick();
                    next_tick = Some(target + self.tick_duration());
                } else if target - now > Duration::from_micros(500) {
                    thread::sleep(Duration::from_micros(100));
                } else {
                    std::hint::spin_loop();
                }
            } else {
                match self.command_rx.recv() {
                    Ok(cmd) => {
                        if self.handle_command(cmd) {
                            break;
                        }
                        next_tick = None;
                    }
                    Err(_) => break,
                }
            }
        }
    }

    /// Returns true on shutdown
    fn handle_command(&mut self, cmd: ClockCommand) -> bool {
        match cmd {
            ClockCommand::Start => {
                self.state.running.store(true, Ordering::Relaxed);
            }
            ClockCommand::Stop => {
                self.state.running.store(false, Ordering::Relaxed);
            }
            ClockCommand::Reset => {
                self.beat_number = 0;
                self.tick_in_beat = 0;
                self.state.beat.store(0.0f64.to_bits(), Ordering::Relaxed);
            }
            ClockCommand::AddSubscriber(tx) => {
                self.subscribers.push(tx);
            }
            ClockCommand::Shutdown => {
                self.state.running.store(false, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    fn emit_tick(&mut self) {
        let beat = self.beat_number as f64 + self.tick_in_beat as f64 / TICKS_PER_BEAT as f64;
        self.state.beat.store(beat.to_bits(), Ordering::Relaxed);

        let tick = ClockTick {
            beat,
            beat_number: self.beat_number,
            tick_in_beat: self.tick_in_beat,
            timestamp: Instant::now(),
        };
        // Drop subscribers that hung up
        self.subscribers.retain(|tx| tx.send(tick.clone()).is_ok());
    }

    fn advance_tick(&mut self) {
        self.tick_in_beat += 1;
        if self.tick_in_beat >= TICKS_PER_BEAT {
            self.tick_in_beat = 0;
            self.beat_number += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_creation() {
        let clock = MasterClock::new(120.0, 4);
        assert_eq!(clock.bpm(), 120.0);
        assert_eq!(clock.beats_per_bar(), 4);
        assert!(!clock.is_running());
        assert_eq!(clock.position_bars(), 0.0);
    }

    #[test]
    fn test_bpm_change() {
        let clock = MasterClock::new(120.0, 4);
        assert_eq!(clock.beat_seconds(), 0.5);
        clock.set_bpm(60.0);
        assert_eq!(clock.tempo_bpm(), 60.0);
        assert_eq!(clock.beat_seconds(), 1.0);
    }

    #[test]
    fn test_bar_boundary() {
        let tick = ClockTick {
            beat: 8.0,
            beat_number: 8,
            tick_in_beat: 0,
            timestamp: Instant::now(),
        };
        assert!(tick.is_beat_boundary());
        assert!(tick.is_bar_boundary(4));
        assert!(!tick.is_bar_boundary(3));
    }

    #[test]
    fn test_ticks_advance_position() {
        let clock = MasterClock::new(240.0, 4);
        let ticks = clock.subscribe();
        clock.start();

        let first = ticks
            .recv_timeout(Duration::from_secs(1))
            .expect("clock should tick");
        assert_eq!(first.beat, 0.0);
        let second = ticks
            .recv_timeout(Duration::from_secs(1))
            .expect("clock should keep ticking");
        assert!(second.beat > first.beat);
        assert!(clock.is_running());

        clock.stop();
        thread::sleep(Duration::from_millis(50));
        assert!(!clock.is_running());
    }
}
