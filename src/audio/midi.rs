//! MIDI output
//!
//! A dedicated thread owns the midir connection and drains a command channel,
//! so note messages can be sent from the dispatcher without blocking it.
//! Output routes map onto MIDI channels through [`MidiChannelMode`].

use anyhow::{anyhow, Result};
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use std::collections::HashSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

const CLIENT_NAME: &str = "Pulsar";

/// Controller number for pan
pub const CC_PAN: u8 = 10;
/// Controller number for All Notes Off
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Convert a pitch to a MIDI note number, if it is in range
pub fn pitch_to_midi(pitch: i32) -> Option<u8> {
    u8::try_from(pitch).ok().filter(|&n| n <= 127)
}

/// Map pan in [-1, 1] onto the CC range, 64 being center
pub fn pan_to_cc(pan: f64) -> u8 {
    let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    (((pan + 1.0) / 2.0) * 127.0).round() as u8
}

/// How output routes map onto MIDI channels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum MidiChannelMode {
    /// Route n goes to channel n (wrapping at 16)
    #[default]
    PerRoute,
    /// Every route goes to one channel (0-15)
    Mono(u8),
}

impl MidiChannelMode {
    pub fn channel_for_route(self, route: usize) -> u8 {
        match self {
            MidiChannelMode::PerRoute => (route % 16) as u8,
            MidiChannelMode::Mono(ch) => ch & 0x0F,
        }
    }
}

/// Where the dispatcher sends its note messages
pub trait NoteOutput: Send + Sync {
    fn note_on(&self, route: usize, note: u8, velocity: u8) -> Result<()>;
    fn note_off(&self, route: usize, note: u8) -> Result<()>;
    fn pan(&self, route: usize, value: u8) -> Result<()>;
    /// Silence everything that is sounding
    fn all_notes_off(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
enum MidiCommand {
    Connect { port_name: String },
    Send([u8; 3]),
    Disconnect,
    Shutdown,
}

/// Owns the connection on the MIDI thread
struct MidiOutputInternal {
    connection: Option<MidiOutputConnection>,
    command_rx: Receiver<MidiCommand>,
}

impl MidiOutputInternal {
    fn connect(&mut self, port_name: &str) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let port = find_port(&midi_out, port_name)?;
        let connection = midi_out
            .connect(&port, "pulsar-out")
            .map_err(|e| anyhow!("failed to open '{}': {}", port_name, e))?;
        self.connection = Some(connection);
        Ok(())
    }

    fn run(&mut self) {
        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                MidiCommand::Connect { port_name } => {
                    if let Err(e) = self.connect(&port_name) {
                        log::error!("MIDI connect error: {}", e);
                    }
                }
                MidiCommand::Send(message) => {
                    if let Some(conn) = &mut self.connection {
                        if let Err(e) = conn.send(&message) {
                            log::warn!("MIDI send failed: {}", e);
                        }
                    }
                }
                MidiCommand::Disconnect => {
                    self.connection = None;
                }
                MidiCommand::Shutdown => {
                    if let Some(conn) = &mut self.connection {
                        for ch in 0..16u8 {
                            let _ = conn.send(&[0xB0 | ch, CC_ALL_NOTES_OFF, 0]);
                        }
                    }
                    break;
                }
            }
        }
    }
}

fn find_port(midi_out: &MidiOutput, port_name: &str) -> Result<MidiOutputPort> {
    midi_out
        .ports()
        .into_iter()
        .find(|p| {
            midi_out
                .port_name(p)
                .map(|name| name.contains(port_name))
                .unwrap_or(false)
        })
        .ok_or_else(|| anyhow!("MIDI port '{}' not found", port_name))
}

#[derive(Debug, Default)]
struct OutputState {
    channel_mode: MidiChannelMode,
    /// (channel, note) pairs currently sounding
    active_notes: HashSet<(u8, u8)>,
    port_name: Option<String>,
}

/// Thread-safe handle to the MIDI output
pub struct MidiOutputHandle {
    command_tx: Mutex<Sender<MidiCommand>>,
    _thread: JoinHandle<()>,
    state: Mutex<OutputState>,
}

impl MidiOutputHandle {
    /// Start the MIDI thread; nothing is connected yet
    pub fn new() -> Self {
        let (tx, rx) = channel();

        let thread = thread::spawn(move || {
            let mut internal = MidiOutputInternal {
                connection: None,
                command_rx: rx,
            };
            internal.run();
        });

        Self {
            command_tx: Mutex::new(tx),
            _thread: thread,
            state: Mutex::new(OutputState::default()),
        }
    }

    /// Available output port names.
    ///
    /// Creating a client occasionally fails on macOS, so this retries a few times.
    pub fn list_ports() -> Result<Vec<String>> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                thread::sleep(std::time::Duration::from_millis(100));
            }
            match MidiOutput::new(CLIENT_NAME) {
                Ok(midi_out) => {
                    return Ok(midi_out
                        .ports()
                        .iter()
                        .filter_map(|p| midi_out.port_name(p).ok())
                        .collect());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(anyhow!(
            "MIDI initialization failed after 3 attempts: {:?}",
            last_err
        ))
    }

    fn state(&self) -> MutexGuard<'_, OutputState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, command: MidiCommand) -> Result<()> {
        self.command_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(command)
            .map_err(|_| anyhow!("MIDI thread has stopped"))
    }

    /// Connect to the first port whose name contains `port_name`
    pub fn connect(&self, port_name: &str) -> Result<String> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let port = find_port(&midi_out, port_name)?;
        let actual_name = midi_out.port_name(&port)?;

        self.send(MidiCommand::Connect {
            port_name: port_name.to_string(),
        })?;
        self.state().port_name = Some(actual_name.clone());
        log::info!("connected to MIDI port {}", actual_name);
        Ok(actual_name)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.send(MidiCommand::Disconnect)?;
        let mut state = self.state();
        state.port_name = None;
        state.active_notes.clear();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state().port_name.is_some()
    }

    pub fn connected_port(&self) -> Option<String> {
        self.state().port_name.clone()
    }

    pub fn set_channel_mode(&self, mode: MidiChannelMode) {
        self.state().channel_mode = mode;
    }

    pub fn channel_mode(&self) -> MidiChannelMode {
        self.state().channel_mode
    }

    pub fn channel_for_route(&self, route: usize) -> u8 {
        self.channel_mode().channel_for_route(route)
    }

    /// Number of notes currently held
    pub fn active_note_count(&self) -> usize {
        self.state().active_notes.len()
    }

    /// Send All Notes Off on every channel
    pub fn panic_all(&self) -> Result<()> {
        for ch in 0..16u8 {
            self.send(MidiCommand::Send([0xB0 | ch, CC_ALL_NOTES_OFF, 0]))?;
        }
        self.state().active_notes.clear();
        Ok(())
    }
}

impl Default for MidiOutputHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteOutput for MidiOutputHandle {
    fn note_on(&self, route: usize, note: u8, velocity: u8) -> Result<()> {
        let channel = self.channel_for_route(route);
        self.state().active_notes.insert((channel, note));
        self.send(MidiCommand::Send([0x90 | channel, note & 0x7F, velocity & 0x7F]))
    }

    fn note_off(&self, route: usize, note: u8) -> Result<()> {
        let channel = self.channel_for_route(route);
        self.state().active_notes.remove(&(channel, note));
        self.send(MidiCommand::Send([0x80 | channel, note & 0x7F, 0]))
    }

    fn pan(&self, route: usize, value: u8) -> Result<()> {
        let channel = self.channel_for_route(route);
        self.send(MidiCommand::Send([0xB0 | channel, CC_PAN, value & 0x7F]))
    }

    fn all_notes_off(&self) -> Result<()> {
        let held: Vec<(u8, u8)> = self.state().active_notes.drain().collect();
        for (channel, note) in held {
            self.send(MidiCommand::Send([0x80 | channel, note, 0]))?;
        }
        Ok(())
    }
}

impl Drop for MidiOutputHandle {
    fn drop(&mut self) {
        let _ = self.send(MidiCommand::Shutdown);
    }
}
