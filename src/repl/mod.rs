//! REPL (Read-Eval-Print Loop) driving the sequencer

use crate::audio::clock::MasterClock;
use crate::audio::dispatcher::{DispatcherHandle, EventDispatcher};
use crate::audio::midi::{MidiChannelMode, MidiOutputHandle, NoteOutput};
use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use crate::config::PlayerConfig;
use crate::logging;
use anyhow::{anyhow, Result};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// Types of events the REPL loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// Interactive REPL
pub struct Repl {
    editor: Option<DefaultEditor>,
    registry: CommandRegistry,
    ctx: CommandContext,

    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
}

/// Channel mode from the `[midi] channel` setting
fn channel_mode(channel: Option<u8>) -> Result<MidiChannelMode> {
    match channel {
        None => Ok(MidiChannelMode::PerRoute),
        Some(ch) if (1..=16).contains(&ch) => Ok(MidiChannelMode::Mono(ch - 1)),
        Some(ch) => Err(anyhow!("midi channel must be 1-16, got {}", ch)),
    }
}

impl Repl {
    /// Build the clock, MIDI output and dispatcher described by `config`
    pub fn new(config: PlayerConfig) -> Result<Self> {
        let editor = DefaultEditor::new()?;

        let clock = Arc::new(MasterClock::new(
            config.transport.bpm,
            config.transport.beats_per_bar,
        ));
        let midi_handle = Arc::new(MidiOutputHandle::new());
        midi_handle.set_channel_mode(channel_mode(config.midi.channel)?);

        if let Some(port) = &config.midi.port {
            // A missing port should not keep the REPL from starting
            match midi_handle.connect(port) {
                Ok(name) => println!("🎹 Connected to MIDI port: {}", name.green()),
                Err(e) => log::warn!("could not connect to MIDI port '{}': {}", port, e),
            }
        }

        let output: Arc<dyn NoteOutput> = midi_handle.clone();
        let dispatcher: DispatcherHandle = EventDispatcher::spawn(output, clock.subscribe());

        let (tx_input, rx_input) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            registry: create_registry(),
            ctx: CommandContext::new(config, clock, midi_handle, dispatcher),
            tx_input,
            rx_input,
        })
    }

    /// Print a command result; returns false when the REPL should exit
    fn report(result: CommandResult) -> bool {
        match result {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => {
                println!("{} 🎵", "Goodbye!".bright_cyan());
                return false;
            }
            CommandResult::Error(e) => {
                println!("{} {}", "Error:".bright_red().bold(), e.red());
            }
            CommandResult::NotACommand => {
                println!(
                    "{} unknown command, type '{}' for a list",
                    "Error:".bright_red().bold(),
                    "help".bright_green()
                );
            }
        }
        true
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!(
            "{} {}",
            "🎵".bright_yellow(),
            "Pulsar Sequencer".bright_cyan().bold()
        );
        println!(
            "Try: {}, {}, {}",
            "play 0 [4 7] 12".cyan(),
            "echo snare repeats=8 loop=0.25".cyan(),
            "import song.mid play".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        let mut editor = self
            .editor
            .take()
            .ok_or_else(|| anyhow!("REPL is already running"))?;
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "pulsar>".bright_magenta().bold());
            match editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(ReplEvent::Input(Ok(line))).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(ReplEvent::Input(Err(err)));
                    break;
                }
            }
        });

        loop {
            crossbeam_channel::select! {
                recv(self.rx_input) -> msg => match msg {
                    Ok(ReplEvent::Input(Ok(line))) => {
                        if line.is_empty() {
                            continue;
                        }
                        log::debug!("command: {}", line);
                        if !Self::report(self.registry.execute(&line, &mut self.ctx)) {
                            break;
                        }
                    }
                    Ok(ReplEvent::Input(Err(ReadlineError::Interrupted)))
                    | Ok(ReplEvent::Input(Err(ReadlineError::Eof))) => {
                        println!("{} 🎵", "Goodbye!".bright_cyan());
                        break;
                    }
                    Ok(ReplEvent::Input(Err(err))) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break,
                },
            }
        }

        self.ctx.dispatcher.shutdown();
        self.ctx.clock.stop();
        if let Err(e) = self.ctx.midi_handle.panic_all() {
            log::warn!("failed to release notes on exit: {}", e);
        }
        Ok(())
    }
}

/// Load configuration, set up logging and run the REPL until the user quits
pub fn start(config_path: Option<&Path>) -> Result<()> {
    let config = PlayerConfig::load_or_default(config_path)?;
    logging::init(logging::resolve_level(&config.log.level));
    log::debug!("configuration: {:?}", config);

    let mut repl = Repl::new(config).map_err(|e| anyhow!("Failed to initialize REPL: {}", e))?;
    repl.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mode_from_config() {
        assert_eq!(channel_mode(None).unwrap(), MidiChannelMode::PerRoute);
        assert_eq!(channel_mode(Some(10)).unwrap(), MidiChannelMode::Mono(9));
        assert!(channel_mode(Some(0)).is_err());
        assert!(channel_mode(Some(17)).is_err());
    }

    #[test]
    fn test_report_exit() {
        assert!(!Repl::report(CommandResult::Exit));
        assert!(Repl::report(CommandResult::Message("ok".to_string())));
        assert!(Repl::report(CommandResult::NotACommand));
    }
}
