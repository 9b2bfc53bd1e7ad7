//! Command registry for REPL commands
//!
//! Commands are matched by their longest registered prefix; the rest of the
//! line is handed to the handler as its arguments.

pub mod echo;
pub mod general;
pub mod import;
pub mod midi;
pub mod pattern;

use crate::audio::clock::MasterClock;
use crate::audio::dispatcher::{DispatcherHandle, TimeUnit, TransportSink};
use crate::audio::midi::MidiOutputHandle;
use crate::config::PlayerConfig;
use pulsar_core::import::NoteCanvas;
use pulsar_core::types::PitchTable;
use pulsar_core::{SequenceCursor, TrackImport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Result of executing a command
#[derive(Debug)]
pub enum CommandResult {
    /// Command executed successfully, nothing to print
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// No command matched
    NotACommand,
    Error(String),
}

/// State shared by every command handler
pub struct CommandContext {
    pub config: PlayerConfig,
    pub clock: Arc<MasterClock>,
    pub midi_handle: Arc<MidiOutputHandle>,
    pub dispatcher: DispatcherHandle,
    /// Pitch names accepted in patterns and echo triggers
    pub resolver: PitchTable,
    pub rng: StdRng,
    /// Step position per pattern text, for `step`
    pub cursors: HashMap<String, SequenceCursor>,
    pub last_import: Option<TrackImport>,
    pub canvases: Vec<NoteCanvas>,
}

impl CommandContext {
    pub fn new(
        config: PlayerConfig,
        clock: Arc<MasterClock>,
        midi_handle: Arc<MidiOutputHandle>,
        dispatcher: DispatcherHandle,
    ) -> Self {
        let rng = match config.transport.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            clock,
            midi_handle,
            dispatcher,
            resolver: PitchTable::general_midi_drums(),
            rng,
            cursors: HashMap::new(),
            last_import: None,
            canvases: Vec::new(),
        }
    }

    /// Start the clock if needed and return the beat of the next bar line
    pub fn next_bar_beat(&self) -> f64 {
        self.clock.start();
        let beats_per_bar = self.clock.beats_per_bar() as f64;
        (self.clock.current_beat() / beats_per_bar).ceil() * beats_per_bar
    }

    /// Start the clock if needed and return the next whole beat
    pub fn next_beat(&self) -> f64 {
        self.clock.start();
        self.clock.current_beat().ceil()
    }

    /// Sink reading offsets in bars from `origin_beat`
    pub fn bar_sink(&self, origin_beat: f64) -> TransportSink {
        TransportSink::new(
            self.dispatcher.clone(),
            origin_beat,
            TimeUnit::Bars {
                beats_per_bar: self.clock.beats_per_bar(),
            },
        )
    }

    /// Sink reading offsets in seconds from `origin_beat` at the current tempo
    pub fn seconds_sink(&self, origin_beat: f64) -> TransportSink {
        TransportSink::new(
            self.dispatcher.clone(),
            origin_beat,
            TimeUnit::Seconds {
                bpm: self.clock.bpm(),
            },
        )
    }
}

/// Command arguments split into bare words and `key=value` options
#[derive(Debug, Default)]
pub struct ParsedArgs<'a> {
    pub words: Vec<&'a str>,
    options: Vec<(&'a str, &'a str)>,
}

impl<'a> ParsedArgs<'a> {
    pub fn parse(args: &'a str) -> Self {
        let mut parsed = ParsedArgs::default();
        for token in args.split_whitespace() {
            match token.split_once('=') {
                Some((key, value)) => parsed.options.push((key, value)),
                None => parsed.words.push(token),
            }
        }
        parsed
    }

    /// The bare words joined back together
    pub fn text(&self) -> String {
        self.words.join(" ")
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w.eq_ignore_ascii_case(word))
    }

    /// Parse option `key`, if given; the last occurrence wins
    pub fn get<T: FromStr>(&self, key: &str) -> Result<Option<T>, String> {
        match self.options.iter().rev().find(|(k, _)| *k == key) {
            Some((_, value)) => value
                .parse()
                .map(Some)
                .map_err(|_| format!("invalid value for {}: '{}'", key, value)),
            None => Ok(None),
        }
    }

    /// First option key not in `allowed`
    pub fn unknown_option(&self, allowed: &[&str]) -> Option<&'a str> {
        self.options
            .iter()
            .map(|(k, _)| *k)
            .find(|k| !allowed.contains(k))
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with every built-in command
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register("play", pattern::cmd_play);
    registry.register("step", pattern::cmd_step);
    registry.register("echo", echo::cmd_echo);
    registry.register("import", import::cmd_import);
    registry.register("replay", import::cmd_replay);
    registry.register("canvas", import::cmd_canvas);

    registry.register("midi devices", midi::cmd_midi_devices);
    registry.register("midi connect", midi::cmd_midi_connect);
    registry.register("midi disconnect", midi::cmd_midi_disconnect);
    registry.register("midi channel", midi::cmd_midi_channel);
    registry.register("midi status", midi::cmd_midi_status);
    registry.register("midi panic", midi::cmd_midi_panic);

    registry.register("tempo", general::cmd_tempo);
    registry.register("stop", general::cmd_stop);
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);

    registry
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::audio::dispatcher::DispatcherCommand;
    use crossbeam_channel::Receiver;

    /// Context backed by a dispatcher with no thread. The clock runs at 1 BPM
    /// so its position stays at beat 0 for the length of a test.
    pub(crate) fn context() -> (CommandContext, Receiver<DispatcherCommand>) {
        let (dispatcher, commands) = DispatcherHandle::detached();
        let mut config = PlayerConfig::default();
        config.transport.seed = Some(1);
        let ctx = CommandContext::new(
            config,
            Arc::new(MasterClock::new(1.0, 4)),
            Arc::new(MidiOutputHandle::new()),
            dispatcher,
        );
        (ctx, commands)
    }

    /// Every message scheduled so far, flattened
    pub(crate) fn scheduled(
        commands: &Receiver<DispatcherCommand>,
    ) -> Vec<crate::audio::dispatcher::TimedMessage> {
        let mut messages = Vec::new();
        while let Ok(cmd) = commands.try_recv() {
            if let DispatcherCommand::Schedule(batch) = cmd {
                messages.extend(batch);
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_args() {
        let args = ParsedArgs::parse("0 [1 2] vel=90 span=2 canvas");
        assert_eq!(args.text(), "0 [1 2] canvas");
        assert!(args.has_word("CANVAS"));
        assert_eq!(args.get::<u8>("vel"), Ok(Some(90)));
        assert_eq!(args.get::<f64>("span"), Ok(Some(2.0)));
        assert_eq!(args.get::<f64>("pan"), Ok(None));
        assert!(args.get::<u8>("span").is_ok());
        assert_eq!(args.unknown_option(&["vel", "span"]), None);
        assert_eq!(args.unknown_option(&["vel"]), Some("span"));
    }

    #[test]
    fn test_bad_option_value() {
        let args = ParsedArgs::parse("60 vel=loud");
        assert!(args.get::<u8>("vel").is_err());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = create_registry();
        let (mut ctx, _commands) = testing::context();
        assert!(matches!(
            registry.execute("quit", &mut ctx),
            CommandResult::Exit
        ));
        assert!(matches!(
            registry.execute("midi status", &mut ctx),
            CommandResult::Message(_)
        ));
        assert!(matches!(
            registry.execute("quitter", &mut ctx),
            CommandResult::NotACommand
        ));
    }
}
