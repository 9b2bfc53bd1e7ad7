//! # Pulsar
//!
//! Live front end for the Pulsar sequencer. Patterns, echoes and imported
//! performances are generated by `pulsar-core` and played out over MIDI
//! against a shared master clock.
//!
//! ## Modules
//!
//! - `audio`: the master clock, the event dispatcher that turns scheduled
//!   events into timed note messages, and the MIDI output
//! - `commands`: REPL command registry and handlers
//! - `config`: `pulsar.toml` loading
//! - `logging`: console logger behind the `log` facade
//! - `repl`: the interactive loop
//! - `smf`: Standard MIDI File decoding into performance events

pub mod audio;
pub mod commands;
pub mod config;
pub mod logging;
pub mod repl;
pub mod smf;

pub use crate::config::PlayerConfig;
pub use pulsar_core::{EchoSpec, ExpandParams, Pattern, ScheduledEvent};
