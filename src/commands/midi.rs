//! MIDI REPL commands

use crate::audio::midi::{MidiChannelMode, MidiOutputHandle};
use crate::commands::{CommandContext, CommandResult};
use colored::*;

const CHANNEL_USAGE: &str = "Usage: midi channel <1-16|auto>\n  1-16: send every route to this channel\n  auto: route N plays on channel N+1";

fn describe(mode: MidiChannelMode) -> String {
    match mode {
        MidiChannelMode::PerRoute => "Per-route (route 0→Ch 1, route 1→Ch 2, ...)".to_string(),
        MidiChannelMode::Mono(ch) => format!("Mono (all routes→Channel {})", ch + 1),
    }
}

/// Parse `auto` or a 1-based channel number
pub(crate) fn parse_channel_mode(arg: &str) -> Option<MidiChannelMode> {
    match arg.to_lowercase().as_str() {
        "auto" | "per-route" | "perroute" => Some(MidiChannelMode::PerRoute),
        other => match other.parse::<u8>() {
            Ok(ch) if (1..=16).contains(&ch) => Some(MidiChannelMode::Mono(ch - 1)),
            _ => None,
        },
    }
}

/// Handle `midi devices` command - list available MIDI output ports
pub fn cmd_midi_devices(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    match MidiOutputHandle::list_ports() {
        Ok(ports) if ports.is_empty() => CommandResult::Message(
            "No MIDI output ports found. Make sure a MIDI device or virtual port is connected."
                .yellow()
                .to_string(),
        ),
        Ok(ports) => {
            let mut output = format!("{}\n", "🎹 Available MIDI Output Ports:".bold());
            for (i, port) in ports.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, port.cyan()));
            }
            output.push_str(&format!(
                "\n{} {}",
                "Use".dimmed(),
                "midi connect <port name>".green()
            ));
            CommandResult::Message(output)
        }
        Err(e) => CommandResult::Error(format!("Failed to list MIDI ports: {}", e)),
    }
}

/// Handle `midi connect <port>` command
pub fn cmd_midi_connect(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error(
            "Usage: midi connect <port name>\nUse 'midi devices' to see available ports"
                .to_string(),
        );
    }

    match ctx.midi_handle.connect(args) {
        Ok(name) => CommandResult::Message(format!("🎹 Connected to MIDI port: {}", name.green())),
        Err(e) => CommandResult::Error(format!("Failed to connect to '{}': {}", args, e)),
    }
}

/// Handle `midi disconnect` command
pub fn cmd_midi_disconnect(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.midi_handle.disconnect() {
        Ok(()) => CommandResult::Message("🎹 Disconnected from MIDI".to_string()),
        Err(e) => CommandResult::Error(format!("Failed to disconnect: {}", e)),
    }
}

/// Handle `midi channel [1-16|auto]`: show or set how routes map to channels
pub fn cmd_midi_channel(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!(
            "🎹 Current MIDI channel mode: {}",
            describe(ctx.midi_handle.channel_mode())
        ));
    }

    match parse_channel_mode(args) {
        Some(mode) => {
            ctx.midi_handle.set_channel_mode(mode);
            CommandResult::Message(
                format!("🎹 MIDI channel mode: {}", describe(mode))
                    .green()
                    .to_string(),
            )
        }
        None => CommandResult::Error(CHANNEL_USAGE.to_string()),
    }
}

/// Handle `midi status` command
pub fn cmd_midi_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let handle = &ctx.midi_handle;
    let mut output = format!("{}\n", "🎹 MIDI Status:".bold());

    match handle.connected_port() {
        Some(name) => {
            output.push_str(&format!("  Status: {}\n", "Connected".green().bold()));
            output.push_str(&format!("  Port: {}\n", name.cyan()));
        }
        None => output.push_str(&format!("  Status: {}\n", "Not connected".yellow())),
    }
    output.push_str(&format!(
        "  Channel mode: {}\n",
        describe(handle.channel_mode())
    ));
    output.push_str(&format!("  Held notes: {}", handle.active_note_count()));

    CommandResult::Message(output)
}

/// Handle `midi panic` command - send All Notes Off to all channels
pub fn cmd_midi_panic(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.dispatcher.stop_all();
    match ctx.midi_handle.panic_all() {
        Ok(()) => CommandResult::Message(
            "🎹 MIDI Panic: All Notes Off sent to all channels"
                .yellow()
                .to_string(),
        ),
        Err(e) => CommandResult::Error(format!("Failed to send MIDI panic: {}", e)),
    }
}
