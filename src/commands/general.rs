//! General REPL commands (help, quit, tempo, stop)

use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `tempo [bpm]` command
pub fn cmd_tempo(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("Current tempo: {:.1} BPM", ctx.clock.bpm()));
    }

    match args.parse::<f64>() {
        Ok(bpm) if (1.0..=400.0).contains(&bpm) => {
            ctx.clock.set_bpm(bpm);
            CommandResult::Message(
                format!("🎵 Tempo set to {:.1} BPM", bpm)
                    .bright_green()
                    .to_string(),
            )
        }
        _ => CommandResult::Error("Invalid tempo. Use a value between 1-400 BPM".to_string()),
    }
}

/// Handle `stop`: drop everything still queued and release held notes
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.dispatcher.stop_all();
    ctx.cursors.clear();
    CommandResult::Message("⏹ Stopped".to_string())
}

fn print_help() {
    println!("{}", "🎵 Pulsar Help".bold());
    println!("{}", "==============".bold());
    println!();
    println!("{}", "Patterns:".green());
    println!("  {}          - Four notes, one per quarter bar", "play 0 2 4 7".cyan());
    println!("  {}        - Subdivide a slot", "play 0 [4 7] 12".cyan());
    println!("  {}          - Stack a chord", "play (0,4,7)".cyan());
    println!("  {}     - Drum names and rests", "play kick ~ _ snare".cyan());
    println!(
        "  {}  - Span, offset, velocity, sustain",
        "play 0 3 span=2 offset=12 vel=90 sustain=0.5".cyan()
    );
    println!(
        "  {}  - Pan, output route, jitter",
        "play 0 3 pan=-0.5 route=1 vjit=0.2 pjit=0.1".cyan()
    );
    println!(
        "  {}     - Play the next top-level step only",
        "step 0 2 4 7".cyan()
    );
    println!();
    println!("{}", "Echo:".green());
    println!("  {}                - Echo a pitch now", "echo 60".cyan());
    println!(
        "  {}  - Count, loop length (bars), note length",
        "echo snare repeats=8 loop=0.25 len=0.0625".cyan()
    );
    println!(
        "  {}  - Syncopation and play chance",
        "echo 60 sync=0.3 prob=0.8".cyan()
    );
    println!(
        "  {}  - Repeat route, pan, flags",
        "echo 60 route2=2 pan=0.5 skipfirst quantize".cyan()
    );
    println!();
    println!("{}", "Import:".green());
    println!(
        "  {}  - Import a MIDI file",
        "import song.mid [tracks=1,2] [canvas] [play]".cyan()
    );
    println!("  {}                   - Play the last import again", "replay".cyan());
    println!("  {}               - List canvases or show one", "canvas [n]".cyan());
    println!();
    println!("{}", "Transport:".green());
    println!("  {}        - Show current tempo", "tempo".cyan());
    println!("  {}    - Set tempo", "tempo <bpm>".cyan());
    println!("  {}         - Stop everything scheduled", "stop".cyan());
    println!();
    println!("{}", "MIDI Commands:".green());
    println!("  {}       - List MIDI output ports", "midi devices".cyan());
    println!("  {} - Connect to MIDI port", "midi connect <port>".cyan());
    println!("  {}    - Disconnect MIDI", "midi disconnect".cyan());
    println!(
        "  {}     - Set channel (1-16 or 'auto')",
        "midi channel".cyan()
    );
    println!("  {}        - Show connection status", "midi status".cyan());
    println!("  {}         - Send All Notes Off", "midi panic".cyan());
    println!();
    println!("  {} / {}          - Exit", "quit".cyan(), "exit".cyan());
}
