//! Performance import commands: `import`, `replay` and `canvas`

use crate::commands::pattern::skipped_note;
use crate::commands::{CommandContext, CommandResult, ParsedArgs};
use crate::smf::load_performance;
use colored::*;
use pulsar_core::import::materialize;
use pulsar_core::types::time::bpm_to_tempo;
use pulsar_core::{NoteCanvas, TrackImport};
use std::path::Path;

const USAGE: &str = "Usage: import <file.mid> [tracks=1,2,...] [canvas] [play]";

fn parse_tracks(list: &str) -> Result<Vec<usize>, String> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| format!("invalid track index '{}'", s))
        })
        .collect()
}

/// Handle `import <file.mid> [tracks=..] [canvas] [play]`
pub fn cmd_import(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parsed = ParsedArgs::parse(args);
    let Some(path) = parsed.words.first() else {
        return CommandResult::Error(USAGE.to_string());
    };
    if let Some(key) = parsed.unknown_option(&["tracks"]) {
        return CommandResult::Error(format!("unknown option '{}'\n{}", key, USAGE));
    }

    let selection = match parsed.get::<String>("tracks") {
        Ok(Some(list)) => match parse_tracks(&list) {
            Ok(tracks) => tracks,
            Err(e) => return CommandResult::Error(e),
        },
        Ok(None) => ctx.config.import.tracks.clone(),
        Err(e) => return CommandResult::Error(e),
    };

    let performance = match load_performance(Path::new(path)) {
        Ok(p) => p,
        Err(e) => return CommandResult::Error(format!("{:#}", e)),
    };
    let fallback_tempo = bpm_to_tempo(ctx.clock.bpm());
    let imported = match performance.import(fallback_tempo, &selection) {
        Ok(i) => i,
        Err(e) => return CommandResult::Error(e.to_string()),
    };

    let mut output = format!(
        "{} {}: {} notes in {} tracks, {:.2}s\n",
        "⬇ Imported".bold(),
        path.cyan(),
        imported.note_count(),
        imported.len(),
        imported.length_seconds()
    );
    for (track, notes) in imported.iter() {
        output.push_str(&format!("  Track {}: {} notes\n", track, notes.len()));
    }

    if parsed.has_word("canvas") || ctx.config.import.create_canvas {
        let before = ctx.canvases.len();
        ctx.canvases
            .extend(materialize(&imported, NoteCanvas::new).into_iter().map(|(_, c)| c));
        output.push_str(&format!(
            "  {} canvases created\n",
            ctx.canvases.len() - before
        ));
    }

    if parsed.has_word("play") || ctx.config.import.play_on_load {
        output.push_str(&format!("  {}\n", schedule(&imported, ctx)));
    }

    ctx.last_import = Some(imported);
    CommandResult::Message(output.trim_end().to_string())
}

/// Handle `replay`: schedule the last import again from the next bar
pub fn cmd_replay(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.last_import.take() {
        Some(imported) => {
            let message = schedule(&imported, ctx);
            ctx.last_import = Some(imported);
            CommandResult::Message(message)
        }
        None => CommandResult::Error("Nothing imported yet. Use 'import <file.mid>'".to_string()),
    }
}

fn schedule(imported: &TrackImport, ctx: &CommandContext) -> String {
    let origin = ctx.next_bar_beat();
    let mut sink = ctx.seconds_sink(origin);
    imported.schedule(&mut sink);
    format!(
        "▶ replaying {} notes from beat {}{}",
        sink.accepted(),
        origin,
        skipped_note(sink.dropped())
    )
}

/// Handle `canvas [n]`: list canvases, or show the notes of one
pub fn cmd_canvas(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.canvases.is_empty() {
        return CommandResult::Message("No canvases".to_string());
    }

    if args.is_empty() {
        let mut output = format!("{}\n", "🎼 Canvases:".bold());
        for (i, canvas) in ctx.canvases.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, canvas));
        }
        return CommandResult::Message(output.trim_end().to_string());
    }

    let canvas = match args.parse::<usize>() {
        Ok(n) if n >= 1 && n <= ctx.canvases.len() => &ctx.canvases[n - 1],
        _ => {
            return CommandResult::Error(format!(
                "Canvas must be 1-{}",
                ctx.canvases.len()
            ))
        }
    };

    let mut output = format!("{}\n", canvas.to_string().bold());
    for note in canvas.notes() {
        output.push_str(&format!(
            "  @{:>8.3}s  {:>3}  vel {:>3}  {:.3}s\n",
            note.onset, note.pitch, note.velocity, note.length
        ));
    }
    CommandResult::Message(output.trim_end().to_string())
}
