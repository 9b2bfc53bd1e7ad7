//! Pattern commands: `play` and `step`

use crate::commands::{CommandContext, CommandResult, ParsedArgs};
use colored::*;
use pulsar_core::types::time::from_f64;
use pulsar_core::{EventSink, ExpandParams, Pattern};

const OPTIONS: &[&str] = &[
    "span", "offset", "vel", "sustain", "pan", "route", "vjit", "pjit",
];

const USAGE: &str = "Usage: play <pattern> [span=bars] [offset=n] [vel=0-127] [sustain=0-1] \
[pan=-1..1] [route=n] [vjit=0-1] [pjit=0-1]";

/// Expansion parameters from config defaults plus any `key=value` overrides
fn params_from(args: &ParsedArgs, ctx: &CommandContext) -> Result<ExpandParams, String> {
    if let Some(key) = args.unknown_option(OPTIONS) {
        return Err(format!("unknown option '{}'\n{}", key, USAGE));
    }

    let mut params = ctx.config.expand_params();
    if let Some(span) = args.get::<f64>("span")? {
        params = params.with_span(from_f64(span));
    }
    if let Some(offset) = args.get("offset")? {
        params = params.with_pitch_offset(offset);
    }
    if let Some(velocity) = args.get::<u8>("vel")? {
        params = params.with_velocity(velocity.min(127));
    }
    if let Some(sustain) = args.get("sustain")? {
        params = params.with_sustain(sustain);
    }
    if let Some(pan) = args.get("pan")? {
        params = params.with_pan(pan);
    }
    if let Some(route) = args.get("route")? {
        params = params.with_route(route);
    }
    let velocity_jitter = args.get("vjit")?.unwrap_or(params.velocity_jitter);
    let pan_jitter = args.get("pjit")?.unwrap_or(params.pan_jitter);
    Ok(params.with_jitter(velocity_jitter, pan_jitter))
}

/// Handle `play <pattern> [options]`: expand the whole pattern from the next bar
pub fn cmd_play(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parsed = ParsedArgs::parse(args);
    if parsed.words.is_empty() {
        return CommandResult::Error(USAGE.to_string());
    }

    let pattern = match Pattern::parse(&parsed.text()) {
        Ok(p) => p,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    let params = match params_from(&parsed, ctx) {
        Ok(p) => p,
        Err(e) => return CommandResult::Error(e),
    };

    let origin = ctx.next_bar_beat();
    let mut sink = ctx.bar_sink(origin);
    match pattern.expand_into(&params, &ctx.resolver, &mut ctx.rng, &mut sink) {
        Ok(count) => {
            log::debug!("{} expanded to {} events at beat {}", pattern, count, origin);
            CommandResult::Message(format!(
                "▶ {} {} events from beat {}{}",
                pattern.to_string().cyan(),
                sink.accepted(),
                origin,
                skipped_note(sink.dropped())
            ))
        }
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `step <pattern> [options]`: play the next slot of the pattern,
/// stretched over the span, from the next beat
pub fn cmd_step(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parsed = ParsedArgs::parse(args);
    if parsed.words.is_empty() {
        return CommandResult::Error("Usage: step <pattern> [options]".to_string());
    }

    let key = parsed.text();
    let pattern = match Pattern::parse(&key) {
        Ok(p) => p,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    let params = match params_from(&parsed, ctx) {
        Ok(p) => p,
        Err(e) => return CommandResult::Error(e),
    };

    let cursor = ctx.cursors.get(&key).copied().unwrap_or_default();
    let (events, next) = match pattern.expand_step(cursor, &params, &ctx.resolver, &mut ctx.rng)
    {
        Ok(result) => result,
        Err(e) => return CommandResult::Error(e.to_string()),
    };
    ctx.cursors.insert(key, next);

    let origin = ctx.next_beat();
    let mut sink = ctx.bar_sink(origin);
    for event in events {
        sink.accept(event);
    }
    CommandResult::Message(format!(
        "▶ step {} of {}: {} events{}",
        cursor.position() % pattern.len().max(1) + 1,
        pattern.len(),
        sink.accepted(),
        skipped_note(sink.dropped())
    ))
}

pub(crate) fn skipped_note(dropped: usize) -> String {
    if dropped == 0 {
        String::new()
    } else {
        format!(" ({} outside MIDI range)", dropped).yellow().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::dispatcher::MessageKind;
    use crate::commands::testing;

    #[test]
    fn test_play_schedules_every_event() {
        let (mut ctx, commands) = testing::context();
        let result = cmd_play("60 _ (60,64) [67 67]", &mut ctx);
        assert!(matches!(result, CommandResult::Message(_)));

        let ons: Vec<(f64, u8)> = testing::scheduled(&commands)
            .into_iter()
            .filter_map(|m| match m.kind {
                MessageKind::NoteOn { note, .. } => Some((m.beat, note)),
                _ => None,
            })
            .collect();
        // Clock is at beat 0, so the next bar line is beat 0
        assert_eq!(
            ons,
            vec![(0.0, 60), (2.0, 60), (2.0, 64), (3.0, 67), (3.5, 67)]
        );
    }

    #[test]
    fn test_play_options() {
        let (mut ctx, commands) = testing::context();
        cmd_play("0 drop vel=80 offset=48 span=2 route=3", &mut ctx);
        let messages = testing::scheduled(&commands);
        assert!(messages.is_empty());

        cmd_play("0 12 vel=80 offset=48 span=2 route=3", &mut ctx);
        let messages = testing::scheduled(&commands);
        let ons: Vec<(f64, MessageKind)> = messages
            .iter()
            .filter(|m| matches!(m.kind, MessageKind::NoteOn { .. }))
            .map(|m| (m.beat, m.kind))
            .collect();
        assert_eq!(
            ons,
            vec![
                (0.0, MessageKind::NoteOn { note: 48, velocity: 80 }),
                (4.0, MessageKind::NoteOn { note: 60, velocity: 80 }),
            ]
        );
        assert!(messages.iter().all(|m| m.route == 3));
    }

    #[test]
    fn test_play_reports_errors() {
        let (mut ctx, _commands) = testing::context();
        assert!(matches!(cmd_play("", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_play("[0 1", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_play("0 span=0", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_play("0 bogus=1", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_step_advances_per_pattern() {
        let (mut ctx, commands) = testing::context();
        for _ in 0..3 {
            cmd_step("60 [62 64]", &mut ctx);
        }
        let notes: Vec<u8> = testing::scheduled(&commands)
            .into_iter()
            .filter_map(|m| match m.kind {
                MessageKind::NoteOn { note, .. } => Some(note),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![60, 62, 64, 60]);
        assert_eq!(ctx.cursors["60 [62 64]"].position(), 3);
    }
}
