//! `echo` command

use crate::commands::pattern::skipped_note;
use crate::commands::{CommandContext, CommandResult, ParsedArgs};
use colored::*;
use pulsar_core::types::PitchResolver;
use pulsar_core::{echo, EventSink, Transport, Trigger};

const OPTIONS: &[&str] = &[
    "vel", "repeats", "loop", "len", "sync", "prob", "route2", "pan",
];

const USAGE: &str = "Usage: echo <pitch> [vel=0-127] [repeats=n] [loop=bars] [len=bars] \
[sync=0-1] [prob=0-1] [route2=n] [pan=-1..1] [skipfirst] [quantize]";

/// Handle `echo <pitch> [options]`: fire the echo of one trigger right now
pub fn cmd_echo(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let parsed = ParsedArgs::parse(args);
    let Some(pitch_word) = parsed.words.first() else {
        return CommandResult::Error(USAGE.to_string());
    };
    if let Some(key) = parsed.unknown_option(OPTIONS) {
        return CommandResult::Error(format!("unknown option '{}'\n{}", key, USAGE));
    }

    let pitch = match pitch_word.parse::<i32>() {
        Ok(n) => n,
        Err(_) => match ctx.resolver.resolve(pitch_word) {
            Ok(n) => n,
            Err(e) => return CommandResult::Error(e.to_string()),
        },
    };

    let (velocity, spec) = match build(&parsed, ctx) {
        Ok(v) => v,
        Err(e) => return CommandResult::Error(e),
    };

    ctx.clock.start();
    let position = ctx.clock.position_bars();
    let events = echo(Trigger::new(pitch, velocity), &spec, position, &mut ctx.rng);

    let mut sink = ctx.bar_sink(ctx.clock.current_beat());
    for event in events {
        sink.accept(event);
    }
    CommandResult::Message(format!(
        "↻ echo {} at bar {:.3}: {} of {} repeats{}",
        pitch.to_string().cyan(),
        position,
        sink.accepted(),
        spec.repeat_count,
        skipped_note(sink.dropped())
    ))
}

fn build(
    parsed: &ParsedArgs,
    ctx: &CommandContext,
) -> Result<(u8, pulsar_core::EchoSpec), String> {
    let velocity = parsed
        .get::<u8>("vel")?
        .unwrap_or(ctx.config.expand.velocity)
        .min(127);

    let mut spec = ctx.config.echo_spec();
    if let Some(repeats) = parsed.get("repeats")? {
        spec.repeat_count = repeats;
    }
    if let Some(loop_length) = parsed.get::<f64>("loop")? {
        if !(loop_length.is_finite() && loop_length >= 0.0) {
            return Err("loop must be a non-negative number of bars".to_string());
        }
        spec.loop_length = loop_length;
    }
    if let Some(length) = parsed.get("len")? {
        spec = spec.with_note_length(length);
    }
    let play = parsed.get("prob")?.unwrap_or(spec.play_probability);
    let sync = parsed.get("sync")?.unwrap_or(spec.syncopate_chance);
    spec = spec.with_probabilities(play, sync);
    if let Some(route) = parsed.get("route2")? {
        spec = spec.with_secondary_route(route);
    }
    if let Some(pan) = parsed.get("pan")? {
        spec = spec.with_pan(pan);
    }
    if parsed.has_word("skipfirst") {
        spec = spec.suppress_first(true);
    }
    if parsed.has_word("quantize") {
        spec = spec.quantized(true);
    }
    Ok((velocity, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::dispatcher::MessageKind;
    use crate::commands::testing;

    fn note_ons(args: &str) -> Vec<(f64, u8, usize)> {
        let (mut ctx, commands) = testing::context();
        cmd_echo(args, &mut ctx);
        testing::scheduled(&commands)
            .into_iter()
            .filter_map(|m| match m.kind {
                MessageKind::NoteOn { note, .. } => Some((m.beat, note, m.route)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_echo_repeats_on_routes() {
        let ons = note_ons("60 repeats=4 loop=1 route2=2");
        assert_eq!(
            ons,
            vec![(0.0, 60, 0), (4.0, 60, 2), (8.0, 60, 2), (12.0, 60, 2)]
        );
    }

    #[test]
    fn test_echo_named_pitch_and_skipfirst() {
        let ons = note_ons("snare repeats=3 loop=0.25 skipfirst");
        assert_eq!(ons, vec![(1.0, 38, 1), (2.0, 38, 1)]);
    }

    #[test]
    fn test_echo_zero_probability() {
        assert!(note_ons("60 prob=0").is_empty());
    }

    #[test]
    fn test_echo_errors() {
        let (mut ctx, _) = testing::context();
        assert!(matches!(cmd_echo("", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_echo("xyz", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_echo("60 loop=-1", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_echo("60 wat=1", &mut ctx), CommandResult::Error(_)));
    }
}
