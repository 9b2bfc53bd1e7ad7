//! Mini-notation parser for patterns.
//!
//! `0 _ (0,4) [0 0]` reads as: pitch 0, a rest, a chord of 0 and 4, and a
//! two-slot sub-pattern. Pitches are integers or names (`C4`, `kick`);
//! `_` and `~` are rests.

use super::entry::{PatternEntry, PitchValue};
use crate::error::{Result, SequencerError};
use std::iter::Peekable;
use std::str::Chars;

/// Characters that end a bare pitch token
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')' | ',')
}

pub fn parse_entries(notation: &str) -> Result<Vec<PatternEntry>> {
    let mut chars = notation.chars().peekable();
    parse_sequence(&mut chars, false)
}

/// Parse entries until end of input, or until the matching `]` when `nested`
fn parse_sequence(chars: &mut Peekable<Chars>, nested: bool) -> Result<Vec<PatternEntry>> {
    let mut entries = Vec::new();

    loop {
        match chars.peek().copied() {
            None => {
                if nested {
                    return Err(SequencerError::malformed("unclosed '['"));
                }
                break;
            }
            Some(c) if c.is_whitespace() => {
                chars.next();
            }
            Some(']') => {
                if !nested {
                    return Err(SequencerError::malformed("unexpected ']'"));
                }
                chars.next();
                break;
            }
            Some(_) => entries.push(parse_entry(chars)?),
        }
    }

    Ok(entries)
}

fn parse_entry(chars: &mut Peekable<Chars>) -> Result<PatternEntry> {
    match chars.peek().copied() {
        Some('_') | Some('~') => {
            chars.next();
            Ok(PatternEntry::Rest)
        }
        Some('[') => {
            chars.next(); // consume '['
            Ok(PatternEntry::SubPattern(parse_sequence(chars, true)?))
        }
        Some('(') => {
            chars.next(); // consume '('
            parse_chord(chars)
        }
        Some(c @ (')' | ',' | ']')) => Err(SequencerError::malformed(format!(
            "unexpected '{}'",
            c
        ))),
        Some(_) => parse_pitch(chars),
        None => Err(SequencerError::malformed("unexpected end of pattern")),
    }
}

/// Comma-separated members up to the closing `)`
fn parse_chord(chars: &mut Peekable<Chars>) -> Result<PatternEntry> {
    let mut members = Vec::new();

    loop {
        skip_whitespace(chars);
        match chars.peek().copied() {
            None => return Err(SequencerError::malformed("unclosed '('")),
            Some(')') => {
                chars.next();
                break;
            }
            Some(_) => members.push(parse_entry(chars)?),
        }

        skip_whitespace(chars);
        match chars.next() {
            Some(',') => continue,
            Some(')') => break,
            Some(c) => {
                return Err(SequencerError::malformed(format!(
                    "expected ',' or ')' in chord, found '{}'",
                    c
                )))
            }
            None => return Err(SequencerError::malformed("unclosed '('")),
        }
    }

    Ok(PatternEntry::Chord(members))
}

fn parse_pitch(chars: &mut Peekable<Chars>) -> Result<PatternEntry> {
    let mut token = String::new();
    while let Some(&c) = chars.peek() {
        if is_delimiter(c) {
            break;
        }
        token.push(c);
        chars.next();
    }

    if let Ok(n) = token.parse::<i32>() {
        return Ok(PatternEntry::Pitch(PitchValue::Number(n)));
    }
    match token.chars().next() {
        // Names are checked against a resolver at expansion time
        Some(c) if c.is_alphabetic() => Ok(PatternEntry::Pitch(PitchValue::Name(token))),
        _ => Err(SequencerError::malformed(format!(
            "invalid pitch '{}'",
            token
        ))),
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}
