//! PatternEntry enum - the value held by one slot of a pattern.

use crate::error::Result;
use crate::types::pitch::PitchResolver;
use std::fmt;

/// A pitch as written: a note number or a name resolved at expansion time
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PitchValue {
    Number(i32),
    Name(String),
}

impl PitchValue {
    pub fn resolve<P: PitchResolver + ?Sized>(&self, resolver: &P) -> Result<i32> {
        match self {
            PitchValue::Number(n) => Ok(*n),
            PitchValue::Name(name) => resolver.resolve(name),
        }
    }
}

impl fmt::Display for PitchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PitchValue::Number(n) => write!(f, "{}", n),
            PitchValue::Name(name) => write!(f, "{}", name),
        }
    }
}

/// A single slot of a pattern
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatternEntry {
    /// Silence: _
    Rest,
    /// One note: 60, C4
    Pitch(PitchValue),
    /// Simultaneous members, all starting at the slot start: (0,4,7)
    Chord(Vec<PatternEntry>),
    /// Nested pattern subdividing the slot: [0 0]
    SubPattern(Vec<PatternEntry>),
}

impl PatternEntry {
    /// Numbered pitch entry
    pub fn pitch(n: i32) -> Self {
        PatternEntry::Pitch(PitchValue::Number(n))
    }

    /// Named pitch entry, resolved when the pattern is expanded
    pub fn named(name: &str) -> Self {
        PatternEntry::Pitch(PitchValue::Name(name.to_string()))
    }

    pub fn chord(members: Vec<PatternEntry>) -> Self {
        PatternEntry::Chord(members)
    }

    pub fn sub(entries: Vec<PatternEntry>) -> Self {
        PatternEntry::SubPattern(entries)
    }

    /// Number of events this entry emits when expanded
    pub fn event_count(&self) -> usize {
        match self {
            PatternEntry::Rest => 0,
            PatternEntry::Pitch(_) => 1,
            PatternEntry::Chord(members) | PatternEntry::SubPattern(members) => {
                members.iter().map(PatternEntry::event_count).sum()
            }
        }
    }

    /// Collect the names that still need a resolver, in traversal order
    pub fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            PatternEntry::Pitch(PitchValue::Name(name)) => names.push(name.clone()),
            PatternEntry::Chord(members) | PatternEntry::SubPattern(members) => {
                for m in members {
                    m.collect_names(names);
                }
            }
            _ => {}
        }
    }

    /// Replace every named pitch with its note number.
    /// Fails on the first name the resolver does not know.
    pub fn resolve_names<P: PitchResolver + ?Sized>(&self, resolver: &P) -> Result<PatternEntry> {
        match self {
            PatternEntry::Rest => Ok(PatternEntry::Rest),
            PatternEntry::Pitch(value) => Ok(PatternEntry::pitch(value.resolve(resolver)?)),
            PatternEntry::Chord(members) => Ok(PatternEntry::Chord(
                members
                    .iter()
                    .map(|m| m.resolve_names(resolver))
                    .collect::<Result<_>>()?,
            )),
            PatternEntry::SubPattern(entries) => Ok(PatternEntry::SubPattern(
                entries
                    .iter()
                    .map(|e| e.resolve_names(resolver))
                    .collect::<Result<_>>()?,
            )),
        }
    }
}

impl fmt::Display for PatternEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternEntry::Rest => write!(f, "_"),
            PatternEntry::Pitch(value) => write!(f, "{}", value),
            PatternEntry::Chord(members) => {
                write!(f, "(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, ")")
            }
            PatternEntry::SubPattern(entries) => {
                write!(f, "[")?;
                for (i, e) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
        }
    }
}
