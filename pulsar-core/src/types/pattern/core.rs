//! Core Pattern struct and implementation.

use super::cursor::SequenceCursor;
use super::entry::PatternEntry;
use super::expander::{expand_entries, ExpandParams};
use super::parser::parse_entries;
use crate::error::Result;
use crate::sink::EventSink;
use crate::types::pitch::{NoteNameResolver, PitchResolver};
use crate::types::scheduled_event::ScheduledEvent;
use crate::types::time::Time;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// An ordered sequence of equal-width slots
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pattern {
    pub entries: Vec<PatternEntry>,
}

impl Pattern {
    /// Create an empty pattern
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<PatternEntry>) -> Self {
        Pattern { entries }
    }

    /// Parse mini-notation such as `"0 _ (0,4) [0 0]"`
    pub fn parse(notation: &str) -> Result<Self> {
        Ok(Pattern {
            entries: parse_entries(notation)?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Width of one top-level slot for a given span (zero for an empty pattern)
    pub fn slot_width(&self, span: Time) -> Time {
        if self.entries.is_empty() {
            return Time::from_integer(0);
        }
        span / self.entries.len() as i64
    }

    /// Start time of every top-level slot
    pub fn slot_starts(&self, start: Time, span: Time) -> Vec<Time> {
        let width = self.slot_width(span);
        (0..self.entries.len())
            .map(|i| start + width * i as i64)
            .collect()
    }

    /// Total number of events one expansion emits
    pub fn event_count(&self) -> usize {
        self.entries.iter().map(PatternEntry::event_count).sum()
    }

    /// Pitch names that need a resolver, in traversal order
    pub fn symbolic_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for entry in &self.entries {
            entry.collect_names(&mut names);
        }
        names
    }

    /// Resolve every pitch name up front, so later expansions cannot fail on names
    pub fn resolve_names<P: PitchResolver + ?Sized>(&self, resolver: &P) -> Result<Pattern> {
        Ok(Pattern {
            entries: self
                .entries
                .iter()
                .map(|e| e.resolve_names(resolver))
                .collect::<Result<_>>()?,
        })
    }

    /// Expand using scientific pitch names for symbolic entries
    pub fn expand<R: Rng + ?Sized>(
        &self,
        params: &ExpandParams,
        rng: &mut R,
    ) -> Result<Vec<ScheduledEvent>> {
        expand_entries(&self.entries, params, &NoteNameResolver, rng)
    }

    /// Expand with a custom pitch resolver
    pub fn expand_with<R, P>(
        &self,
        params: &ExpandParams,
        resolver: &P,
        rng: &mut R,
    ) -> Result<Vec<ScheduledEvent>>
    where
        R: Rng + ?Sized,
        P: PitchResolver + ?Sized,
    {
        expand_entries(&self.entries, params, resolver, rng)
    }

    /// Expand and hand every event to `sink`.
    ///
    /// Expansion completes before the first event is forwarded, so a failed
    /// expansion leaves the sink untouched. Returns the number of events sent.
    pub fn expand_into<R, P, S>(
        &self,
        params: &ExpandParams,
        resolver: &P,
        rng: &mut R,
        sink: &mut S,
    ) -> Result<usize>
    where
        R: Rng + ?Sized,
        P: PitchResolver + ?Sized,
        S: EventSink + ?Sized,
    {
        let events = self.expand_with(params, resolver, rng)?;
        let count = events.len();
        for event in events {
            sink.accept(event);
        }
        Ok(count)
    }

    /// Expand only the slot under `cursor`, stretched over the whole span.
    ///
    /// This is the per-trigger form: each call plays the next slot and
    /// returns the advanced cursor alongside the events.
    pub fn expand_step<R, P>(
        &self,
        cursor: SequenceCursor,
        params: &ExpandParams,
        resolver: &P,
        rng: &mut R,
    ) -> Result<(Vec<ScheduledEvent>, SequenceCursor)>
    where
        R: Rng + ?Sized,
        P: PitchResolver + ?Sized,
    {
        match cursor.advance(self.entries.len()) {
            (Some(index), next) => {
                let events = expand_entries(
                    std::slice::from_ref(&self.entries[index]),
                    params,
                    resolver,
                    rng,
                )?;
                Ok((events, next))
            }
            (None, next) => {
                params.validate()?;
                Ok((Vec::new(), next))
            }
        }
    }
}

impl FromStr for Pattern {
    type Err = crate::error::SequencerError;

    fn from_str(s: &str) -> Result<Self> {
        Pattern::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", entry)?;
        }
        write!(f, "\"")
    }
}
