//! Caller-held position for trigger-driven stepping through a pattern.

/// Which slot the next trigger plays.
///
/// The cursor is a value: advancing returns the slot index for this trigger
/// together with the cursor to keep for the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceCursor {
    position: usize,
}

impl SequenceCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit position (e.g. a transport step index)
    pub fn at(position: usize) -> Self {
        Self { position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Slot index for a pattern of `len` slots, and the cursor after it.
    /// Returns `None` for an empty pattern, leaving the cursor unchanged.
    pub fn advance(self, len: usize) -> (Option<usize>, SequenceCursor) {
        if len == 0 {
            return (None, self);
        }
        let index = self.position % len;
        (
            Some(index),
            SequenceCursor {
                position: self.position.wrapping_add(1),
            },
        )
    }
}
