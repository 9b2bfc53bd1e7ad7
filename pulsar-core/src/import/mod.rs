//! Performance import: recorded note on/off streams into duration-bearing notes
//!
//! Each track is paired independently with its own clock. The result can be
//! replayed through an [`EventSink`](crate::sink::EventSink) or written into
//! [`Timeline`](crate::sink::Timeline)s such as the in-memory [`NoteCanvas`].

mod importer;
mod timeline;

pub use importer::{
    import, import_tracks, ImportedNote, PerformanceEvent, PerformanceKind, TrackImport,
};
pub use timeline::{materialize, render, NoteCanvas};
