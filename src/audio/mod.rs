pub mod clock;
pub mod dispatcher;
pub mod midi;

pub use clock::{ClockTick, MasterClock};
pub use dispatcher::{DispatcherHandle, EventDispatcher, TimeUnit, TransportSink};
pub use midi::{MidiChannelMode, MidiOutputHandle, NoteOutput};
