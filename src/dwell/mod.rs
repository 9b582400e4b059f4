pub mod accumulator;
pub mod clock;
pub mod controller;
pub mod engine;
pub mod state;
pub mod store;

pub use accumulator::{DwellAccumulator, Flush, FlushReason};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use controller::DwellController;
pub use engine::{DwellEngine, EngineMsg, EngineStats};
pub use state::{EntryStatus, TrackingEntry};
pub use store::DwellStore;
