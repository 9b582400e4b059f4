pub mod element;
pub mod event;
pub mod session;

pub use element::ElementId;
pub use event::{DwellEvent, DwellPayload, FocusKind};
pub use session::Session;
