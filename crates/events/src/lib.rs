//! Domain events: the append-only facts every aggregate emits, plus the
//! projection fold used to derive read models from them.

pub mod event;
pub mod projection;

pub use event::Event;
pub use projection::{project, Projection};
