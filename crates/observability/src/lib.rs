//! Tracing/logging setup shared by service wiring and test harnesses.

pub mod tracing;

pub use self::tracing::init;
