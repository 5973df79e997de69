//! Shared utilities: clock access and the tracing bootstrap.

pub mod clock;
pub mod telemetry;

pub use clock::*;
pub use telemetry::*;
