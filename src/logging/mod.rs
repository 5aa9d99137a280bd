//! Structured logging and payload output.

mod format;

pub use format::{ErrorPayload, StructuredLogger};
