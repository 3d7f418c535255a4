//! Shared error types for the container resource detection subsystem.

pub mod error;

pub use error::{Error, ErrorCategory, Result, StructuredError, SuggestedAction};
