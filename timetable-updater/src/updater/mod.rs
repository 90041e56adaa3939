//! Feed update loop.
//!
//! Polls a message source, applies each batch to a private buffer and
//! publishes the result through the shared snapshot source.

mod config;
mod engine;
mod error;
mod source;

pub use config::UpdaterConfig;
pub use engine::{TimetableUpdater, UpdateSummary, apply_batch};
pub use error::UpdaterError;
pub use source::{ReplaySource, UpdateSource};
