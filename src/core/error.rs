//! Error types for the tracking engine

use thiserror::Error;

/// Main error type for the engine
///
/// Nothing here is fatal to the host: invalid inputs are rejected at the
/// call site, probe failures degrade to skipping the affected entry, and
/// an invalid configuration falls back to safe defaults.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("world probe error: {0}")]
    Probe(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}
