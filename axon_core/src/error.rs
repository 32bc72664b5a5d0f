//! Error types for the AXON IPC substrate.
//!
//! Only resource acquisition and payload interpretation can fail with an
//! error value. Runtime exchange operations (commit, fetch) never do: a
//! timed fetch that misses its budget reports `false`, which callers treat
//! as a missed deadline and count, not as a fault.

use thiserror::Error;

/// Result alias used throughout AXON.
pub type AxonResult<T> = Result<T, AxonError>;

#[derive(Error, Debug)]
pub enum AxonError {
    /// Creating, sizing, or mapping the OS shared-memory object failed.
    /// Fatal to the creator; surfaced at construction, never retried here.
    #[error("Shared memory allocation failed: {0}")]
    Allocation(String),

    /// An attacher found no segment under the given name. The producer is
    /// missing or has not started yet.
    #[error("Shared memory not found: {0}")]
    NotFound(String),

    /// A fetched frame carries a version tag the consumer was not built
    /// against. The two processes are running incompatible builds.
    #[error("Payload version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },

    /// Packing or unpacking a serialized envelope failed.
    #[error("Envelope encoding error: {0}")]
    Encoding(String),

    /// Configuration parse or validation failure.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AxonError {
    pub fn allocation(msg: impl Into<String>) -> Self {
        AxonError::Allocation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AxonError::NotFound(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        AxonError::Encoding(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AxonError::Config(msg.into())
    }
}
