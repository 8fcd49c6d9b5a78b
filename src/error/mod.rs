//! Error type definitions for the fair-share scheduling core.
//!
//! Mirrors the layered `thiserror` hierarchy used across this codebase:
//! one enum per subsystem, so callers can match on the failure kind
//! without string-sniffing. Each subsystem returns its own error type
//! directly rather than a top-level union, since no caller in this
//! crate needs to handle more than one subsystem's failures at once.

use thiserror::Error;

/// Policy server specific errors.
///
/// `next_job` is total and never fails; this type exists for
/// programmer-contract violations (duplicate job id) rather than for
/// expected runtime conditions.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// `new_job` was called with an id already present in the registry.
    #[error("duplicate job id: {id}")]
    DuplicateJob { id: String },

    /// The actor's message channel was dropped; the server has shut down.
    #[error("policy server is no longer running")]
    ServerGone,
}

/// Fairness controller specific errors.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Failed to obtain a registry snapshot from the policy server for
    /// this tick; per spec, this terminates the tick, not the loop.
    #[error("failed to snapshot registry: {0}")]
    SnapshotFailed(String),

    /// `alpha` read from configuration was outside `(0, 1]`.
    #[error("invalid alpha {value}: must be in (0, 1]")]
    InvalidAlpha { value: f64 },
}

/// Configuration loading/parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize default configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
