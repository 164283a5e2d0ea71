//! # Engine Error Types
//!
//! Errors raised while configuring, loading or shutting down the engine.
//!
//! Queries never produce these: a malformed query answers with its safe
//! default (`false`, an empty set, `CompatibilityResult::Invalid`).

use thiserror::Error;

/// Errors that can occur while setting up or running the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A TOML configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// A configuration file could not be read.
    #[error("failed to read configuration file {path}: {reason}")]
    ConfigIo {
        /// Path that was read.
        path: String,
        /// Underlying IO failure.
        reason: String,
    },

    /// A bulk catalog load failed and was rolled back.
    #[error("rule registration failed and was rolled back: {reason}")]
    RegistrationFailed {
        /// Reason reported by the loader.
        reason: String,
    },

    /// The rule graph already holds a completed bulk load.
    #[error("conflict graph is already initialized")]
    AlreadyInitialized,

    /// The background maintenance thread could not be started.
    #[error("failed to start maintenance task: {0}")]
    MaintenanceSpawn(String),
}

/// Result type for engine setup operations.
pub type EngineResult<T> = Result<T, EngineError>;
