//! Error types for the simulator.
//!
//! Only *fatal* conditions are modeled as `Result`/`SimError` values that
//! propagate out of `main`: missing or malformed configuration, a missing
//! model, and I/O failures while loading them. Everything else the design
//! calls a "warning" (sync loss, continuity mismatches, PCR jumps, PTS
//! collisions, stutter, ...) is logged in place via `log::warn!` at the
//! reporting module and handled with local recovery; per the propagation
//! policy, no error crosses a channel boundary.

use thiserror::Error;

/// Primary error type for the simulator.
#[derive(Error, Debug)]
pub enum SimError {
    /// `<dir>/config.json` does not exist or could not be opened.
    #[error("[{module}] no configuration file found in directory")]
    ConfigMissing {
        /// Module identifier used in the original's diagnostic messages.
        module: String,
    },

    /// A required configuration key is missing or has the wrong JSON type.
    #[error("[{module}] malformed configuration: {detail}")]
    ConfigMalformed {
        /// Module identifier the configuration section belongs to.
        module: String,
        /// Description of what was missing or mistyped.
        detail: String,
    },

    /// `mainModel` named a model this binary does not implement.
    #[error("[{module}] model not found: \"{model}\"")]
    ModelNotFound {
        /// Module identifier reporting the failure.
        module: String,
        /// The unrecognised model name.
        model: String,
    },

    /// Underlying I/O failure (reading config, TS file, aux file, or writing a trace).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `config.json` is not valid JSON.
    #[error("invalid json in configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
