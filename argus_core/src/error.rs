//! Unified error handling for ARGUS
//!
//! This module provides a centralized error type for the entire ARGUS core,
//! ensuring consistent error handling across all components.

use thiserror::Error;

/// Main error type for ARGUS operations
#[derive(Debug, Error)]
pub enum ArgusError {
    /// An arena could not satisfy an allocation request.
    ///
    /// Fatal to the requesting operation, never to the process. The message
    /// that triggered it is undelivered; retry policy belongs to the caller.
    #[error("allocation failure in arena '{arena}': {message}")]
    AllocationFailure { arena: String, message: String },

    /// A topic or node name is already in use where uniqueness is required.
    /// Returned immediately, with no state mutated.
    #[error("duplicate name: '{0}'")]
    DuplicateName(String),

    /// A topic or node name does not exist (or exists with another type).
    #[error("not found: {0}")]
    NotFound(String),

    /// A sensor `control` request not reachable from the current state.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The topic or node has begun or completed teardown.
    #[error("closed: {0}")]
    Closed(String),

    /// A bounded-wait blocking read exceeded its deadline.
    /// Distinct from [`ArgusError::Closed`] — the topic is still live.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Configuration validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Sensor driver errors surfaced through the capability contract
    #[error("sensor '{sensor}' error: {message}")]
    Sensor { sensor: String, message: String },

    /// Internal errors with source location for debugging.
    /// Use the `argus_internal!()` macro to create these — it captures
    /// file/line automatically.
    #[error("internal error: {message} (at {file}:{line})")]
    Internal {
        message: String,
        file: &'static str,
        line: u32,
    },
}

/// Create an internal error with automatic file/line capture.
///
/// ```rust,ignore
/// use argus_core::argus_internal;
/// return Err(argus_internal!("unexpected state: {:?}", state));
/// ```
#[macro_export]
macro_rules! argus_internal {
    ($($arg:tt)*) => {
        $crate::error::ArgusError::Internal {
            message: format!($($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Convenience type alias for Results using ArgusError
pub type ArgusResult<T> = std::result::Result<T, ArgusError>;

/// Short alias — `Result<T>` is equivalent to `ArgusResult<T>`
pub type Result<T> = ArgusResult<T>;

// Helper methods
impl ArgusError {
    /// Create an allocation failure for the named arena
    pub fn allocation<S: Into<String>, T: Into<String>>(arena: S, message: T) -> Self {
        ArgusError::AllocationFailure {
            arena: arena.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate-name error
    pub fn duplicate<S: Into<String>>(name: S) -> Self {
        ArgusError::DuplicateName(name.into())
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ArgusError::NotFound(msg.into())
    }

    /// Create a closed error naming the torn-down resource
    pub fn closed<S: Into<String>>(what: S) -> Self {
        ArgusError::Closed(what.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        ArgusError::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ArgusError::Config(msg.into())
    }

    /// Create a sensor error with sensor name and message
    pub fn sensor<S: Into<String>, T: Into<String>>(sensor: S, message: T) -> Self {
        ArgusError::Sensor {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Whether a node run loop should stop on this error rather than
    /// continue ticking. Arena exhaustion leaves the node unable to make
    /// progress; everything else is treated as transient.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArgusError::AllocationFailure { .. })
    }
}
