/*!
 * Error types for Outpost
 */

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum AgentError {
    /// No configuration document and no way to create one
    #[error("No configuration found at {} and no interactive setup is possible", .0.display())]
    MissingConfig(PathBuf),

    /// The configuration document exists but cannot be parsed
    #[error("Configuration file {} is not valid: {reason}", .path.display())]
    CorruptConfig { path: PathBuf, reason: String },

    /// Remote service unreachable or timed out
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// Writing the configuration (or its backup) failed
    #[error("Failed to persist configuration: {0}")]
    PersistFailure(String),

    /// A single village failed during its run
    #[error("Village {id} failed: {reason}")]
    EntityDispatch { id: String, reason: String },

    /// The remote session is gone; nothing else in the cycle can succeed
    #[error("Remote session expired, log in again and refresh the session cookie")]
    SessionExpired,

    /// First-run setup was aborted or failed
    #[error("Setup aborted: {0}")]
    Bootstrap(String),

    /// Runtime settings file or flags are invalid
    #[error("Settings error: {0}")]
    Settings(String),

    /// The supervisor gave up after repeated crashes
    #[error("Gave up after {attempts} crashed runs")]
    RestartBudgetExhausted { attempts: u32 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AgentError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentError::MissingConfig(_)
            | AgentError::CorruptConfig { .. }
            | AgentError::Bootstrap(_)
            | AgentError::Settings(_)
            | AgentError::RestartBudgetExhausted { .. } => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Fatal errors end the process without consuming the restart budget
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::MissingConfig(_)
                | AgentError::CorruptConfig { .. }
                | AgentError::Bootstrap(_)
                | AgentError::Settings(_)
                | AgentError::RestartBudgetExhausted { .. }
        )
    }

    /// Transient errors are handled by waiting and trying again next cycle
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::TransientNetwork(_) => true,
            AgentError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Errors from one village that must stop the whole cycle
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, AgentError::SessionExpired)
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            AgentError::MissingConfig(_)
            | AgentError::CorruptConfig { .. }
            | AgentError::Settings(_) => ErrorCategory::Configuration,
            AgentError::TransientNetwork(_) => ErrorCategory::Network,
            AgentError::PersistFailure(_) | AgentError::Io(_) => ErrorCategory::Storage,
            AgentError::EntityDispatch { .. } => ErrorCategory::Dispatch,
            AgentError::SessionExpired => ErrorCategory::Session,
            AgentError::Bootstrap(_) => ErrorCategory::Setup,
            AgentError::RestartBudgetExhausted { .. } => ErrorCategory::Supervisor,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Dispatch,
    Session,
    Setup,
    Supervisor,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Network => "network",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Dispatch => "dispatch",
            ErrorCategory::Session => "session",
            ErrorCategory::Setup => "setup",
            ErrorCategory::Supervisor => "supervisor",
        };
        f.write_str(name)
    }
}
