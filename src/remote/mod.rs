/*!
 * Remote session collaborators
 *
 * The agent talks to the game through three narrow seams:
 * - [`Transport`]: fetch a page as text
 * - [`ConnectivityGate`]: is the network up at all
 * - [`PageExtractor`]: pull identifiers and counters out of page markup
 */

pub mod extract;
pub mod http;
pub mod probe;

use crate::error::AgentError;
use thiserror::Error;

pub use extract::{MarkupExtractor, PageExtractor};
pub use http::HttpTransport;
pub use probe::{ConnectivityGate, HttpProbe};

/// Overview listing every village of the account
pub const OVERVIEW_PATH: &str = "game.php?screen=overview_villages";

/// Failure talking to the remote service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Network(String),

    /// The server answered with its login page instead of the game
    #[error("session expired")]
    SessionExpired,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<TransportError> for AgentError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::SessionExpired => AgentError::SessionExpired,
            other => AgentError::TransientNetwork(other.to_string()),
        }
    }
}

/// Fetches pages of the remote game relative to the session's endpoint
pub trait Transport: Send + Sync {
    fn get(&self, path: &str) -> Result<String, TransportError>;
}
