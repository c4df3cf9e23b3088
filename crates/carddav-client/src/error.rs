//! Error types for carddav-client

use thiserror::Error;

/// carddav-client error type
#[derive(Error, Debug)]
pub enum CardDavError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Protocol error: server returned status {status}: {message}")]
    Protocol { status: u16, message: String },

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Resource id generation exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl CardDavError {
    /// True for connection-level failures (DNS, TLS, refused, timeout),
    /// as opposed to protocol outcomes the server actually produced.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CardDavError>;
