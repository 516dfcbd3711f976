//! Error types for rstpd

use sonic_rstp::RstpError;
use thiserror::Error;

/// Spanning tree daemon errors
#[derive(Error, Debug)]
pub enum RstpdError {
    /// Configuration file could not be read, parsed or validated
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected by the protocol engine
    #[error("Engine error: {0}")]
    Engine(#[from] RstpError),

    /// The service has been shut down
    #[error("Service is shut down")]
    ShutDown,
}

/// Result type for rstpd operations
pub type Result<T> = std::result::Result<T, RstpdError>;
