//! Error types for the spanning tree engine.
//!
//! Three families of failure exist and none of them is fatal to the
//! engine:
//!
//! - [`BpduError`]: a received frame failed validation and was dropped
//!   before touching any port state.
//! - [`RstpError`]: an administrative request was refused, leaving the
//!   previous value in place.
//! - [`TransmitError`]: the adapter could not accept an outgoing BPDU.
//!   The periodic transmit pass sends again later.

use thiserror::Error;

/// Result type alias for engine operations.
pub type RstpResult<T> = Result<T, RstpError>;

/// Reasons a received frame is not accepted as a BPDU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BpduError {
    /// Frame or payload ends before the data its header promises.
    #[error("BPDU truncated: {len} bytes, need at least {min}")]
    Truncated {
        /// Bytes available.
        len: usize,
        /// Bytes required.
        min: usize,
    },

    /// The 802.3 length field carries an EtherType instead of a length.
    #[error("Not an 802.3 LLC frame (length/type field 0x{0:04x})")]
    NotLlc(u16),

    /// LLC header is not the spanning tree SAP.
    #[error("Unexpected LLC header {dsap:#04x}/{ssap:#04x}/{control:#04x}")]
    BadLlc {
        /// Destination service access point.
        dsap: u8,
        /// Source service access point.
        ssap: u8,
        /// Control byte.
        control: u8,
    },

    /// Protocol identifier is not the spanning tree protocol.
    #[error("Unknown protocol identifier 0x{0:04x}")]
    BadProtocolId(u16),

    /// BPDU type byte is not Config, RSTP or TCN.
    #[error("Unknown BPDU type 0x{0:02x}")]
    UnknownType(u8),

    /// RST BPDU carrying a protocol version below 2.
    #[error("RST BPDU with protocol version {0}")]
    BadRstpVersion(u8),

    /// Message age has already reached the advertised maximum.
    #[error("BPDU expired: message age {message_age}s, max age {max_age}s")]
    Expired {
        /// Received message age in seconds.
        message_age: u16,
        /// Received max age in seconds.
        max_age: u16,
    },
}

/// Errors returned by bridge administration and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RstpError {
    /// Configuration value outside the range the protocol allows.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Port index beyond the bridge's port count.
    #[error("Port {0} does not exist")]
    PortNotFound(usize),

    /// Frame offered while spanning tree is disabled; it was dropped.
    #[error("Spanning tree is disabled")]
    Disabled,

    /// Frame offered on a port that does not take part in the protocol.
    #[error("Port {0} does not run spanning tree")]
    PortExcluded(usize),

    /// Received frame rejected by the codec.
    #[error("Malformed BPDU: {0}")]
    Bpdu(#[from] BpduError),
}

impl RstpError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors reported by [`SwitchOps::transmit`](crate::SwitchOps::transmit).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransmitError {
    /// Transmit path is congested; the frame was not queued.
    #[error("Transmit queue busy on port {port}")]
    Busy {
        /// Egress port index.
        port: usize,
    },

    /// Transmit path is gone (shutdown or detached device).
    #[error("Transmit path closed")]
    Closed,

    /// Other adapter failure.
    #[error("Transmit failed: {0}")]
    Failed(String),
}

/// Errors parsing identifiers from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Invalid MAC address text.
    #[error("Invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    /// Invalid bridge identifier text (`pppp.xxxxxxxxxxxx`).
    #[error("Invalid bridge identifier: {0}")]
    InvalidBridgeId(String),

    /// Unknown enumeration value.
    #[error("Invalid {kind} value: {value}")]
    InvalidValue {
        /// Name of the enumeration.
        kind: &'static str,
        /// Offending text.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = RstpError::invalid_config("max_age", "must be between 6 and 40");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for max_age: must be between 6 and 40"
        );
    }

    #[test]
    fn test_bpdu_error_converts() {
        let err: RstpError = BpduError::UnknownType(0x55).into();
        assert!(matches!(err, RstpError::Bpdu(BpduError::UnknownType(0x55))));
        assert_eq!(err.to_string(), "Malformed BPDU: Unknown BPDU type 0x55");
    }
}
