//! Error taxonomy shared by the codec, the transport, and the command facade.
//!
//! Every failure a caller can observe is one of four kinds:
//!
//! | Variant            | Raised when                                           | Before I/O? |
//! |--------------------|-------------------------------------------------------|-------------|
//! | `Communication`    | connect / write / read fails or times out             | no          |
//! | `InvalidResponse`  | response bytes are malformed or semantically invalid  | no          |
//! | `InvalidPort`      | a port argument is outside `[1, num_ports]`           | yes         |
//! | `InvalidValue`     | an enumerated setting gets a value outside its set    | yes         |
//!
//! The core never turns one of these into a default value; the caller decides
//! how to recover.

use thiserror::Error;

use crate::protocol::codec::hex_dump;

/// Errors reported by every KVM operation.
#[derive(Debug, Error)]
pub enum KvmError {
    /// The TCP connection could not be opened, written, or read in time.
    #[error("communication failure: {message}")]
    Communication {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The device answered with bytes that do not form a valid response.
    #[error("invalid response: {reason} (raw: {})", hex_dump(.raw))]
    InvalidResponse { reason: String, raw: Vec<u8> },

    /// A port argument is out of range for the device.
    #[error("invalid port: {port}. Must be between 1 and {num_ports}")]
    InvalidPort { port: u8, num_ports: u8 },

    /// An enumerated setting was given a value outside its allowed set.
    #[error("invalid {setting}: {value}. Must be one of {allowed}")]
    InvalidValue {
        setting: &'static str,
        value: u32,
        allowed: &'static str,
    },
}

/// The tag of a [`KvmError`], for callers that only care which kind occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Communication,
    InvalidResponse,
    InvalidPort,
    InvalidValue,
}

impl KvmError {
    /// Builds a [`KvmError::Communication`] without an underlying I/O error.
    pub fn communication(message: impl Into<String>) -> Self {
        KvmError::Communication {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`KvmError::Communication`] wrapping an I/O error.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        KvmError::Communication {
            message: format!("{}: {source}", message.into()),
            source: Some(source),
        }
    }

    /// Builds a [`KvmError::InvalidResponse`] carrying the offending bytes.
    pub fn invalid_response(reason: impl Into<String>, raw: &[u8]) -> Self {
        KvmError::InvalidResponse {
            reason: reason.into(),
            raw: raw.to_vec(),
        }
    }

    /// Returns which of the four failure kinds this error is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvmError::Communication { .. } => ErrorKind::Communication,
            KvmError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            KvmError::InvalidPort { .. } => ErrorKind::InvalidPort,
            KvmError::InvalidValue { .. } => ErrorKind::InvalidValue,
        }
    }

    /// Returns `true` for failures that a read may be retried after.
    /// Argument-validation errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Communication | ErrorKind::InvalidResponse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_port_message_includes_value_and_range() {
        let err = KvmError::InvalidPort {
            port: 99,
            num_ports: 16,
        };
        let msg = err.to_string();
        assert!(msg.contains("99"), "got: {msg}");
        assert!(msg.contains("between 1 and 16"), "got: {msg}");
    }

    #[test]
    fn test_invalid_response_message_includes_raw_bytes_as_hex() {
        let err = KvmError::invalid_response("bad preamble", &[0xAB, 0xBB, 0x03]);
        assert_eq!(
            err.to_string(),
            "invalid response: bad preamble (raw: AB BB 03)"
        );
    }

    #[test]
    fn test_io_error_is_kept_as_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = KvmError::io("read failed", io);

        assert_eq!(err.kind(), ErrorKind::Communication);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_only_io_and_response_errors_are_retryable() {
        assert!(KvmError::communication("timeout").is_retryable());
        assert!(KvmError::invalid_response("short", &[]).is_retryable());
        assert!(!KvmError::InvalidPort {
            port: 0,
            num_ports: 8
        }
        .is_retryable());
        assert!(!KvmError::InvalidValue {
            setting: "LCD timeout",
            value: 15,
            allowed: "0, 10, 30",
        }
        .is_retryable());
    }
}
