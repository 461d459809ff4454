//! Binary codec for TESmart command and response frames.
//!
//! Wire format:
//! ```text
//! command:  [AA][BB][03][token:1][value:1][EE]
//! response: [AA][BB][03][  11   ][value:1][EE]
//! ```
//! Both frames are exactly 6 bytes.  There are no length fields, checksums, or
//! request identifiers, so the only integrity check available is comparing the
//! fixed bytes against their expected values.

use std::fmt::Write as _;

use tracing::trace;

use crate::error::KvmError;
use crate::protocol::messages::{
    Command, COMMAND_FRAME_LEN, PREAMBLE, RESPONSE_FRAME_LEN, RESPONSE_MARKER, TERMINATOR,
};

/// A fully encoded six-byte command, ready to be written to the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; COMMAND_FRAME_LEN]);

impl CommandFrame {
    /// Encodes `command` into its wire frame.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tesmart_core::{Command, CommandFrame};
    ///
    /// let frame = CommandFrame::encode(&Command::SetPort(5));
    /// assert_eq!(frame.as_bytes(), &[0xAA, 0xBB, 0x03, 0x01, 0x05, 0xEE]);
    /// ```
    pub fn encode(command: &Command) -> Self {
        let [p0, p1, p2] = PREAMBLE;
        CommandFrame([
            p0,
            p1,
            p2,
            command.token() as u8,
            command.value(),
            TERMINATOR,
        ])
    }

    /// Returns the raw frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the token byte at offset 3.
    pub fn token(&self) -> u8 {
        self.0[3]
    }

    /// Returns the value byte at offset 4.
    pub fn value(&self) -> u8 {
        self.0[4]
    }
}

impl From<&Command> for CommandFrame {
    fn from(command: &Command) -> Self {
        CommandFrame::encode(command)
    }
}

/// Validates a response frame and returns its value byte.
///
/// The checks run in wire order: length, preamble, response marker,
/// terminator.  The value byte is only read once all of them pass.
///
/// # Errors
///
/// Returns [`KvmError::InvalidResponse`] carrying the raw bytes if any check
/// fails.
///
/// # Examples
///
/// ```rust
/// use tesmart_core::decode_response;
///
/// let value = decode_response(&[0xAA, 0xBB, 0x03, 0x11, 0x07, 0xEE]).unwrap();
/// assert_eq!(value, 7);
/// ```
pub fn decode_response(bytes: &[u8]) -> Result<u8, KvmError> {
    if bytes.len() != RESPONSE_FRAME_LEN {
        return Err(KvmError::invalid_response(
            format!(
                "expected {RESPONSE_FRAME_LEN} bytes, got {}",
                bytes.len()
            ),
            bytes,
        ));
    }

    if bytes[0..3] != PREAMBLE {
        return Err(KvmError::invalid_response(
            format!("bad preamble, expected {}", hex_dump(&PREAMBLE)),
            bytes,
        ));
    }

    if bytes[3] != RESPONSE_MARKER {
        return Err(KvmError::invalid_response(
            format!(
                "bad response marker 0x{:02X}, expected 0x{RESPONSE_MARKER:02X}",
                bytes[3]
            ),
            bytes,
        ));
    }

    let last = bytes[RESPONSE_FRAME_LEN - 1];
    if last != TERMINATOR {
        return Err(KvmError::invalid_response(
            format!("bad terminator 0x{last:02X}, expected 0x{TERMINATOR:02X}"),
            bytes,
        ));
    }

    trace!("decoded response value 0x{:02X}", bytes[4]);
    Ok(bytes[4])
}

/// Formats bytes as space-separated upper-case hex, e.g. `AA BB 03`.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{b:02X}");
    }
    out
}
