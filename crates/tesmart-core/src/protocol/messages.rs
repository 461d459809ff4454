//! The TESmart command table.
//!
//! Each device capability is addressed by a single token byte.  The value byte
//! that follows it is interpreted per token:
//!
//! | Operation        | Token  | Value                                   |
//! |------------------|--------|-----------------------------------------|
//! | Set active port  | `0x01` | port number, 1-indexed (`0x01`–`0x10`)  |
//! | Get active port  | `0x10` | `0x00` placeholder                      |
//! | Set buzzer       | `0x02` | `0x00` off / `0x01` on                  |
//! | Set LCD timeout  | `0x03` | `0x00` / `0x0A` / `0x1E` (0 / 10 / 30 s)|
//! | Set auto-detect  | `0x81` | `0x00` off / `0x01` on                  |

use crate::error::KvmError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Leading bytes of every command and response frame.
pub const PREAMBLE: [u8; 3] = [0xAA, 0xBB, 0x03];

/// Trailing byte of every command and response frame.
pub const TERMINATOR: u8 = 0xEE;

/// Byte at offset 3 of every response frame.
pub const RESPONSE_MARKER: u8 = 0x11;

/// Size of a command frame in bytes.
pub const COMMAND_FRAME_LEN: usize = 6;

/// Size of a response frame in bytes.
pub const RESPONSE_FRAME_LEN: usize = 6;

// ── Tokens ────────────────────────────────────────────────────────────────────

/// Token byte identifying which capability a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandToken {
    SetPort = 0x01,
    SetBuzzer = 0x02,
    SetLcdTimeout = 0x03,
    GetPort = 0x10,
    SetAutoDetect = 0x81,
}

impl CommandToken {
    /// Looks up the token for a wire byte.  Returns `None` for bytes the
    /// device does not define.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandToken::SetPort),
            0x02 => Some(CommandToken::SetBuzzer),
            0x03 => Some(CommandToken::SetLcdTimeout),
            0x10 => Some(CommandToken::GetPort),
            0x81 => Some(CommandToken::SetAutoDetect),
            _ => None,
        }
    }
}

// ── LCD timeout ───────────────────────────────────────────────────────────────

/// The three LCD backlight timeouts the device accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdTimeout {
    /// Backlight never turns off.
    Off,
    TenSeconds,
    ThirtySeconds,
}

impl LcdTimeout {
    /// Allowed timeouts in seconds, as shown in error messages.
    pub const ALLOWED: &'static str = "0, 10, 30";

    /// Timeout in seconds.
    pub fn seconds(self) -> u32 {
        match self {
            LcdTimeout::Off => 0,
            LcdTimeout::TenSeconds => 10,
            LcdTimeout::ThirtySeconds => 30,
        }
    }

    /// Wire value byte.
    pub fn wire_value(self) -> u8 {
        match self {
            LcdTimeout::Off => 0x00,
            LcdTimeout::TenSeconds => 0x0A,
            LcdTimeout::ThirtySeconds => 0x1E,
        }
    }
}

impl TryFrom<u32> for LcdTimeout {
    type Error = KvmError;

    fn try_from(seconds: u32) -> Result<Self, KvmError> {
        match seconds {
            0 => Ok(LcdTimeout::Off),
            10 => Ok(LcdTimeout::TenSeconds),
            30 => Ok(LcdTimeout::ThirtySeconds),
            other => Err(KvmError::InvalidValue {
                setting: "LCD timeout",
                value: other,
                allowed: LcdTimeout::ALLOWED,
            }),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// A logical device command, before it is framed for the wire.
///
/// Port arguments are expected to be range-checked by the caller against the
/// device's [`crate::PortCount`]; this type only maps values to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetPort(u8),
    GetPort,
    SetBuzzer(bool),
    SetLcdTimeout(LcdTimeout),
    SetAutoDetect(bool),
}

impl Command {
    /// Returns the token byte for this command.
    pub fn token(&self) -> CommandToken {
        match self {
            Command::SetPort(_) => CommandToken::SetPort,
            Command::GetPort => CommandToken::GetPort,
            Command::SetBuzzer(_) => CommandToken::SetBuzzer,
            Command::SetLcdTimeout(_) => CommandToken::SetLcdTimeout,
            Command::SetAutoDetect(_) => CommandToken::SetAutoDetect,
        }
    }

    /// Returns the value byte for this command.
    pub fn value(&self) -> u8 {
        match *self {
            Command::SetPort(port) => port,
            Command::GetPort => 0x00,
            Command::SetBuzzer(enabled) | Command::SetAutoDetect(enabled) => enabled as u8,
            Command::SetLcdTimeout(timeout) => timeout.wire_value(),
        }
    }

    /// Length of the response the device sends back for this command.
    pub fn response_len(&self) -> usize {
        RESPONSE_FRAME_LEN
    }

    /// Returns `true` if the device echoes the written value in its response.
    ///
    /// Only get-port answers with different data (the current port).
    pub fn expects_echo(&self) -> bool {
        !matches!(self, Command::GetPort)
    }
}
