//! Port numbers and the result of a port switch.

use crate::domain::params::PortCount;
use crate::error::KvmError;

/// Outcome of a set-port operation.
///
/// `changed == false` means the switch was already on the requested port and
/// no set command was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSwitch {
    pub old_port: u8,
    pub new_port: u8,
    pub changed: bool,
}

impl PortSwitch {
    /// The switch was already on `port`.
    pub fn unchanged(port: u8) -> Self {
        Self {
            old_port: port,
            new_port: port,
            changed: false,
        }
    }

    /// The switch moved from `old_port` to `new_port`.
    pub fn switched(old_port: u8, new_port: u8) -> Self {
        Self {
            old_port,
            new_port,
            changed: true,
        }
    }
}

/// Checks that `port` is a valid 1-indexed port for a device with `count` ports.
///
/// # Errors
///
/// Returns [`KvmError::InvalidPort`] naming the requested port and the valid
/// range.
pub fn validate_port(port: u8, count: PortCount) -> Result<u8, KvmError> {
    if count.contains(port) {
        Ok(port)
    } else {
        Err(KvmError::InvalidPort {
            port,
            num_ports: count.max_port(),
        })
    }
}
