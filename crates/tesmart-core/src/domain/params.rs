//! Connection parameters for a single KVM switch.
//!
//! [`ConnectionParams`] is built once (from explicit arguments, a config file,
//! or both) and then handed to a transport, which owns it for its lifetime.
//! Fields are private so a constructed value is always valid.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stock host address of a factory-reset TESmart switch.
pub const DEFAULT_HOST: &str = "10.1.99.1";
/// Stock TCP control port.
pub const DEFAULT_TCP_PORT: u16 = 5000;
/// Default socket timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default settling delay between commands.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Errors raised while building [`ConnectionParams`].
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("unsupported port count {0}: must be 8 or 16")]
    UnsupportedPortCount(u8),

    #[error("TCP port must be between 1 and 65535")]
    ZeroTcpPort,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid duration {value} for {field}: must be a finite, non-negative number of seconds")]
    InvalidDuration { field: &'static str, value: f64 },
}

/// Number of input ports on the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PortCount {
    Eight,
    Sixteen,
}

impl PortCount {
    /// Highest valid 1-indexed port number.
    pub fn max_port(self) -> u8 {
        match self {
            PortCount::Eight => 8,
            PortCount::Sixteen => 16,
        }
    }

    /// Returns `true` if `port` is in `[1, max_port]`.
    pub fn contains(self, port: u8) -> bool {
        (1..=self.max_port()).contains(&port)
    }
}

impl Default for PortCount {
    fn default() -> Self {
        PortCount::Sixteen
    }
}

impl TryFrom<u8> for PortCount {
    type Error = ParamsError;

    fn try_from(value: u8) -> Result<Self, ParamsError> {
        match value {
            8 => Ok(PortCount::Eight),
            16 => Ok(PortCount::Sixteen),
            other => Err(ParamsError::UnsupportedPortCount(other)),
        }
    }
}

impl From<PortCount> for u8 {
    fn from(count: PortCount) -> u8 {
        count.max_port()
    }
}

impl fmt::Display for PortCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.max_port())
    }
}

/// Everything needed to talk to one switch.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tesmart_core::{ConnectionParams, PortCount};
///
/// let params = ConnectionParams::new(
///     "192.168.1.10",
///     5000,
///     Duration::from_secs(2),
///     Duration::from_millis(500),
///     PortCount::Eight,
/// )
/// .unwrap();
/// assert_eq!(params.num_ports().max_port(), 8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    host: String,
    tcp_port: u16,
    timeout: Duration,
    delay: Duration,
    num_ports: PortCount,
}

impl ConnectionParams {
    /// Builds a validated parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::ZeroTcpPort`] for TCP port 0 and
    /// [`ParamsError::ZeroTimeout`] for a zero timeout.  A zero `delay` is
    /// allowed and disables the inter-command wait.
    pub fn new(
        host: impl Into<String>,
        tcp_port: u16,
        timeout: Duration,
        delay: Duration,
        num_ports: PortCount,
    ) -> Result<Self, ParamsError> {
        if tcp_port == 0 {
            return Err(ParamsError::ZeroTcpPort);
        }
        if timeout.is_zero() {
            return Err(ParamsError::ZeroTimeout);
        }
        Ok(Self {
            host: host.into(),
            tcp_port,
            timeout,
            delay,
            num_ports,
        })
    }

    /// Converts a seconds value from a config file or flag into a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::InvalidDuration`] for negative, NaN, or infinite
    /// input.
    pub fn duration_from_secs(field: &'static str, secs: f64) -> Result<Duration, ParamsError> {
        Duration::try_from_secs_f64(secs)
            .map_err(|_| ParamsError::InvalidDuration { field, value: secs })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    /// Per-operation socket timeout (connect, write, and read each get this).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Minimum time between the end of one write and the start of the next.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn num_ports(&self) -> PortCount {
        self.num_ports
    }

    /// `host:port` string for logging and connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            tcp_port: DEFAULT_TCP_PORT,
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
            num_ports: PortCount::default(),
        }
    }
}
