//! KvmController: one method per device capability.
//!
//! The controller is the only place that knows which operations are safe to
//! repeat.  It validates arguments before touching the transport, frames each
//! [`Command`], checks the reply byte-for-byte, and maps everything that goes
//! wrong onto [`KvmError`].
//!
//! # Retry policy
//!
//! | Operation          | Attempts                      |
//! |--------------------|-------------------------------|
//! | `get_port`         | up to `retries` (default 3)   |
//! | `set_port` (read)  | 1                             |
//! | every write        | 1                             |
//!
//! Writes are never repeated: a set command that reached the device but lost
//! its echo would be applied twice.
//!
//! # Serialization
//!
//! The protocol has no request identifiers, so only one command may be in
//! flight per connection.  The transport sits behind a `tokio::sync::Mutex`
//! and every operation holds the lock for its whole exchange.  `set_port`
//! holds it across its read and its write, so no other caller can slip a
//! command in between.
//!
//! # Cancellation
//!
//! Dropping an operation's future abandons it.  Transports must then discard
//! the connection, since the device may still send the abandoned reply; the
//! next command opens a fresh one.

use async_trait::async_trait;
use tesmart_core::{
    decode_response, hex_dump, validate_port, Command, CommandFrame, KvmError, LcdTimeout,
    PortCount, PortSwitch,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Number of attempts `get_port` makes when the caller has no preference.
pub const DEFAULT_GET_PORT_RETRIES: u32 = 3;

/// A request/response byte channel to one switch.
///
/// Implementations own the connection lifecycle and the inter-command delay.
/// They never retry; that decision belongs to [`KvmController`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvmTransport: Send {
    /// Opens the connection.  Does nothing if it is already open.
    async fn open(&mut self) -> Result<(), KvmError>;

    /// Writes `frame` and reads exactly `expected_len` bytes back.
    ///
    /// Opens the connection first if needed.
    async fn send_and_receive(
        &mut self,
        frame: &CommandFrame,
        expected_len: usize,
    ) -> Result<Vec<u8>, KvmError>;

    /// Releases the connection.  Safe to call when not open.
    async fn close(&mut self);

    /// Returns `true` while a connection is held.
    fn is_open(&self) -> bool;
}

/// The command facade for a single KVM switch.
///
/// Cheap to share behind an `Arc`: every method takes `&self`.
pub struct KvmController<T: KvmTransport> {
    num_ports: PortCount,
    transport: Mutex<T>,
}

impl<T: KvmTransport> KvmController<T> {
    /// Wraps `transport`.  No connection is opened until the first command.
    pub fn new(transport: T, num_ports: PortCount) -> Self {
        Self {
            num_ports,
            transport: Mutex::new(transport),
        }
    }

    /// Wraps `transport` and opens the connection immediately.
    ///
    /// The connection is released when the controller is dropped or
    /// [`close`](Self::close) is called.
    ///
    /// # Errors
    ///
    /// Returns [`KvmError::Communication`] if the connection cannot be opened.
    pub async fn connect(mut transport: T, num_ports: PortCount) -> Result<Self, KvmError> {
        transport.open().await?;
        Ok(Self::new(transport, num_ports))
    }

    /// Releases the connection.  The next command reopens it.
    pub async fn close(&self) {
        self.transport.lock().await.close().await;
    }

    /// Returns `true` while the transport holds an open connection.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_open()
    }

    /// Port count of the device this controller targets.
    pub fn num_ports(&self) -> PortCount {
        self.num_ports
    }

    /// The transport, for transport-specific accessors.
    pub(crate) fn transport(&self) -> &Mutex<T> {
        &self.transport
    }

    /// Reads the active port, retrying up to `retries` attempts in total.
    ///
    /// A `retries` of 0 is treated as 1.
    ///
    /// # Errors
    ///
    /// Returns the error from the last attempt: [`KvmError::Communication`]
    /// for transport failures, [`KvmError::InvalidResponse`] for malformed
    /// frames or a port outside `[1, num_ports]`.
    pub async fn get_port(&self, retries: u32) -> Result<u8, KvmError> {
        let attempts = retries.max(1);
        let mut transport = self.transport.lock().await;

        let mut attempt = 1;
        loop {
            match read_port_once(&mut *transport, self.num_ports).await {
                Ok(port) => {
                    debug!("active port is {port} (attempt {attempt}/{attempts})");
                    return Ok(port);
                }
                Err(e) if attempt < attempts && e.is_retryable() => {
                    warn!("get port attempt {attempt}/{attempts} failed: {e}");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Switches the active input to `port`.
    ///
    /// Reads the current port first (one attempt).  If the switch is already
    /// there, nothing is written and the result has `changed == false`.
    ///
    /// # Errors
    ///
    /// - [`KvmError::InvalidPort`] if `port` is outside `[1, num_ports]`;
    ///   raised before any I/O.
    /// - [`KvmError::Communication`] if the read or the write fails.
    /// - [`KvmError::InvalidResponse`] if a reply is malformed or the echo
    ///   names a different port.
    pub async fn set_port(&self, port: u8) -> Result<PortSwitch, KvmError> {
        let port = validate_port(port, self.num_ports)?;
        let mut transport = self.transport.lock().await;

        let current = read_port_once(&mut *transport, self.num_ports).await?;
        if current == port {
            info!("already on port {port}; not switching");
            return Ok(PortSwitch::unchanged(port));
        }

        write_setting(&mut *transport, Command::SetPort(port)).await?;
        info!("switched from port {current} to port {port}");
        Ok(PortSwitch::switched(current, port))
    }

    /// Turns the front-panel buzzer on or off.
    ///
    /// # Errors
    ///
    /// [`KvmError::Communication`] or [`KvmError::InvalidResponse`]; never
    /// retried.
    pub async fn set_buzzer(&self, enabled: bool) -> Result<(), KvmError> {
        let mut transport = self.transport.lock().await;
        write_setting(&mut *transport, Command::SetBuzzer(enabled)).await?;
        info!("buzzer {}", on_off(enabled));
        Ok(())
    }

    /// Sets the LCD backlight timeout in seconds.
    ///
    /// # Errors
    ///
    /// - [`KvmError::InvalidValue`] unless `seconds` is 0, 10, or 30; raised
    ///   before any I/O.
    /// - [`KvmError::Communication`] or [`KvmError::InvalidResponse`]; never
    ///   retried.
    pub async fn set_lcd_timeout(&self, seconds: u32) -> Result<(), KvmError> {
        let timeout = LcdTimeout::try_from(seconds)?;
        let mut transport = self.transport.lock().await;
        write_setting(&mut *transport, Command::SetLcdTimeout(timeout)).await?;
        info!("LCD timeout set to {seconds}s");
        Ok(())
    }

    /// Turns automatic input detection on or off.
    ///
    /// # Errors
    ///
    /// [`KvmError::Communication`] or [`KvmError::InvalidResponse`]; never
    /// retried.
    pub async fn set_auto_detect(&self, enabled: bool) -> Result<(), KvmError> {
        let mut transport = self.transport.lock().await;
        write_setting(&mut *transport, Command::SetAutoDetect(enabled)).await?;
        info!("auto input detection {}", on_off(enabled));
        Ok(())
    }
}

// ── Exchange helpers ──────────────────────────────────────────────────────────

/// Sends one command and returns the validated reply value and raw bytes.
///
/// Any failure closes the connection: after a timeout or a garbled frame the
/// byte stream can no longer be trusted to line up with the next command.
async fn exchange<T: KvmTransport>(
    transport: &mut T,
    command: Command,
) -> Result<(u8, Vec<u8>), KvmError> {
    let frame = CommandFrame::encode(&command);
    debug!("-> {} ({command:?})", hex_dump(frame.as_bytes()));

    let result = match transport
        .send_and_receive(&frame, command.response_len())
        .await
    {
        Ok(raw) => {
            debug!("<- {}", hex_dump(&raw));
            decode_response(&raw).map(|value| (value, raw))
        }
        Err(e) => Err(e),
    };

    if result.is_err() {
        transport.close().await;
    }
    result
}

/// One get-port attempt, with the reported port range-checked.
async fn read_port_once<T: KvmTransport>(
    transport: &mut T,
    num_ports: PortCount,
) -> Result<u8, KvmError> {
    let (port, raw) = exchange(transport, Command::GetPort).await?;
    if !num_ports.contains(port) {
        return Err(KvmError::invalid_response(
            format!(
                "device reported port {port}, outside 1..={}",
                num_ports.max_port()
            ),
            &raw,
        ));
    }
    Ok(port)
}

/// One write attempt whose echo must repeat the written value.
async fn write_setting<T: KvmTransport>(
    transport: &mut T,
    command: Command,
) -> Result<(), KvmError> {
    let (echoed, raw) = exchange(transport, command).await?;
    if command.expects_echo() && echoed != command.value() {
        return Err(KvmError::invalid_response(
            format!(
                "echo value 0x{echoed:02X} does not match written value 0x{:02X}",
                command.value()
            ),
            &raw,
        ));
    }
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
