//! TCP transport session for a TESmart switch.
//!
//! # Timing rules
//!
//! - **Timeout**: connect, write, and read each get `params.timeout()`.
//! - **Settling delay**: the switch misbehaves if a command arrives too soon
//!   after the previous one.  The session records when each write finished
//!   and, before the next write, sleeps until `delay` has passed.  The
//!   timestamp survives reconnects, so the rule also holds across a retry
//!   that had to reopen the socket.
//!
//! # Partial reads
//!
//! TCP may deliver the 6-byte response in pieces.  `read_exact` keeps reading
//! until all bytes arrive; if the device closes the connection or the timeout
//! fires first, the exchange fails with [`KvmError::Communication`].
//!
//! # Release
//!
//! The socket is closed by [`KvmTransport::close`], after any failed
//! exchange, when an exchange is abandoned before its reply arrives, and when
//! the transport is dropped.

use async_trait::async_trait;
use tesmart_core::{CommandFrame, ConnectionParams, KvmError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::application::control_kvm::{KvmController, KvmTransport};

/// A single TCP connection to one switch, opened lazily.
pub struct TcpTransport {
    params: ConnectionParams,
    stream: Option<TcpStream>,
    /// When the most recent write finished.
    last_write: Option<Instant>,
}

impl TcpTransport {
    /// Creates a transport for `params`.  Nothing is connected yet.
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            stream: None,
            last_write: None,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Sleeps until the settling delay since the previous write has elapsed.
    async fn wait_for_settle(&self) {
        let Some(last) = self.last_write else {
            return;
        };
        let ready_at = last + self.params.delay();
        if ready_at > Instant::now() {
            debug!(
                "waiting {:?} before next command",
                ready_at.saturating_duration_since(Instant::now())
            );
            time::sleep_until(ready_at).await;
        }
    }

    /// One write and one fixed-size read on `stream`.
    async fn write_then_read(
        &mut self,
        stream: &mut TcpStream,
        frame: &CommandFrame,
        expected_len: usize,
    ) -> Result<Vec<u8>, KvmError> {
        let io_timeout = self.params.timeout();

        // Marked before the write so an abandoned send still counts.
        self.last_write = Some(Instant::now());
        let written = time::timeout(io_timeout, stream.write_all(frame.as_bytes())).await;
        self.last_write = Some(Instant::now());
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(KvmError::io("failed to send command", e)),
            Err(_) => {
                return Err(KvmError::communication(format!(
                    "sending command timed out after {io_timeout:?}"
                )))
            }
        }

        let mut response = vec![0u8; expected_len];
        match time::timeout(io_timeout, stream.read_exact(&mut response)).await {
            Ok(Ok(_)) => Ok(response),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(KvmError::io(
                format!("connection closed before {expected_len} response bytes arrived"),
                e,
            )),
            Ok(Err(e)) => Err(KvmError::io("failed to read response", e)),
            Err(_) => Err(KvmError::communication(format!(
                "no response within {io_timeout:?}"
            ))),
        }
    }
}

#[async_trait]
impl KvmTransport for TcpTransport {
    async fn open(&mut self) -> Result<(), KvmError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.params.address();
        let connect = TcpStream::connect((self.params.host(), self.params.tcp_port()));
        let stream = match time::timeout(self.params.timeout(), connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(KvmError::io(format!("failed to connect to {addr}"), e)),
            Err(_) => {
                return Err(KvmError::communication(format!(
                    "connection to {addr} timed out after {:?}",
                    self.params.timeout()
                )))
            }
        };

        // Frames are tiny; do not let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY on {addr}: {e}");
        }

        debug!("connected to {addr}");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send_and_receive(
        &mut self,
        frame: &CommandFrame,
        expected_len: usize,
    ) -> Result<Vec<u8>, KvmError> {
        self.open().await?;
        self.wait_for_settle().await;

        // Held outside `self` until the full reply is in: an abandoned
        // exchange drops the socket along with its unread reply.
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| KvmError::communication("connection is not open"))?;

        let result = self.write_then_read(&mut stream, frame, expected_len).await;
        if result.is_ok() {
            self.stream = Some(stream);
        } else {
            debug!("dropping connection to {} after failed exchange", self.params.address());
        }
        result
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("error shutting down connection to {}: {e}", self.params.address());
            }
            debug!("closed connection to {}", self.params.address());
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl KvmController<TcpTransport> {
    /// Builds a controller that talks to the switch described by `params`.
    pub fn tcp(params: ConnectionParams) -> Self {
        let num_ports = params.num_ports();
        KvmController::new(TcpTransport::new(params), num_ports)
    }

    /// Connection parameters of the underlying session.
    pub async fn params(&self) -> ConnectionParams {
        self.transport().lock().await.params().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tesmart_core::{Command, PortCount};
    use tokio::net::TcpListener;

    fn params_for(port: u16, delay: Duration) -> ConnectionParams {
        ConnectionParams::new(
            "127.0.0.1",
            port,
            Duration::from_millis(300),
            delay,
            PortCount::Sixteen,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_transport_starts_closed_and_close_is_idempotent() {
        let mut transport = TcpTransport::new(params_for(5000, Duration::ZERO));
        assert!(!transport.is_open());
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_controller_exposes_session_params() {
        let params = params_for(5001, Duration::from_millis(50));
        let kvm = KvmController::tcp(params.clone());
        assert_eq!(kvm.params().await, params);
        assert_eq!(kvm.num_ports(), PortCount::Sixteen);
    }

    #[tokio::test]
    async fn test_open_fails_with_communication_error_when_nothing_listens() {
        // Arrange: grab a free port, then release it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let mut transport = TcpTransport::new(params_for(port, Duration::ZERO));

        // Act
        let result = transport.open().await;

        // Assert
        assert!(matches!(result, Err(KvmError::Communication { .. })));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_send_and_receive_reads_full_reply_delivered_in_pieces() {
        // Arrange: the device writes its reply one byte at a time
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let device = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 6];
            sock.read_exact(&mut frame).await.unwrap();
            for b in [0xAA, 0xBB, 0x03, 0x11, 0x02, 0xEE] {
                sock.write_all(&[b]).await.unwrap();
                time::sleep(Duration::from_millis(5)).await;
            }
            frame
        });
        let mut transport = TcpTransport::new(params_for(port, Duration::ZERO));

        // Act
        let frame = CommandFrame::encode(&Command::GetPort);
        let reply = transport.send_and_receive(&frame, 6).await.unwrap();

        // Assert
        assert_eq!(reply, vec![0xAA, 0xBB, 0x03, 0x11, 0x02, 0xEE]);
        assert_eq!(device.await.unwrap(), [0xAA, 0xBB, 0x03, 0x10, 0x00, 0xEE]);
        assert!(transport.is_open());
    }

    #[tokio::test]
    async fn test_timeout_drops_the_connection() {
        // Arrange: the device reads the command and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let device = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 6];
            sock.read_exact(&mut frame).await.unwrap();
            // Wait for the client to hang up.
            let mut rest = Vec::new();
            sock.read_to_end(&mut rest).await.unwrap();
            rest.len()
        });
        let mut transport = TcpTransport::new(params_for(port, Duration::ZERO));

        // Act
        let frame = CommandFrame::encode(&Command::GetPort);
        let err = transport.send_and_receive(&frame, 6).await.unwrap_err();

        // Assert
        assert!(matches!(err, KvmError::Communication { .. }));
        assert!(!transport.is_open());
        let trailing = time::timeout(Duration::from_secs(2), device)
            .await
            .expect("device must observe the close")
            .unwrap();
        assert_eq!(trailing, 0);
    }

    #[tokio::test]
    async fn test_abandoned_exchange_leaves_transport_closed() {
        // Arrange: the device reads the command and answers late
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 6];
            sock.read_exact(&mut frame).await.unwrap();
            time::sleep(Duration::from_millis(150)).await;
            let _ = sock.write_all(&[0xAA, 0xBB, 0x03, 0x11, 0x01, 0xEE]).await;
        });
        let mut transport = TcpTransport::new(params_for(port, Duration::ZERO));
        transport.open().await.unwrap();

        // Act: give up on the exchange before the reply arrives
        let frame = CommandFrame::encode(&Command::SetBuzzer(true));
        let abandoned =
            time::timeout(Duration::from_millis(50), transport.send_and_receive(&frame, 6)).await;

        // Assert
        assert!(abandoned.is_err());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_short_reply_then_close_is_communication_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; 6];
            sock.read_exact(&mut frame).await.unwrap();
            sock.write_all(&[0xAA, 0xBB, 0x03]).await.unwrap();
            // Dropping the socket closes it after a partial reply.
        });
        let mut transport = TcpTransport::new(params_for(port, Duration::ZERO));

        let frame = CommandFrame::encode(&Command::GetPort);
        let err = transport.send_and_receive(&frame, 6).await.unwrap_err();

        assert!(matches!(err, KvmError::Communication { .. }));
        assert!(!transport.is_open());
    }
}
