//! Scripted in-memory transport for tests.
//!
//! `ScriptedTransport` stands in for a real switch without a socket.  It runs
//! in one of two modes:
//!
//! - **Scripted**: replies are popped from a queue filled by the test with
//!   [`push_response`](ScriptedTransport::push_response),
//!   [`push_raw`](ScriptedTransport::push_raw), or
//!   [`push_failure`](ScriptedTransport::push_failure).  An empty queue is a
//!   communication failure.
//! - **Simulated**: built with [`simulated`](ScriptedTransport::simulated), it
//!   behaves like a well-formed device: it tracks the active port, answers
//!   get-port with it, and echoes every set command.  Queued replies still
//!   take priority, so a test can inject a fault into an otherwise healthy
//!   device.
//!
//! The transport is a cheap handle over shared state.  Clone it before moving
//! it into a [`KvmController`](crate::KvmController) and keep the clone to
//! inspect what was written:
//!
//! ```rust
//! use tesmart_client::{infrastructure::mock::ScriptedTransport, KvmController};
//! use tesmart_core::PortCount;
//!
//! let transport = ScriptedTransport::simulated(1);
//! let probe = transport.clone();
//! let _kvm = KvmController::new(transport, PortCount::Sixteen);
//! assert!(probe.written().is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tesmart_core::{CommandFrame, CommandToken, KvmError};

use crate::application::control_kvm::KvmTransport;

/// One scripted reaction to a `send_and_receive` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Return these bytes verbatim.
    Bytes(Vec<u8>),
    /// Fail with [`KvmError::Communication`].
    Failure,
}

#[derive(Debug, Default)]
struct Inner {
    replies: VecDeque<Reply>,
    /// Active port when simulating a device.
    simulated_port: Option<u8>,
    written: Vec<CommandFrame>,
    open: bool,
    opens: usize,
    closes: usize,
    fail_open: bool,
}

/// In-memory [`KvmTransport`] that records traffic and replays a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

/// Builds a well-formed response frame carrying `value`.
pub fn response_frame(value: u8) -> Vec<u8> {
    vec![0xAA, 0xBB, 0x03, 0x11, value, 0xEE]
}

impl ScriptedTransport {
    /// A transport with an empty script.  Every exchange fails until replies
    /// are pushed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that behaves like a healthy device currently on
    /// `initial_port`.
    pub fn simulated(initial_port: u8) -> Self {
        let transport = Self::default();
        transport.state().simulated_port = Some(initial_port);
        transport
    }

    /// Queues a well-formed reply carrying `value`.
    pub fn push_response(&self, value: u8) -> &Self {
        self.push_raw(response_frame(value))
    }

    /// Queues `bytes` to be returned verbatim.
    pub fn push_raw(&self, bytes: Vec<u8>) -> &Self {
        self.state().replies.push_back(Reply::Bytes(bytes));
        self
    }

    /// Queues a communication failure.
    pub fn push_failure(&self) -> &Self {
        self.state().replies.push_back(Reply::Failure);
        self
    }

    /// Makes every subsequent `open` fail.
    pub fn refuse_connections(&self) {
        self.state().fail_open = true;
    }

    /// Every frame passed to `send_and_receive`, in order.
    pub fn written(&self) -> Vec<CommandFrame> {
        self.state().written.clone()
    }

    /// Number of frames with the given token.
    pub fn written_with(&self, token: CommandToken) -> usize {
        self.state()
            .written
            .iter()
            .filter(|f| f.token() == token as u8)
            .count()
    }

    /// The simulated device's active port, if simulating.
    pub fn current_port(&self) -> Option<u8> {
        self.state().simulated_port
    }

    /// Number of times a connection was opened.
    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    /// Number of times an open connection was closed.
    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        // A panic in another test thread must not hide this test's result.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Inner {
    fn open(&mut self) -> Result<(), KvmError> {
        if self.fail_open {
            return Err(KvmError::communication("scripted connection refused"));
        }
        if !self.open {
            self.open = true;
            self.opens += 1;
        }
        Ok(())
    }

    fn simulate(&mut self, frame: &CommandFrame) -> Option<Vec<u8>> {
        let port = self.simulated_port.as_mut()?;
        let value = match CommandToken::from_byte(frame.token()) {
            Some(CommandToken::GetPort) => *port,
            Some(CommandToken::SetPort) => {
                *port = frame.value();
                frame.value()
            }
            _ => frame.value(),
        };
        Some(response_frame(value))
    }
}

#[async_trait]
impl KvmTransport for ScriptedTransport {
    async fn open(&mut self) -> Result<(), KvmError> {
        self.state().open()
    }

    async fn send_and_receive(
        &mut self,
        frame: &CommandFrame,
        _expected_len: usize,
    ) -> Result<Vec<u8>, KvmError> {
        let mut state = self.state();
        state.open()?;
        state.written.push(*frame);

        let reply = match state.replies.pop_front() {
            Some(reply) => reply,
            None => match state.simulate(frame) {
                Some(bytes) => Reply::Bytes(bytes),
                None => Reply::Failure,
            },
        };

        match reply {
            Reply::Bytes(bytes) => Ok(bytes),
            Reply::Failure => {
                state.open = false;
                Err(KvmError::communication("scripted transport failure"))
            }
        }
    }

    async fn close(&mut self) {
        let mut state = self.state();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.state().open
    }
}
