//! tesmart-client library crate.
//!
//! Talks to one TESmart KVM switch over TCP.
//!
//! # Architecture
//!
//! ```text
//! caller (CLI, scripts, other services)
//!         ↕  get_port / set_port / set_buzzer / set_lcd_timeout / set_auto_detect
//! [tesmart-client]
//!   ├── application/      KvmController: validation, retry policy, echo checks
//!   └── infrastructure/
//!         ├── tcp/        TcpTransport: connect, delay gate, timed read/write
//!         └── mock/       ScriptedTransport for tests
//!         ↕  6-byte frames (tesmart-core codec)
//! TESmart switch (TCP port 5000)
//! ```
//!
//! # Layer rules
//!
//! - `application` depends on `tesmart-core` and the [`KvmTransport`] trait only.
//! - `infrastructure` implements [`KvmTransport`] with `tokio` sockets.

/// Application layer: the command facade.
pub mod application;

/// Infrastructure layer: transport implementations.
pub mod infrastructure;

pub use application::control_kvm::{KvmController, KvmTransport, DEFAULT_GET_PORT_RETRIES};
pub use infrastructure::tcp::TcpTransport;
