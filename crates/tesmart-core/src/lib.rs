//! # tesmart-core
//!
//! Shared library for controlling TESmart HDMI KVM switches over TCP.  It holds
//! the wire protocol codec, the command table, connection parameters, and the
//! error taxonomy used by every layer above it.
//!
//! This crate has zero dependencies on sockets, async runtimes, or files.
//!
//! # Architecture overview (for beginners)
//!
//! A TESmart switch listens on a TCP port (5000 by default) and speaks a tiny
//! fixed-size binary protocol.  Every command and every response is exactly
//! six bytes:
//!
//! ```text
//! command:  AA BB 03 <token> <value> EE
//! response: AA BB 03   11    <value> EE
//! ```
//!
//! This crate defines:
//!
//! - **`protocol`** – The command table (which token means what), frame
//!   encoding, and byte-for-byte response validation.
//!
//! - **`domain`** – Plain data: [`ConnectionParams`], the [`PortCount`] of a
//!   device, and the [`PortSwitch`] result of a set-port operation.
//!
//! - **`error`** – [`KvmError`], the four-way failure taxonomy every
//!   operation reports through.

pub mod domain;
pub mod error;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `tesmart_core::KvmError` instead of `tesmart_core::error::KvmError`.
pub use domain::params::{ConnectionParams, ParamsError, PortCount};
pub use domain::port::{validate_port, PortSwitch};
pub use error::{ErrorKind, KvmError};
pub use protocol::codec::{decode_response, hex_dump, CommandFrame};
pub use protocol::messages::{Command, CommandToken, LcdTimeout};
