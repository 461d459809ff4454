//! Infrastructure layer for tesmart-client.
//!
//! # Modules
//!
//! - `tcp`  – [`tcp::TcpTransport`], the real tokio TCP session.
//! - `mock` – [`mock::ScriptedTransport`], an in-memory transport that records
//!   written frames and replays scripted device replies.

pub mod mock;
pub mod tcp;
