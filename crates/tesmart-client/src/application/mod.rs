//! Application layer for tesmart-client.
//!
//! Holds the command facade.  It depends only on the [`KvmTransport`] trait,
//! so every rule it enforces (argument validation, retry policy, echo checks,
//! the unchanged-port short-circuit) is unit-testable without a socket.
//!
//! [`KvmTransport`]: control_kvm::KvmTransport

pub mod control_kvm;
