//! Domain types: connection parameters and port bookkeeping.
//!
//! These are plain values with no I/O.  The client crate consumes them; the
//! CLI crate builds them from config files and command-line flags.

pub mod params;
pub mod port;
