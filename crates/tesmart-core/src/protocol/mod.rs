//! Protocol module containing the command table and the frame codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_response, hex_dump, CommandFrame};
pub use messages::*;
