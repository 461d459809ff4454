//! Integration tests for the tesmart-core frame codec.
//!
//! These tests drive the public API the way the client crate does: build a
//! [`Command`], encode it, and validate the device's reply.

use tesmart_core::{
    decode_response, protocol::messages::PREAMBLE, validate_port, Command, CommandFrame,
    ErrorKind, LcdTimeout, PortCount,
};

/// Builds the response a well-behaved device sends for `value`.
fn device_reply(value: u8) -> [u8; 6] {
    [0xAA, 0xBB, 0x03, 0x11, value, 0xEE]
}

#[test]
fn test_every_command_starts_with_preamble_and_ends_with_terminator() {
    let commands = [
        Command::SetPort(1),
        Command::GetPort,
        Command::SetBuzzer(false),
        Command::SetLcdTimeout(LcdTimeout::TenSeconds),
        Command::SetAutoDetect(true),
    ];

    for command in commands {
        let frame = CommandFrame::encode(&command);
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), 6, "{command:?}");
        assert_eq!(&bytes[..3], &PREAMBLE, "{command:?}");
        assert_eq!(bytes[5], 0xEE, "{command:?}");
    }
}

#[test]
fn test_set_port_frame_for_every_valid_port_on_16_port_device() {
    for port in 1..=16u8 {
        let port = validate_port(port, PortCount::Sixteen).expect("in range");
        let frame = CommandFrame::encode(&Command::SetPort(port));
        assert_eq!(frame.as_bytes(), &[0xAA, 0xBB, 0x03, 0x01, port, 0xEE]);
    }
}

#[test]
fn test_set_port_echo_decodes_to_requested_port() {
    let frame = CommandFrame::encode(&Command::SetPort(5));
    let echo = device_reply(frame.value());
    assert_eq!(decode_response(&echo).unwrap(), 5);
}

#[test]
fn test_get_port_reply_decodes_to_one_indexed_port() {
    assert_eq!(
        decode_response(&[0xAA, 0xBB, 0x03, 0x11, 0x07, 0xEE]).unwrap(),
        7
    );
}

#[test]
fn test_any_single_corrupted_fixed_byte_is_rejected() {
    let good = device_reply(3);
    // Offsets 0..=3 and 5 are fixed; offset 4 is the value.
    for offset in [0usize, 1, 2, 3, 5] {
        let mut bad = good;
        bad[offset] ^= 0xFF;
        let err = decode_response(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse, "offset {offset}");
    }
}

#[test]
fn test_invalid_lcd_timeout_never_reaches_the_encoder() {
    let err = LcdTimeout::try_from(15).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}
