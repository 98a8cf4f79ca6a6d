//! Fuzz target: `FrameAssembler::push` + `PeerCommand::parse`
//!
//! Splits arbitrary input into BLE-sized writes, feeds them through the
//! assembler and parses every completed frame.  Asserts the assembler
//! stays bounded and that accepted commands satisfy their validation
//! rules.
//!
//! cargo fuzz run fuzz_peer_command

#![no_main]

use labsentinel::app::commands::{FrameAssembler, PeerCommand, FRAME_CAPACITY};
use labsentinel::error::CommandError;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut assembler = FrameAssembler::new();

    for chunk in data.chunks(20) {
        if let Some(frame) = assembler.push(chunk) {
            assert!(frame.bytes.len() <= FRAME_CAPACITY);
            let cmd = PeerCommand::parse(&frame);
            if frame.truncated {
                assert_eq!(cmd, PeerCommand::Rejected(CommandError::FrameTooLong));
            }
            match cmd {
                PeerCommand::Wifi { ssid, password } => {
                    assert!(!ssid.is_empty() && ssid.len() <= 32);
                    assert!(password.is_empty() || (8..=64).contains(&password.len()));
                }
                PeerCommand::Threshold { temp_high, temp_low } => {
                    assert!(temp_high.is_finite() && temp_low.is_finite());
                }
                _ => {}
            }
        }
        assert!(assembler.pending_len() <= FRAME_CAPACITY);
    }
});
