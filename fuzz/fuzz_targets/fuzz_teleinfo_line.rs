//! Fuzz target: teleinfo line parser, line assembler and frame buffer.
//!
//! Feeds arbitrary bytes through the same path as the meter UART and
//! checks that nothing panics and that a completed frame always leaves
//! the buffer empty.
//!
//! cargo fuzz run fuzz_teleinfo_line

#![no_main]

use std::time::Instant;

use libfuzzer_sys::fuzz_target;
use heatctl::teleinfo::assembler::{LineAssembler, MAX_LINE};
use heatctl::teleinfo::frame::FrameBuffer;
use heatctl::teleinfo::line::parse_line;

fuzz_target!(|data: &[u8]| {
    if let Some(field) = parse_line(data) {
        assert!(!field.key.is_empty(), "parsed field without a key");
    }

    let mut lines = LineAssembler::new();
    let mut frames = FrameBuffer::new();
    let now = Instant::now();
    lines.feed(data, |line| {
        assert!(line.len() <= MAX_LINE);
        if frames.push_line(line, now).is_some() {
            assert!(frames.is_empty(), "buffer must reset after a frame");
        }
    });
    assert!(lines.pending() <= MAX_LINE);
});
