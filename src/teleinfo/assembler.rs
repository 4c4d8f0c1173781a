//! Serial chunk → line assembly.
//!
//! A UART read may return part of a line, several lines, or a line
//! split across reads.  The assembler buffers bytes until `\n` and hands
//! out each complete line (terminator included; the line parser strips
//! it).  A line longer than [`MAX_LINE`] is garbage: the assembler drops
//! it and resyncs on the next newline.

use log::debug;

/// Longest line kept.  Historic teleinfo lines are under 30 bytes.
pub const MAX_LINE: usize = 128;

pub struct LineAssembler {
    buf: heapless::Vec<u8, MAX_LINE>,
    /// Discarding until the next `\n`.
    skipping: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            skipping: false,
        }
    }

    /// Feed bytes; `on_line` runs once per completed line, in order.
    pub fn feed(&mut self, data: &[u8], mut on_line: impl FnMut(&[u8])) {
        for &b in data {
            if self.skipping {
                if b == b'\n' {
                    self.skipping = false;
                }
                continue;
            }
            if self.buf.push(b).is_err() {
                debug!("teleinfo: line exceeded {MAX_LINE} bytes, resyncing");
                self.buf.clear();
                self.skipping = b != b'\n';
                continue;
            }
            if b == b'\n' {
                on_line(&self.buf);
                self.buf.clear();
            }
        }
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial line (e.g. after reopening the port).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.skipping = false;
    }
}
