//! Meter line sources.
//!
//! - [`SimulatedMeter`]: synthesises checksummed teleinfo frames, used
//!   when the controller runs unplugged.
//! - [`RpiUart`] (feature `rpi`): the real meter on the Pi's UART,
//!   historic teleinfo at 1200 baud 7N1.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;

use crate::app::ports::TelemetrySource;
use crate::error::SerialError;
use crate::teleinfo::label;
use crate::teleinfo::line::checksum;

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

/// One checksummed teleinfo line, `KEY VALUE C\r\n`.
pub fn encode_line(key: &str, value: &str) -> Vec<u8> {
    let mut line = format!("{key} {value} {}", checksum(key, value)).into_bytes();
    line.extend_from_slice(b"\r\n");
    line
}

// ---------------------------------------------------------------------------
// Simulated meter
// ---------------------------------------------------------------------------

/// Emits one frame per `frame_period`, cycling IINST through `profile`.
pub struct SimulatedMeter {
    subscribed_a: u32,
    profile: Vec<u32>,
    step: usize,
    line_gap: Duration,
    pending: VecDeque<Vec<u8>>,
}

impl SimulatedMeter {
    pub const ADDRESS: &'static str = "031762120583";

    pub fn new(subscribed_a: u32, profile: Vec<u32>) -> Self {
        Self {
            subscribed_a,
            profile: if profile.is_empty() { vec![0] } else { profile },
            step: 0,
            line_gap: Duration::ZERO,
            pending: VecDeque::new(),
        }
    }

    /// Spread each frame's lines over `period`.
    pub fn paced(mut self, period: Duration) -> Self {
        self.line_gap = period / 8;
        self
    }

    /// Lines of the next frame, STX before the first, ETX after the last.
    pub fn frame(&mut self) -> Vec<Vec<u8>> {
        let iinst = self.profile[self.step % self.profile.len()];
        self.step += 1;
        let isousc = self.subscribed_a.to_string();
        let iinst_s = format!("{iinst:03}");
        let papp = format!("{:05}", iinst * 230);

        let fields: [(&str, &str); 8] = [
            (label::ADCO, Self::ADDRESS),
            (label::OPTARIF, "BASE"),
            (label::ISOUSC, &isousc),
            (label::PTEC, "TH.."),
            (label::IINST, &iinst_s),
            (label::IMAX, "090"),
            (label::PAPP, &papp),
            (label::MOTDETAT, "000000"),
        ];
        let mut lines: Vec<Vec<u8>> = fields.iter().map(|(k, v)| encode_line(k, v)).collect();
        if let Some(first) = lines.first_mut() {
            first.insert(0, STX);
        }
        if let Some(last) = lines.last_mut() {
            last.push(ETX);
        }
        lines
    }
}

impl TelemetrySource for SimulatedMeter {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        if self.pending.is_empty() {
            let frame = self.frame();
            self.pending.extend(frame);
            debug!("SimulatedMeter: frame {}", self.step);
        }
        if !self.line_gap.is_zero() {
            std::thread::sleep(self.line_gap);
        }
        Ok(self.pending.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Raspberry Pi UART
// ---------------------------------------------------------------------------

#[cfg(feature = "rpi")]
pub use rpi::RpiUart;

#[cfg(feature = "rpi")]
mod rpi {
    use std::collections::VecDeque;
    use std::time::Duration;

    use log::info;
    use rppal::uart::{Parity, Uart};

    use crate::app::ports::TelemetrySource;
    use crate::config::{ControllerConfig, SerialParity};
    use crate::error::SerialError;
    use crate::teleinfo::assembler::LineAssembler;

    pub struct RpiUart {
        uart: Uart,
        lines: LineAssembler,
        ready: VecDeque<Vec<u8>>,
    }

    impl RpiUart {
        pub fn open(cfg: &ControllerConfig) -> Result<Self, SerialError> {
            let parity = match cfg.serial_parity {
                SerialParity::None => Parity::None,
                SerialParity::Even => Parity::Even,
            };
            let mut uart = Uart::with_path(
                &cfg.serial_port,
                cfg.serial_baud,
                parity,
                cfg.serial_data_bits,
                cfg.serial_stop_bits,
            )
            .map_err(|e| SerialError::Open(format!("{}: {e}", cfg.serial_port)))?;
            uart.set_read_mode(0, Duration::from_millis(u64::from(cfg.serial_timeout_ms)))
                .map_err(|e| SerialError::Open(e.to_string()))?;
            info!(
                "RpiUart: {} @ {} baud {}{:?}{}",
                cfg.serial_port,
                cfg.serial_baud,
                cfg.serial_data_bits,
                cfg.serial_parity,
                cfg.serial_stop_bits
            );
            Ok(Self {
                uart,
                lines: LineAssembler::new(),
                ready: VecDeque::new(),
            })
        }
    }

    impl TelemetrySource for RpiUart {
        fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            let mut buf = [0u8; 64];
            let n = self
                .uart
                .read(&mut buf)
                .map_err(|e| SerialError::Read(e.to_string()))?;
            let ready = &mut self.ready;
            self.lines.feed(&buf[..n], |line| ready.push_back(line.to_vec()));
            Ok(self.ready.pop_front())
        }
    }
}
