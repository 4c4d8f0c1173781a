//! Mock hardware and adapters for integration tests.
//!
//! - [`MockChip`]: register-level MCP23017 model behind a [`MockOpener`],
//!   with stuck pins and an injectable bus failure.
//! - [`MemoryStore`]: in-memory radiator table that can "lose" rows or
//!   refuse requested-state writes.
//! - [`ScriptedSource`]: replays raw meter lines.
//! - [`RecordingSink`]: keeps every emitted event.
//! - [`CountingLiveness`]: counts watchdog pings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

use heatctl::adapters::radiator_store::JsonRadiatorStore;
use heatctl::adapters::serial::encode_line;
use heatctl::app::events::AppEvent;
use heatctl::app::ports::{EventSink, Liveness, ObservedUpdate, RadiatorStore, TelemetrySource};
use heatctl::app::service::Controller;
use heatctl::drivers::mcp23017::{BusOpener, PinDriver, SharedPinDriver};
use heatctl::error::{HardwareError, SerialError, StoreError};
use heatctl::pins::reg;
use heatctl::power::PowerBudget;
use heatctl::radiator::{Radiator, RadiatorId, RequestedState};
use heatctl::shared::{DeferredActivationQueue, TelemetryStore};
use heatctl::teleinfo::TelemetrySnapshot;
use heatctl::teleinfo::frame::FrameBuffer;

// ── Register-level expander ───────────────────────────────────

pub struct MockChip {
    pub regs: [u8; 0x16],
    /// Pins that read HIGH whatever the latch says.
    pub stuck_high: u16,
    /// Every transaction fails while set.
    pub fail: bool,
}

impl Default for MockChip {
    fn default() -> Self {
        let mut regs = [0u8; 0x16];
        regs[reg::IODIRA as usize] = 0xff;
        regs[reg::IODIRB as usize] = 0xff;
        Self {
            regs,
            stuck_high: 0,
            fail: false,
        }
    }
}

#[allow(dead_code)]
impl MockChip {
    pub fn latch(&self) -> u16 {
        u16::from(self.regs[reg::OLATA as usize]) | (u16::from(self.regs[reg::OLATB as usize]) << 8)
    }

    fn gpio(&self) -> u16 {
        self.latch() | self.stuck_high
    }

    pub fn latch_high(&self, pin: u8) -> bool {
        self.latch() & (1 << pin) != 0
    }

    pub fn is_output(&self, pin: u8) -> bool {
        let dir = u16::from(self.regs[reg::IODIRA as usize])
            | (u16::from(self.regs[reg::IODIRB as usize]) << 8);
        dir & (1 << pin) == 0
    }
}

pub struct MockBus(Arc<Mutex<MockChip>>);

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    fn transaction(&mut self, _addr: u8, ops: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let mut chip = self.0.lock().unwrap();
        if chip.fail {
            return Err(ErrorKind::Bus);
        }
        let mut ptr = 0usize;
        for op in ops {
            match op {
                Operation::Write(bytes) => {
                    ptr = bytes[0] as usize;
                    for b in &bytes[1..] {
                        chip.regs[ptr] = *b;
                        ptr += 1;
                    }
                }
                Operation::Read(buf) => {
                    for slot in buf.iter_mut() {
                        let gpio = chip.gpio();
                        *slot = match ptr as u8 {
                            reg::GPIOA => gpio as u8,
                            reg::GPIOB => (gpio >> 8) as u8,
                            _ => chip.regs[ptr],
                        };
                        ptr += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockOpener {
    pub chip: Arc<Mutex<MockChip>>,
    pub opens: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockOpener {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    pub fn set_fail(&self, fail: bool) {
        self.chip.lock().unwrap().fail = fail;
    }

    pub fn stick_high(&self, pin: u8) {
        self.chip.lock().unwrap().stuck_high |= 1 << pin;
    }

    pub fn latch_high(&self, pin: u8) -> bool {
        self.chip.lock().unwrap().latch_high(pin)
    }
}

impl BusOpener for MockOpener {
    type Bus = MockBus;

    fn open(&mut self) -> Result<MockBus, HardwareError> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(MockBus(Arc::clone(&self.chip)))
    }
}

// ── Radiator store ────────────────────────────────────────────

/// Wraps the JSON store; ids in `vanished` are silently not written.
pub struct MemoryStore {
    inner: JsonRadiatorStore,
    pub vanished: Mutex<Vec<RadiatorId>>,
    /// `set_requested_state` fails while set.
    pub refuse_requests: AtomicBool,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new(rows: Vec<Radiator>) -> Self {
        Self {
            inner: JsonRadiatorStore::in_memory(rows).unwrap(),
            vanished: Mutex::new(Vec::new()),
            refuse_requests: AtomicBool::new(false),
        }
    }

    pub fn get(&self, id: RadiatorId) -> Radiator {
        self.inner.get(id).unwrap()
    }

    pub fn vanish(&self, id: RadiatorId) {
        self.vanished.lock().unwrap().push(id);
    }

    pub fn refuse_requests(&self, refuse: bool) {
        self.refuse_requests.store(refuse, Ordering::Relaxed);
    }
}

impl RadiatorStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Radiator>, StoreError> {
        self.inner.load_all()
    }

    fn set_requested_state(
        &self,
        ids: &[RadiatorId],
        state: RequestedState,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if self.refuse_requests.load(Ordering::Relaxed) {
            return Err(StoreError::Io("disk full".into()));
        }
        self.inner.set_requested_state(ids, state, at)
    }

    fn apply_observations(&self, updates: &[ObservedUpdate]) -> Result<usize, StoreError> {
        let vanished = self.vanished.lock().unwrap().clone();
        let kept: Vec<ObservedUpdate> = updates
            .iter()
            .filter(|u| !vanished.contains(&u.id))
            .cloned()
            .collect();
        self.inner.apply_observations(&kept)
    }
}

// ── Telemetry ─────────────────────────────────────────────────

/// Lines of one complete frame.
pub fn frame_lines(isousc: u32, iinst: u32) -> Vec<Vec<u8>> {
    vec![
        encode_line("ADCO", "021728123456"),
        encode_line("OPTARIF", "BASE"),
        encode_line("ISOUSC", &isousc.to_string()),
        encode_line("PTEC", "TH.."),
        encode_line("IINST", &format!("{iinst:03}")),
        encode_line("IMAX", "090"),
        encode_line("PAPP", &format!("{:05}", iinst * 230)),
        encode_line("MOTDETAT", "000000"),
    ]
}

/// A completed snapshot taken at `at`.
#[allow(dead_code)]
pub fn snapshot(isousc: u32, iinst: u32, at: Instant) -> TelemetrySnapshot {
    let mut frames = FrameBuffer::new();
    frame_lines(isousc, iinst)
        .iter()
        .find_map(|l| frames.push_line(l, at))
        .unwrap()
}

pub struct ScriptedSource {
    lines: VecDeque<Result<Vec<u8>, SerialError>>,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::new(),
        }
    }

    pub fn frame(mut self, isousc: u32, iinst: u32) -> Self {
        self.lines.extend(frame_lines(isousc, iinst).into_iter().map(Ok));
        self
    }

    pub fn error(mut self, msg: &str) -> Self {
        self.lines.push_back(Err(SerialError::Read(msg.into())));
        self
    }
}

impl TelemetrySource for ScriptedSource {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        match self.lines.pop_front() {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e),
            None => {
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok(None)
            }
        }
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<AppEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Liveness ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CountingLiveness(Arc<AtomicUsize>);

#[allow(dead_code)]
impl CountingLiveness {
    pub fn pings(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl Liveness for CountingLiveness {
    fn ping(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Wiring ────────────────────────────────────────────────────

pub struct Rig {
    pub controller: Controller<MemoryStore, MockOpener>,
    pub store: Arc<MemoryStore>,
    pub hw: MockOpener,
    pub sink: RecordingSink,
}

pub fn rig(rows: Vec<Radiator>) -> Rig {
    let store = Arc::new(MemoryStore::new(rows));
    let hw = MockOpener::default();
    let driver = PinDriver::new(hw.clone(), 0x20);
    let controller = Controller::new(
        Arc::clone(&store),
        Arc::new(SharedPinDriver::new(driver)),
        Arc::new(TelemetryStore::new()),
        Arc::new(DeferredActivationQueue::new()),
        PowerBudget::default(),
    );
    Rig {
        controller,
        store,
        hw,
        sink: RecordingSink::new(),
    }
}

/// A rig whose controller pings a [`CountingLiveness`].
#[allow(dead_code)]
pub fn watched_rig(rows: Vec<Radiator>) -> (Rig, CountingLiveness) {
    let mut rig = rig(rows);
    let liveness = CountingLiveness::default();
    rig.controller = rig
        .controller
        .clone()
        .with_liveness(Arc::new(liveness.clone()));
    (rig, liveness)
}
