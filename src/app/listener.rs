//! Telemetry listener: the long-lived meter loop.
//!
//! One per process, on its own thread.  Every completed frame goes to
//! [`Controller::on_frame`]; every Nth frame also runs admission.  The
//! frame counter is private to the listener.
//!
//! A radiator switched on shows up in IINST one frame later.  Admitting
//! on every frame would read the stale low current and admit again, then
//! over-shed when the spike lands.  Admitting every other frame damps it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::drivers::mcp23017::BusOpener;
use crate::teleinfo::frame::FrameBuffer;

use super::ports::{EventSink, RadiatorStore, TelemetrySource};
use super::service::{Controller, FrameOutcome};

/// Back-off after a failed serial read.
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(2);

pub struct TelemetryListener<S: RadiatorStore + ?Sized, O: BusOpener> {
    controller: Controller<S, O>,
    frames: FrameBuffer,
    admission_every: u64,
    completed: u64,
}

impl<S: RadiatorStore + ?Sized, O: BusOpener> TelemetryListener<S, O> {
    pub fn new(controller: Controller<S, O>, admission_every_n_frames: u32) -> Self {
        Self {
            controller,
            frames: FrameBuffer::new(),
            admission_every: u64::from(admission_every_n_frames.max(1)),
            completed: 0,
        }
    }

    /// Frames completed so far.
    pub fn completed_frames(&self) -> u64 {
        self.completed
    }

    /// Feed one raw line.  Returns the frame outcome when the line
    /// completed a frame.
    pub fn process_line(
        &mut self,
        raw: &[u8],
        now: Instant,
        sink: &mut impl EventSink,
    ) -> Option<FrameOutcome> {
        let snapshot = self.frames.push_line(raw, now)?;
        self.completed += 1;
        let run_admission = self.completed % self.admission_every == 0;

        match self.controller.on_frame(snapshot, run_admission, sink) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Listener: frame {} failed: {e}", self.completed);
                None
            }
        }
    }

    /// Read lines until `stop` is set.
    pub fn run(
        &mut self,
        source: &mut impl TelemetrySource,
        stop: &AtomicBool,
        sink: &mut impl EventSink,
    ) {
        info!("Listener: running (admission every {} frames)", self.admission_every);
        while !stop.load(Ordering::Relaxed) {
            match source.read_line() {
                Ok(Some(line)) => {
                    self.process_line(&line, Instant::now(), sink);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Listener: {e}, retrying in {:?}", READ_ERROR_BACKOFF);
                    std::thread::sleep(READ_ERROR_BACKOFF);
                }
            }
        }
        info!("Listener: stopped after {} frames", self.completed);
    }
}

impl<S, O> TelemetryListener<S, O>
where
    S: RadiatorStore + ?Sized + 'static,
    O: BusOpener + Send + 'static,
    O::Bus: Send,
{
    /// Run on a dedicated thread.
    pub fn spawn<T, K>(mut self, mut source: T, mut sink: K) -> std::io::Result<ListenerHandle>
    where
        T: TelemetrySource + 'static,
        K: EventSink + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("teleinfo".into())
            .spawn(move || self.run(&mut source, &flag, &mut sink))?;
        Ok(ListenerHandle { stop, thread })
    }
}

pub struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl ListenerHandle {
    /// Ask the loop to stop and wait for it.  The loop notices after its
    /// current read returns (at most one read timeout).
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.thread.join().is_err() {
            error!("Listener: thread panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
