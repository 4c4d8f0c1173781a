//! Periodic-cycle scheduler.
//!
//! The cycle ticks at a fixed rate; the scheduler counts ticks per job
//! and tells a [`SchedulerDelegate`] when one is due.  It knows nothing
//! about the controller, which keeps it testable on its own.
//!
//! ```text
//!  Ticker ──tick──▶ Scheduler ──on_job_due(PowerCheck)─▶ delegate
//!                             ──on_job_due(Intake)─────▶ delegate
//!                             ──on_job_due(Reconcile)──▶ delegate
//! ```

use log::info;

use crate::app::ports::SchedulerDelegate;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// Work the periodic cycle knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Judge the latest telemetry and fail closed when it went stale.
    PowerCheck,
    /// Pull heating intents and feed the admission queue.
    Intake,
    /// Push requested states to the pins and read them back.
    Reconcile,
}

/// A periodic job.  `immediate` also fires it on the first tick.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub job: Job,
    pub interval_ms: u64,
    pub immediate: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    elapsed_ms: u64,
    fired: bool,
}

pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
    tick_ms: u64,
}

impl Scheduler {
    pub fn new(tick_ms: u32) -> Self {
        Self {
            schedules: [const { None }; MAX_SCHEDULES],
            tick_ms: u64::from(tick_ms.max(1)),
        }
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        let (i, slot) = self
            .schedules
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.is_none())?;
        info!(
            "Scheduler: added {:?} every {} ms at slot {}",
            schedule.job, schedule.interval_ms, i
        );
        *slot = Some(ScheduleEntry {
            schedule,
            elapsed_ms: 0,
            fired: false,
        });
        Some(i)
    }

    /// Advance one tick, firing every due job in slot order.
    pub fn tick(&mut self, delegate: &mut dyn SchedulerDelegate) {
        let tick_ms = self.tick_ms;
        for entry in self.schedules.iter_mut().flatten() {
            let first = !entry.fired;
            entry.elapsed_ms += tick_ms;
            if (first && entry.schedule.immediate) || entry.elapsed_ms >= entry.schedule.interval_ms {
                delegate.on_job_due(entry.schedule.job);
                entry.elapsed_ms = 0;
                entry.fired = true;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
