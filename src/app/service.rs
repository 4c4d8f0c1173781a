//! Controller service, the hexagonal core.
//!
//! [`Controller`] ties the power budget, the shedding and admission
//! engines, and the reconciliation service to the shared state.  It is
//! cheap to clone: the listener thread and the periodic cycle each hold
//! a copy over the same store, driver and queues.
//!
//! ```text
//!  TelemetrySource ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                      │          Controller           │
//!     IntentSource ──▶ │ budget · shed · admit · sync  │ ──▶ PinDriver
//!                      └──────────────────────────────┘
//!                          ▲                    │
//!                          └── RadiatorStore ◀──┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};

use crate::control::admission::{plan_admission, plan_intake, AdmissionPlan, IntakePlan};
use crate::control::shedding::{rank_for_shedding, select_for_shedding};
use crate::drivers::mcp23017::{BusOpener, DriverMode, SharedPinDriver};
use crate::error::Result;
use crate::power::PowerBudget;
use crate::radiator::{HeatingIntent, RadiatorId, RequestedState};
use crate::shared::{DeferredActivationQueue, TelemetryStore};
use crate::teleinfo::TelemetrySnapshot;

use super::events::{AppEvent, SyncSummary, TelemetryData};
use super::ports::{EventSink, Liveness, RadiatorStore};
use super::sync::RadiatorSyncService;

/// What one completed frame led to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub available_w: Option<u32>,
    pub shed: Vec<RadiatorId>,
    /// `None` when this frame skipped admission.
    pub admission: Option<AdmissionPlan>,
    pub sync: SyncSummary,
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller<S: RadiatorStore + ?Sized, O: BusOpener> {
    store: Arc<S>,
    sync: RadiatorSyncService<O>,
    telemetry: Arc<TelemetryStore>,
    queue: Arc<DeferredActivationQueue>,
    budget: PowerBudget,
    liveness: Arc<dyn Liveness>,
    started_at: Instant,
}

impl<S: RadiatorStore + ?Sized, O: BusOpener> Clone for Controller<S, O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sync: self.sync.clone(),
            telemetry: Arc::clone(&self.telemetry),
            queue: Arc::clone(&self.queue),
            budget: self.budget,
            liveness: Arc::clone(&self.liveness),
            started_at: self.started_at,
        }
    }
}

impl<S: RadiatorStore + ?Sized, O: BusOpener> Controller<S, O> {
    pub fn new(
        store: Arc<S>,
        driver: Arc<SharedPinDriver<O>>,
        telemetry: Arc<TelemetryStore>,
        queue: Arc<DeferredActivationQueue>,
        budget: PowerBudget,
    ) -> Self {
        Self {
            store,
            sync: RadiatorSyncService::new(driver),
            telemetry,
            queue,
            budget,
            liveness: Arc::new(()),
            started_at: Instant::now(),
        }
    }

    /// Ping `liveness` after every reconciliation that reached the
    /// expander while telemetry was fresh.
    pub fn with_liveness(mut self, liveness: Arc<dyn Liveness>) -> Self {
        self.liveness = liveness;
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&self, sink: &mut impl EventSink) -> Result<()> {
        let radiators = self.store.load_all()?.len();
        let simulated = self.sync.driver().with(|d| d.mode() == DriverMode::Simulated);
        sink.emit(&AppEvent::Started {
            radiators,
            simulated,
        });
        info!("Controller started: {radiators} radiators, simulated={simulated}");
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn telemetry(&self) -> &Arc<TelemetryStore> {
        &self.telemetry
    }

    pub fn queue(&self) -> &Arc<DeferredActivationQueue> {
        &self.queue
    }

    pub fn budget(&self) -> PowerBudget {
        self.budget
    }

    /// Spare watts from the latest published snapshot.
    pub fn available_power(&self, now: Instant) -> Option<u32> {
        self.budget
            .available_power(self.telemetry.latest().as_deref(), now)
    }

    /// Whether the latest snapshot is within the freshness window.
    pub fn telemetry_fresh(&self, now: Instant) -> bool {
        self.telemetry
            .latest()
            .is_some_and(|s| s.age(now) <= self.budget.freshness)
    }

    // ── Per-frame orchestration ───────────────────────────────

    /// Publish a completed frame, shed, optionally admit, then reconcile
    /// once so both decisions reach the pins before the next frame.
    pub fn on_frame(
        &self,
        snapshot: TelemetrySnapshot,
        run_admission: bool,
        sink: &mut impl EventSink,
    ) -> Result<FrameOutcome> {
        let now = snapshot.captured_at();
        let snapshot = self.telemetry.publish(snapshot);
        let available_w = self.budget.available_power(Some(&snapshot), now);

        sink.emit(&AppEvent::Telemetry(TelemetryData {
            subscribed_a: snapshot.subscribed_current(),
            instantaneous_a: snapshot.instantaneous_current(),
            apparent_va: snapshot.apparent_power(),
            tariff_period: snapshot.tariff_period().map(str::to_owned),
            available_w,
        }));

        let shed = self.shed(available_w, sink)?;
        let admission = if run_admission {
            Some(self.run_admission_pass(available_w, sink)?)
        } else {
            None
        };
        let sync = self.synchronize(sink)?;

        Ok(FrameOutcome {
            available_w,
            shed,
            admission,
            sync,
        })
    }

    // ── Load shedding ─────────────────────────────────────────

    /// Shed for `available_w`; reconcile immediately if anything was cut.
    pub fn manage_load_shedding(
        &self,
        available_w: Option<u32>,
        sink: &mut impl EventSink,
    ) -> Result<Vec<RadiatorId>> {
        let shed = self.shed(available_w, sink)?;
        if !shed.is_empty() {
            self.synchronize(sink)?;
        }
        Ok(shed)
    }

    /// Judge the latest snapshot at `now`, independently of frames.
    ///
    /// Completed frames already shed on fresh data, so this only acts when
    /// the budget is unknown: the meter went quiet, or never spoke within
    /// one freshness window of start-up.  Returns the ids shed, `None`
    /// when power is known or the start-up grace is still running.
    pub fn check_power(
        &self,
        now: Instant,
        sink: &mut impl EventSink,
    ) -> Result<Option<Vec<RadiatorId>>> {
        if self.available_power(now).is_some() {
            return Ok(None);
        }
        let waiting_for_first_frame = self.telemetry.latest().is_none()
            && now.saturating_duration_since(self.started_at) <= self.budget.freshness;
        if waiting_for_first_frame {
            return Ok(None);
        }
        let shed = self.manage_load_shedding(None, sink)?;
        if !shed.is_empty() {
            warn!("Telemetry unavailable, failed closed on {shed:?}");
        }
        Ok(Some(shed))
    }

    fn shed(&self, available_w: Option<u32>, sink: &mut impl EventSink) -> Result<Vec<RadiatorId>> {
        let rows = self.store.load_all()?;
        let ranked = rank_for_shedding(&rows);
        let ids = select_for_shedding(available_w, &ranked, self.budget.safety_margin);
        if ids.is_empty() {
            return Ok(ids);
        }
        self.store
            .set_requested_state(&ids, RequestedState::LoadShed, Utc::now())?;
        warn!("Load shedding {:?} (available={:?} W)", ids, available_w);
        sink.emit(&AppEvent::LoadShed {
            ids: ids.clone(),
            available_w,
        });
        Ok(ids)
    }

    // ── Admission ─────────────────────────────────────────────

    /// Admit what fits from the deferred queue; keep and mark the rest.
    ///
    /// The queue only loses the admitted entries once they are stored as
    /// ON.  A failed write leaves the queue as it was.
    pub fn run_admission_pass(
        &self,
        available_w: Option<u32>,
        sink: &mut impl EventSink,
    ) -> Result<AdmissionPlan> {
        let plan = plan_admission(&self.queue.snapshot(), available_w, self.budget.safety_margin);
        if plan.admitted.is_empty() && plan.deferred.is_empty() {
            return Ok(plan);
        }

        let now = Utc::now();
        let admitted = plan.admitted_ids();
        let deferred = plan.deferred_ids();
        if !admitted.is_empty() {
            self.store
                .set_requested_state(&admitted, RequestedState::On, now)?;
            self.queue.remove(&admitted);
        }
        if !deferred.is_empty() {
            self.store
                .set_requested_state(&deferred, RequestedState::LoadShed, now)?;
        }
        debug!("Admission: admitted={admitted:?} deferred={deferred:?}");
        sink.emit(&AppEvent::Admission { admitted, deferred });
        Ok(plan)
    }

    // ── Intent intake ─────────────────────────────────────────

    /// Switch off what should be off, queue what wants heat.
    pub fn submit_intents(
        &self,
        intents: &[HeatingIntent],
        sink: &mut impl EventSink,
    ) -> Result<IntakePlan> {
        let rows = self.store.load_all()?;
        let plan = plan_intake(&rows, intents);
        if !plan.turn_off.is_empty() {
            self.store
                .set_requested_state(&plan.turn_off, RequestedState::Off, Utc::now())?;
        }
        self.queue.replace(&plan.queue);

        if !plan.turn_off.is_empty() || !plan.queue.is_empty() {
            sink.emit(&AppEvent::IntentsApplied {
                turned_off: plan.turn_off.clone(),
                queued: plan.queue.iter().map(|e| e.radiator_id).collect(),
            });
        }
        Ok(plan)
    }

    // ── Reconciliation ────────────────────────────────────────

    pub fn synchronize(&self, sink: &mut impl EventSink) -> Result<SyncSummary> {
        let summary = self.sync.synchronize(self.store.as_ref())?;
        if summary.written != summary.changed {
            sink.emit(&AppEvent::SyncShortfall {
                intended: summary.changed,
                written: summary.written,
            });
        }
        sink.emit(&AppEvent::Synchronized(summary));
        if summary.hardware_ok() && self.telemetry_fresh(Instant::now()) {
            self.liveness.ping();
        } else {
            debug!("Liveness withheld: hardware_ok={}", summary.hardware_ok());
        }
        Ok(summary)
    }
}
