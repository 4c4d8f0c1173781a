//! Reconciliation against a register-level expander model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use heatctl::app::events::AppEvent;
use heatctl::app::ports::RadiatorStore;
use heatctl::app::service::Controller;
use heatctl::drivers::mcp23017::{NoBus, PinDriver, SharedPinDriver};
use heatctl::power::PowerBudget;
use heatctl::radiator::{ActualState, Importance, Radiator, RequestedState};
use heatctl::shared::{DeferredActivationQueue, TelemetryStore};

use crate::mock_hw::{rig, snapshot, watched_rig, MemoryStore, RecordingSink};

fn rad(id: u32, pin: u8, requested: RequestedState) -> Radiator {
    let mut r = Radiator::new(id, format!("room-{id}"), 1000, pin, Importance::Medium);
    r.requested_state = requested;
    r
}

#[test]
fn drives_pins_with_inverted_logic_and_records_state() {
    let mut rig = rig(vec![
        rad(1, 0, RequestedState::On),
        rad(2, 9, RequestedState::Off),
        rad(3, 4, RequestedState::LoadShed),
    ]);

    let summary = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(summary.applied, 3);
    assert_eq!(summary.apply_failures, 0);
    assert_eq!(summary.changed, 3);
    assert_eq!(summary.written, 3);

    assert!(!rig.hw.latch_high(0), "ON drives the pin LOW");
    assert!(rig.hw.latch_high(9));
    assert!(rig.hw.latch_high(4), "LOAD_SHED drives the pin like OFF");
    {
        let chip = rig.hw.chip.lock().unwrap();
        assert!(chip.is_output(0) && chip.is_output(9) && chip.is_output(4));
        assert!(!chip.is_output(1), "untouched pins stay inputs");
    }

    assert_eq!(rig.store.get(1).actual_state, ActualState::On);
    assert_eq!(rig.store.get(2).actual_state, ActualState::Off);
    assert_eq!(rig.store.get(3).actual_state, ActualState::Off);
    assert!(rig.store.get(1).last_observed.is_some());
}

#[test]
fn second_pass_writes_nothing() {
    let mut rig = rig(vec![rad(1, 0, RequestedState::On), rad(2, 1, RequestedState::Off)]);
    rig.controller.synchronize(&mut rig.sink).unwrap();
    let again = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(again.changed, 0);
    assert_eq!(again.written, 0);
    assert_eq!(again.applied, 2, "pins are still driven every pass");
}

#[test]
fn stuck_relay_is_reported_on_the_row() {
    let mut rig = rig(vec![rad(1, 5, RequestedState::On)]);
    rig.hw.stick_high(5);

    let summary = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(summary.apply_failures, 1);

    let r = rig.store.get(1);
    assert_eq!(r.actual_state, ActualState::Off, "observed level wins");
    let err = r.error.unwrap();
    assert!(err.contains("state incorrect"), "got {err}");
}

#[test]
fn bus_failure_marks_rows_undefined_then_recovers() {
    let mut rig = rig(vec![rad(1, 0, RequestedState::On), rad(2, 1, RequestedState::Off)]);
    rig.hw.set_fail(true);

    rig.controller.synchronize(&mut rig.sink).unwrap();
    for id in [1, 2] {
        let r = rig.store.get(id);
        assert_eq!(r.actual_state, ActualState::Undefined);
        assert!(r.error.unwrap().contains("I2C communication error"));
    }

    rig.hw.set_fail(false);
    rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(rig.store.get(1).actual_state, ActualState::On);
    assert_eq!(rig.store.get(2).actual_state, ActualState::Off);
    assert_eq!(rig.store.get(1).error, None, "error clears once the bus is back");
    assert!(rig.hw.opens() >= 3, "driver reconnects after each fault");
}

#[test]
fn out_of_range_pin_is_undefined() {
    let mut rig = rig(vec![rad(1, 20, RequestedState::On), rad(2, 3, RequestedState::On)]);
    let summary = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(summary.apply_failures, 1);

    let bad = rig.store.get(1);
    assert_eq!(bad.actual_state, ActualState::Undefined);
    assert_eq!(bad.error.as_deref(), Some("Pin 20 is not valid"));
    assert_eq!(rig.store.get(2).actual_state, ActualState::On, "other rows unaffected");
}

#[test]
fn vanished_row_raises_shortfall() {
    let mut rig = rig(vec![rad(1, 0, RequestedState::On), rad(2, 1, RequestedState::On)]);
    rig.store.vanish(2);

    let summary = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(summary.changed, 2);
    assert_eq!(summary.written, 1);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::SyncShortfall {
                intended: 2,
                written: 1
            }
        )),
        1
    );
}

#[test]
fn simulated_driver_reads_every_pin_low() {
    let store = Arc::new(MemoryStore::new(vec![
        rad(1, 0, RequestedState::Off),
        rad(2, 1, RequestedState::On),
    ]));
    let controller = Controller::new(
        Arc::clone(&store),
        Arc::new(SharedPinDriver::new(PinDriver::simulated(NoBus))),
        Arc::new(TelemetryStore::new()),
        Arc::new(DeferredActivationQueue::new()),
        PowerBudget::default(),
    );
    let mut sink = RecordingSink::new();
    controller.start(&mut sink).unwrap();
    let summary = controller.synchronize(&mut sink).unwrap();

    assert_eq!(summary.apply_failures, 0);
    for r in store.load_all().unwrap() {
        assert_eq!(r.actual_state, ActualState::On);
        assert_eq!(r.error, None);
    }
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::Started {
                radiators: 2,
                simulated: true
            }
        )),
        1
    );
}

// ── Liveness ──────────────────────────────────────────────────

#[test]
fn healthy_cycle_feeds_the_watchdog() {
    let (mut rig, liveness) = watched_rig(vec![rad(1, 0, RequestedState::On)]);
    rig.controller.telemetry().publish(snapshot(45, 10, Instant::now()));

    let summary = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert!(summary.hardware_ok());
    assert_eq!(liveness.pings(), 1);
}

#[test]
fn stuck_relay_is_a_row_error_not_a_dead_cycle() {
    let (mut rig, liveness) = watched_rig(vec![rad(1, 0, RequestedState::On)]);
    rig.hw.stick_high(0);
    rig.controller.telemetry().publish(snapshot(45, 10, Instant::now()));

    let summary = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(summary.apply_failures, 1);
    assert!(summary.hardware_ok());
    assert_eq!(liveness.pings(), 1);
}

#[test]
fn unreachable_bus_withholds_the_ping() {
    let (mut rig, liveness) = watched_rig(vec![rad(1, 0, RequestedState::On), rad(2, 1, RequestedState::Off)]);
    rig.controller.telemetry().publish(snapshot(45, 10, Instant::now()));
    rig.hw.set_fail(true);

    let summary = rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(summary.bus_faults, 2);
    assert!(summary.sweep_failed);
    assert_eq!(liveness.pings(), 0);
    assert_eq!(rig.store.get(1).actual_state, ActualState::Undefined);

    rig.hw.set_fail(false);
    rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(liveness.pings(), 1, "pings resume with the bus");
}

#[test]
fn stale_telemetry_withholds_the_ping() {
    let (mut rig, liveness) = watched_rig(vec![rad(1, 0, RequestedState::On)]);
    rig.controller.synchronize(&mut rig.sink).unwrap();
    assert_eq!(liveness.pings(), 0, "no frame yet");

    let old = Instant::now().checked_sub(Duration::from_secs(30));
    if let Some(old) = old {
        rig.controller.telemetry().publish(snapshot(45, 10, old));
        rig.controller.synchronize(&mut rig.sink).unwrap();
        assert_eq!(liveness.pings(), 0, "frame too old");
    }
}
