//! Shedding, intake and admission through the controller.

use std::time::{Duration, Instant};

use heatctl::app::events::AppEvent;
use heatctl::radiator::{ActualState, HeatingIntent, Importance, Radiator, RequestedState};

use crate::mock_hw::{rig, snapshot, Rig};

/// Four radiators, all heating.
fn household() -> Vec<Radiator> {
    [
        (1, "chambre", 750, 0, Importance::Low),
        (2, "bureau", 1250, 1, Importance::Low),
        (3, "salle-de-bain", 2000, 2, Importance::Critical),
        (4, "salon", 1500, 3, Importance::Medium),
    ]
    .into_iter()
    .map(|(id, name, power, pin, importance)| {
        let mut r = Radiator::new(id, name, power, pin, importance);
        r.requested_state = RequestedState::On;
        r.actual_state = ActualState::On;
        r
    })
    .collect()
}

/// Same four radiators, all off.
fn cold_household() -> Rig {
    let rows = household()
        .into_iter()
        .map(|mut r| {
            r.requested_state = RequestedState::Off;
            r.actual_state = ActualState::Off;
            r
        })
        .collect();
    rig(rows)
}

fn intent(id: u32, wants_heat: bool) -> HeatingIntent {
    HeatingIntent {
        radiator_id: id,
        wants_heat,
    }
}

// ── Shedding ──────────────────────────────────────────────────

#[test]
fn overload_sheds_least_important_biggest_first() {
    let mut rig = rig(household());
    // 45 A subscribed, 40 A drawn: 1100 W spare, 900 W short of the margin.
    let outcome = rig
        .controller
        .on_frame(snapshot(45, 40, Instant::now()), false, &mut rig.sink)
        .unwrap();

    assert_eq!(outcome.available_w, Some(1100));
    assert_eq!(outcome.shed, vec![2]);
    assert_eq!(outcome.admission, None);

    let r = rig.store.get(2);
    assert_eq!(r.requested_state, RequestedState::LoadShed);
    assert_eq!(r.actual_state, ActualState::Off, "reconciled in the same frame");
    assert!(rig.hw.latch_high(1));
    assert_eq!(rig.store.get(1).requested_state, RequestedState::On);
}

#[test]
fn enough_headroom_sheds_nothing() {
    let mut rig = rig(household());
    let outcome = rig
        .controller
        .on_frame(snapshot(45, 10, Instant::now()), false, &mut rig.sink)
        .unwrap();
    assert_eq!(outcome.available_w, Some(7700));
    assert!(outcome.shed.is_empty());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::LoadShed { .. })), 0);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Telemetry(_))), 1);
}

#[test]
fn exceeded_subscription_sheds_until_margin_is_met() {
    let mut rig = rig(household());
    // IINST above ISOUSC: 0 W spare, 2000 W needed.
    let outcome = rig
        .controller
        .on_frame(snapshot(30, 35, Instant::now()), false, &mut rig.sink)
        .unwrap();
    assert_eq!(outcome.available_w, Some(0));
    assert_eq!(outcome.shed, vec![2, 1]);
}

#[test]
fn unknown_power_sheds_everything_below_high() {
    let mut rig = rig(household());
    let shed = rig
        .controller
        .manage_load_shedding(None, &mut rig.sink)
        .unwrap();
    assert_eq!(shed, vec![2, 1, 4]);
    assert_eq!(rig.store.get(3).requested_state, RequestedState::On);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::LoadShed { available_w: None, .. })),
        1
    );
}

#[test]
fn stale_telemetry_reads_as_unknown() {
    let rig = rig(household());
    let taken = Instant::now();
    rig.controller.telemetry().publish(snapshot(45, 10, taken));
    assert_eq!(rig.controller.available_power(taken), Some(7700));
    let later = taken + Duration::from_secs(6);
    assert_eq!(rig.controller.available_power(later), None);
}

#[test]
fn silent_meter_fails_closed_on_the_power_check() {
    let mut rig = rig(household());
    let taken = Instant::now();
    rig.controller
        .on_frame(snapshot(45, 10, taken), false, &mut rig.sink)
        .unwrap();

    // Fresh: the frame already decided.
    assert_eq!(rig.controller.check_power(taken, &mut rig.sink).unwrap(), None);

    // No frame since: the snapshot ages past the window.
    let later = taken + Duration::from_secs(6);
    let shed = rig.controller.check_power(later, &mut rig.sink).unwrap();
    assert_eq!(shed, Some(vec![2, 1, 4]));
    assert_eq!(rig.store.get(2).requested_state, RequestedState::LoadShed);
    assert_eq!(rig.store.get(3).requested_state, RequestedState::On, "CRITICAL stays on");
    assert!(rig.hw.latch_high(1), "shed radiator driven HIGH at once");
    assert!(!rig.hw.latch_high(2));

    // Nothing left to shed: no further writes.
    let again = rig.controller.check_power(later, &mut rig.sink).unwrap();
    assert_eq!(again, Some(vec![]));
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::LoadShed { available_w: None, .. })),
        1
    );
}

#[test]
fn meter_that_never_speaks_fails_closed_after_the_grace() {
    let mut rig = rig(household());
    let now = Instant::now();
    assert_eq!(rig.controller.check_power(now, &mut rig.sink).unwrap(), None);

    let later = now + Duration::from_secs(6);
    let shed = rig.controller.check_power(later, &mut rig.sink).unwrap();
    assert_eq!(shed, Some(vec![2, 1, 4]));
}

// ── Intake ────────────────────────────────────────────────────

#[test]
fn off_intent_applies_immediately_on_intent_is_queued() {
    let mut rig = rig(household());
    let plan = rig
        .controller
        .submit_intents(&[intent(4, false), intent(1, true), intent(99, false)], &mut rig.sink)
        .unwrap();

    assert_eq!(plan.turn_off, vec![4]);
    assert!(plan.queue.is_empty(), "radiator 1 is already requested ON");
    assert_eq!(rig.store.get(4).requested_state, RequestedState::Off);
    assert!(rig.controller.queue().is_empty());
}

#[test]
fn intake_replaces_the_queue() {
    let mut rig = cold_household();
    rig.controller
        .submit_intents(&[intent(1, true), intent(2, true)], &mut rig.sink)
        .unwrap();
    assert_eq!(rig.controller.queue().len(), 2);

    rig.controller
        .submit_intents(&[intent(3, true)], &mut rig.sink)
        .unwrap();
    let queued: Vec<u32> = rig
        .controller
        .queue()
        .snapshot()
        .iter()
        .map(|e| e.radiator_id)
        .collect();
    assert_eq!(queued, vec![3]);
    assert_eq!(
        rig.store.get(1).requested_state,
        RequestedState::Off,
        "queueing never switches anything on"
    );
}

// ── Admission ─────────────────────────────────────────────────

#[test]
fn admission_walks_past_radiators_that_do_not_fit() {
    let mut rig = cold_household();
    rig.controller
        .submit_intents(&[intent(1, true), intent(2, true), intent(3, true)], &mut rig.sink)
        .unwrap();

    // 3300 W spare, 1300 W above the margin.
    let plan = rig
        .controller
        .run_admission_pass(Some(3300), &mut rig.sink)
        .unwrap();
    assert_eq!(plan.admitted_ids(), vec![2]);
    assert_eq!(plan.deferred_ids(), vec![3, 1]);

    assert_eq!(rig.store.get(2).requested_state, RequestedState::On);
    assert_eq!(rig.store.get(3).requested_state, RequestedState::LoadShed);
    assert_eq!(rig.store.get(1).requested_state, RequestedState::LoadShed);
    assert_eq!(rig.controller.queue().len(), 2, "deferred entries stay queued");

    rig.controller.synchronize(&mut rig.sink).unwrap();
    assert!(!rig.hw.latch_high(1), "admitted radiator driven LOW");
    assert!(rig.hw.latch_high(0));
}

#[test]
fn failed_admission_write_keeps_the_queue() {
    let mut rig = cold_household();
    rig.controller
        .submit_intents(&[intent(1, true), intent(2, true), intent(3, true)], &mut rig.sink)
        .unwrap();

    rig.store.refuse_requests(true);
    assert!(rig.controller.run_admission_pass(Some(3300), &mut rig.sink).is_err());
    assert_eq!(rig.controller.queue().len(), 3, "nothing admitted, nothing lost");
    assert_eq!(rig.store.get(2).requested_state, RequestedState::Off);

    rig.store.refuse_requests(false);
    let plan = rig
        .controller
        .run_admission_pass(Some(3300), &mut rig.sink)
        .unwrap();
    assert_eq!(plan.admitted_ids(), vec![2]);
    assert_eq!(rig.controller.queue().len(), 2);
}

#[test]
fn repeated_deferral_keeps_the_request_timestamp() {
    let mut rig = cold_household();
    rig.controller
        .submit_intents(&[intent(3, true)], &mut rig.sink)
        .unwrap();

    rig.controller
        .run_admission_pass(Some(2500), &mut rig.sink)
        .unwrap();
    let first = rig.store.get(3);
    assert_eq!(first.requested_state, RequestedState::LoadShed);

    std::thread::sleep(Duration::from_millis(5));
    let plan = rig
        .controller
        .run_admission_pass(Some(2500), &mut rig.sink)
        .unwrap();
    assert_eq!(plan.deferred_ids(), vec![3]);
    assert_eq!(rig.store.get(3).last_requested, first.last_requested);
}

#[test]
fn unknown_power_admits_nothing() {
    let mut rig = cold_household();
    rig.controller
        .submit_intents(&[intent(1, true)], &mut rig.sink)
        .unwrap();
    let available = rig.controller.available_power(Instant::now());
    rig.controller
        .run_admission_pass(available, &mut rig.sink)
        .unwrap();

    assert_eq!(rig.store.get(1).requested_state, RequestedState::LoadShed);
    assert_eq!(rig.controller.queue().len(), 1);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::Admission { admitted, .. } if admitted.is_empty())),
        1
    );
}

#[test]
fn frame_with_admission_admits_and_reconciles() {
    let mut rig = cold_household();
    rig.controller
        .submit_intents(&[intent(1, true)], &mut rig.sink)
        .unwrap();

    let outcome = rig
        .controller
        .on_frame(snapshot(45, 20, Instant::now()), true, &mut rig.sink)
        .unwrap();
    let plan = outcome.admission.unwrap();
    assert_eq!(plan.admitted_ids(), vec![1]);
    assert!(rig.controller.queue().is_empty());
    assert_eq!(rig.store.get(1).actual_state, ActualState::On);
}
