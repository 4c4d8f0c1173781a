//! Admission control: which waiting radiators may switch on.
//!
//! ```text
//!  heating schedule ──▶ plan_intake ──▶ OFF now / queue ──▶ plan_admission
//!                                                              │
//!                                   admitted (ON) ◀────────────┤
//!                         deferred (LOAD_SHED, kept queued) ◀──┘
//! ```
//!
//! The queue is walked most important first, biggest first, against
//! `available − margin`.  A radiator that does not fit does not stop the
//! walk: a smaller one further down may still fit.

use crate::radiator::{DeferredActivationEntry, HeatingIntent, Radiator, RadiatorId, RequestedState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionPlan {
    pub admitted: Vec<DeferredActivationEntry>,
    pub deferred: Vec<DeferredActivationEntry>,
}

impl AdmissionPlan {
    pub fn admitted_ids(&self) -> Vec<RadiatorId> {
        self.admitted.iter().map(|e| e.radiator_id).collect()
    }

    pub fn deferred_ids(&self) -> Vec<RadiatorId> {
        self.deferred.iter().map(|e| e.radiator_id).collect()
    }
}

/// Split `queue` into admitted and deferred entries.
///
/// Unknown power admits nothing.
pub fn plan_admission(
    queue: &[DeferredActivationEntry],
    available_power: Option<u32>,
    safety_margin: u32,
) -> AdmissionPlan {
    let mut ordered = queue.to_vec();
    ordered.sort_by(|a, b| {
        a.importance
            .cmp(&b.importance)
            .then_with(|| b.power.cmp(&a.power))
    });

    let Some(available) = available_power else {
        return AdmissionPlan {
            admitted: Vec::new(),
            deferred: ordered,
        };
    };

    let mut remaining = i64::from(available) - i64::from(safety_margin);
    let mut plan = AdmissionPlan::default();
    for entry in ordered {
        let power = i64::from(entry.power);
        if remaining >= power {
            remaining -= power;
            plan.admitted.push(entry);
        } else {
            plan.deferred.push(entry);
        }
    }
    plan
}

/// What to do with a batch of heating intents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakePlan {
    /// Switch off right away; turning off never needs power.
    pub turn_off: Vec<RadiatorId>,
    /// Replaces the admission queue.
    pub queue: Vec<DeferredActivationEntry>,
}

/// Compare intents against the stored rows.
///
/// Intents for unknown radiators are dropped.  Intents that already match
/// the requested state are no-ops.  Repeated intents for one radiator:
/// the last one wins.
pub fn plan_intake(radiators: &[Radiator], intents: &[HeatingIntent]) -> IntakePlan {
    let mut last: Vec<HeatingIntent> = Vec::with_capacity(intents.len());
    for intent in intents {
        match last.iter_mut().find(|i| i.radiator_id == intent.radiator_id) {
            Some(slot) => *slot = *intent,
            None => last.push(*intent),
        }
    }

    let mut plan = IntakePlan::default();
    for intent in last {
        let Some(r) = radiators.iter().find(|r| r.id == intent.radiator_id) else {
            continue;
        };
        if r.requested_state == intent.target() {
            continue;
        }
        match intent.target() {
            RequestedState::On => plan.queue.push(DeferredActivationEntry::from(r)),
            _ => plan.turn_off.push(r.id),
        }
    }
    plan
}
