//! Load shedding: pick running radiators to cut so the spare power
//! climbs back above the safety margin.
//!
//! ## Ranking
//!
//! Candidates are radiators seen ON with a non-zero rating, ordered
//! least important first and, within one importance, biggest first.
//! Selection walks that order greedily and stops as soon as enough
//! watts are recovered.
//!
//! ## Blind mode
//!
//! Unknown power means the meter is unreadable.  Every candidate below
//! HIGH is cut, whatever the consumption.

use crate::radiator::{Importance, Radiator, RadiatorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheddingCandidate {
    pub id: RadiatorId,
    pub power: u32,
    pub importance: Importance,
}

impl From<&Radiator> for SheddingCandidate {
    fn from(r: &Radiator) -> Self {
        Self {
            id: r.id,
            power: r.power,
            importance: r.importance,
        }
    }
}

/// Candidates from `radiators`, in shedding order.
pub fn rank_for_shedding(radiators: &[Radiator]) -> Vec<SheddingCandidate> {
    let mut ranked: Vec<SheddingCandidate> = radiators
        .iter()
        .filter(|r| r.is_shedding_candidate())
        .map(SheddingCandidate::from)
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .cmp(&a.importance)
            .then_with(|| b.power.cmp(&a.power))
    });
    ranked
}

/// Radiators to cut, walking `ranked` in the given order.
pub fn select_for_shedding(
    available_power: Option<u32>,
    ranked: &[SheddingCandidate],
    safety_margin: u32,
) -> Vec<RadiatorId> {
    let Some(available) = available_power else {
        return ranked
            .iter()
            .filter(|c| !c.importance.survives_blind_shedding())
            .map(|c| c.id)
            .collect();
    };

    let needed = i64::from(safety_margin) - i64::from(available);
    if needed <= 0 {
        return Vec::new();
    }

    let mut selected = Vec::new();
    let mut recovered = 0i64;
    for c in ranked {
        selected.push(c.id);
        recovered += i64::from(c.power);
        if recovered >= needed {
            break;
        }
    }
    selected
}
