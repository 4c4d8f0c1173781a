//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (journald via stderr in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as a `TAG | key=value` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn watts(w: Option<u32>) -> String {
    w.map_or_else(|| "unknown".into(), |w| format!("{w}W"))
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | isousc={:?}A iinst={:?}A papp={:?}VA | ptec={} | available={}",
                    t.subscribed_a,
                    t.instantaneous_a,
                    t.apparent_va,
                    t.tariff_period.as_deref().unwrap_or("-"),
                    watts(t.available_w),
                );
            }
            AppEvent::LoadShed { ids, available_w } => {
                warn!("SHED  | radiators={:?} | available={}", ids, watts(*available_w));
            }
            AppEvent::Admission { admitted, deferred } => {
                info!("ADMIT | admitted={:?} deferred={:?}", admitted, deferred);
            }
            AppEvent::IntentsApplied { turned_off, queued } => {
                info!("INTENT| off={:?} queued={:?}", turned_off, queued);
            }
            AppEvent::Synchronized(s) => {
                info!(
                    "SYNC  | applied={} failed={} changed={} written={} bus_ok={}",
                    s.applied,
                    s.apply_failures,
                    s.changed,
                    s.written,
                    s.hardware_ok()
                );
            }
            AppEvent::SyncShortfall { intended, written } => {
                warn!("SYNC  | shortfall: wrote {} of {} rows", written, intended);
            }
            AppEvent::Started {
                radiators,
                simulated,
            } => {
                info!("START | radiators={} simulated={}", radiators, simulated);
            }
        }
    }
}
