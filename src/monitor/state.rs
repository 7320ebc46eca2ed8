use serde::Serialize;

use crate::models::{ActivityEntry, CallerId, TripSession};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DrivingMode {
    Idle,
    Active,
}

/// Single-owner monitor state, mutated only by the event-loop task. The
/// invariants the engine relies on — at most one live trip, at most one
/// caller awaiting voice confirmation — are held by the `Option`s here
/// rather than by convention.
#[derive(Debug)]
pub struct MonitorState {
    pub mode: DrivingMode,
    pub trip: Option<TripSession>,
    pub pending_voice: Option<CallerId>,
    pub active_alert: Option<CallerId>,
    pub activity: Vec<ActivityEntry>,
    pub trip_history: Vec<TripSession>,
}

impl MonitorState {
    pub fn new(trip_history: Vec<TripSession>) -> Self {
        Self {
            mode: DrivingMode::Idle,
            trip: None,
            pending_voice: None,
            active_alert: None,
            activity: Vec::new(),
            trip_history,
        }
    }
}

/// Read-only view of the monitor for UIs and tests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub mode: DrivingMode,
    pub trip: Option<TripSession>,
    pub active_alert: Option<CallerId>,
    pub activity: Vec<ActivityEntry>,
    pub trip_history: Vec<TripSession>,
    pub settings: Settings,
}
