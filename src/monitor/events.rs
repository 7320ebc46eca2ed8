use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::effects::DispatchError;
use crate::models::RawCallNotification;

use super::state::MonitorSnapshot;

/// Everything the monitor reacts to, serialized onto one queue: raw
/// telephony notifications, timer firings, user actions, and collaborator
/// results. Processing order is arrival order.
#[derive(Debug)]
pub enum MonitorEvent {
    StartDriving { at: DateTime<Utc> },
    StopDriving { at: DateTime<Utc> },
    Notification(RawCallNotification),
    /// One-shot grace timer fired. Stale generations are ignored.
    GraceElapsed { generation: u64 },
    VoiceCommand {
        transcript: String,
        at: DateTime<Utc>,
    },
    DismissAlert,
    AddVip { number: String },
    RemoveVip { number: String },
    SetAutoReply { message: String },
    SetAutoDecline { enabled: bool },
    SetVoiceConfirm { enabled: bool },
    ResetCallHistory,
    /// A fire-and-forget collaborator request finished.
    EffectSettled {
        label: &'static str,
        outcome: Result<(), DispatchError>,
    },
    Snapshot {
        reply: oneshot::Sender<MonitorSnapshot>,
    },
}
