use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::caller::CallerId;

/// Raw transition kinds delivered by the telephony notification source.
/// A single physical call typically produces several of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CallEventKind {
    Ringing,
    Incoming,
    Offhook,
    Disconnected,
}

/// One raw, possibly duplicated, possibly caller-id-incomplete notification
/// as it arrives from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallNotification {
    pub kind: CallEventKind,
    pub caller: Option<String>,
    pub at: DateTime<Utc>,
}

impl RawCallNotification {
    pub fn caller_id(&self) -> CallerId {
        CallerId::from_raw(self.caller.as_deref())
    }
}

/// The resolver's single canonical representation of a physical call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCall {
    pub caller: CallerId,
    pub observed_at: DateTime<Utc>,
}

/// Final disposition recorded for one physical call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CallStatus {
    /// Whitelisted caller; the call rang through untouched.
    VipIgnored,
    /// Repeat call inside the urgency window; the driver was alerted.
    UrgentAlert,
    /// Auto-reply SMS requested.
    Replied,
    /// Call declined and auto-reply SMS requested.
    DeclinedAndReplied,
    /// Call declined with no reply (no address to send one to).
    Declined,
    /// Answered via voice confirmation.
    Accepted,
    /// Logged only; nothing to act on.
    Ignored,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::VipIgnored => "VipIgnored",
            CallStatus::UrgentAlert => "UrgentAlert",
            CallStatus::Replied => "Replied",
            CallStatus::DeclinedAndReplied => "DeclinedAndReplied",
            CallStatus::Declined => "Declined",
            CallStatus::Accepted => "Accepted",
            CallStatus::Ignored => "Ignored",
        }
    }
}

/// Immutable once appended to a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    pub caller: CallerId,
    pub status: CallStatus,
    pub at: DateTime<Utc>,
}
