use chrono::{DateTime, Utc};
use log::debug;

use crate::models::{CallEventKind, RawCallNotification};

/// A status-bar notification relayed by the platform's notification
/// listener. Messenger voice/video calls never reach the telephony stack;
/// they only surface here.
#[derive(Debug, Clone)]
pub struct PostedNotification {
    pub package: String,
    pub category: Option<String>,
    pub title: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

const WHATSAPP_PACKAGE: &str = "com.whatsapp";
const CALL_CATEGORY: &str = "call";

// Fallback phrases for platform versions that post call notifications
// without a category.
const CALL_PHRASES: [&str; 3] = [
    "whatsapp call",
    "incoming voice call",
    "incoming video call",
];

/// Recognizes a messenger call notification and converts it into a raw
/// ringing event for the resolver pipeline. The caller id is the
/// notification title — a display name, matched by exact string further
/// down since it carries no digits.
pub fn detect_messenger_call(posted: &PostedNotification) -> Option<RawCallNotification> {
    if posted.package != WHATSAPP_PACKAGE {
        return None;
    }

    let is_call = posted
        .category
        .as_deref()
        .map(|c| c.eq_ignore_ascii_case(CALL_CATEGORY))
        .unwrap_or(false)
        || {
            let title = posted.title.to_lowercase();
            let text = posted.text.to_lowercase();
            CALL_PHRASES
                .iter()
                .any(|phrase| title.contains(phrase) || text.contains(phrase))
        };

    if !is_call {
        return None;
    }

    let caller = posted.title.trim();
    debug!("messenger call detected from {caller:?}");
    Some(RawCallNotification {
        kind: CallEventKind::Ringing,
        caller: (!caller.is_empty()).then(|| caller.to_string()),
        at: posted.at,
    })
}
