use async_trait::async_trait;
use thiserror::Error;

use crate::models::CallerId;

/// Vibration pattern requested for urgent-repeat alerts, in the platform's
/// alternating delay/vibrate millisecond convention.
pub const URGENT_VIBRATION_PATTERN: [u64; 5] = [0, 400, 200, 400, 200];

/// A side-effect request produced by the disposition policy. The core
/// treats each one as "requested" the instant it is handed to the bridge;
/// completion or failure comes back later as a follow-up event and never
/// blocks call processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SendSms { to: String, body: String },
    DeclineCall,
    AcceptCall,
    Speak { text: String },
    CaptureVoice,
    LocalAlert { caller: CallerId },
    Vibrate { pattern: Vec<u64> },
    Notification { title: String, body: String },
}

impl Effect {
    /// Short tag used in logs and follow-up events.
    pub fn label(&self) -> &'static str {
        match self {
            Effect::SendSms { .. } => "sms",
            Effect::DeclineCall => "decline-call",
            Effect::AcceptCall => "accept-call",
            Effect::Speak { .. } => "speak",
            Effect::CaptureVoice => "voice-capture",
            Effect::LocalAlert { .. } => "local-alert",
            Effect::Vibrate { .. } => "vibrate",
            Effect::Notification { .. } => "notification",
        }
    }
}

/// A collaborator request failed. Always non-fatal: the monitoring session
/// keeps running and the failure surfaces only as a log/activity entry.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("request failed: {0}")]
    Failed(String),
}

/// Boundary to the platform collaborators that actually send SMS, control
/// calls, speak, listen, and raise alerts. Implementations are expected to
/// be best-effort; errors are reported, not retried.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), DispatchError>;
    async fn decline_call(&self) -> Result<(), DispatchError>;
    async fn accept_call(&self) -> Result<(), DispatchError>;
    async fn speak(&self, text: &str) -> Result<(), DispatchError>;
    async fn capture_voice(&self) -> Result<(), DispatchError>;
    async fn local_alert(&self, caller: &str) -> Result<(), DispatchError>;
    async fn vibrate(&self, pattern: &[u64]) -> Result<(), DispatchError>;
    async fn notify(&self, title: &str, body: &str) -> Result<(), DispatchError>;
}

/// Routes one effect request to the matching bridge method.
pub async fn dispatch(bridge: &dyn DeviceBridge, effect: &Effect) -> Result<(), DispatchError> {
    match effect {
        Effect::SendSms { to, body } => bridge.send_sms(to, body).await,
        Effect::DeclineCall => bridge.decline_call().await,
        Effect::AcceptCall => bridge.accept_call().await,
        Effect::Speak { text } => bridge.speak(text).await,
        Effect::CaptureVoice => bridge.capture_voice().await,
        Effect::LocalAlert { caller } => bridge.local_alert(&caller.to_string()).await,
        Effect::Vibrate { pattern } => bridge.vibrate(pattern).await,
        Effect::Notification { title, body } => bridge.notify(title, body).await,
    }
}
