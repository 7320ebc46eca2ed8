pub mod db;
pub mod effects;
pub mod history;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod policy;
pub mod resolver;
pub mod settings;

pub use db::TripStore;
pub use effects::{DeviceBridge, DispatchError, Effect};
pub use history::{classify, CallHistory, UrgencyResult};
pub use models::{
    CallEventKind, CallOutcome, CallStatus, CallerId, RawCallNotification, ResolvedCall,
    TripSession, MAX_TRIP_HISTORY,
};
pub use monitor::{DriveMonitor, DrivingMode, MonitorConfig, MonitorSnapshot};
pub use notifications::{detect_messenger_call, PostedNotification};
pub use policy::{decide, match_voice_command, Decision, VoiceAction};
pub use resolver::{CallResolver, ResolverAction};
pub use settings::{Settings, SettingsStore, DEFAULT_AUTO_REPLY};
