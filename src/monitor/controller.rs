use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::warn;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::TripStore;
use crate::effects::DeviceBridge;
use crate::models::RawCallNotification;
use crate::notifications::{detect_messenger_call, PostedNotification};
use crate::settings::SettingsStore;

use super::config::MonitorConfig;
use super::events::MonitorEvent;
use super::loop_worker::{monitor_loop, MonitorWorker};
use super::state::MonitorSnapshot;

/// Handle to the running call monitor. User actions and notifications are
/// enqueued without blocking; queries await a reply from the loop task.
#[derive(Clone)]
pub struct DriveMonitor {
    tx: mpsc::UnboundedSender<MonitorEvent>,
    cancel_token: CancellationToken,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DriveMonitor {
    /// Loads persisted trip history (once) and spawns the event loop.
    pub async fn start(
        config: MonitorConfig,
        settings: Arc<SettingsStore>,
        store: TripStore,
        bridge: Arc<dyn DeviceBridge>,
    ) -> Result<Self> {
        let trip_history = store
            .load_history()
            .await
            .context("failed to load trip history")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = MonitorWorker::new(config, settings, store, bridge, trip_history, tx.clone());

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitor_loop(worker, rx, cancel_token.clone()));

        Ok(Self {
            tx,
            cancel_token,
            worker: Arc::new(Mutex::new(Some(handle))),
        })
    }

    pub fn start_driving(&self) {
        self.send(MonitorEvent::StartDriving { at: Utc::now() });
    }

    pub fn stop_driving(&self) {
        self.send(MonitorEvent::StopDriving { at: Utc::now() });
    }

    /// Feeds one raw telephony notification into the pipeline.
    pub fn notify_call(&self, raw: RawCallNotification) {
        self.send(MonitorEvent::Notification(raw));
    }

    /// Feeds a posted status-bar notification; forwarded only when it is
    /// recognized as a messenger call.
    pub fn notification_posted(&self, posted: &PostedNotification) {
        if let Some(raw) = detect_messenger_call(posted) {
            self.send(MonitorEvent::Notification(raw));
        }
    }

    pub fn voice_command(&self, transcript: &str) {
        self.send(MonitorEvent::VoiceCommand {
            transcript: transcript.to_string(),
            at: Utc::now(),
        });
    }

    pub fn dismiss_alert(&self) {
        self.send(MonitorEvent::DismissAlert);
    }

    pub fn add_vip(&self, number: &str) {
        self.send(MonitorEvent::AddVip {
            number: number.to_string(),
        });
    }

    pub fn remove_vip(&self, number: &str) {
        self.send(MonitorEvent::RemoveVip {
            number: number.to_string(),
        });
    }

    pub fn set_auto_reply(&self, message: &str) {
        self.send(MonitorEvent::SetAutoReply {
            message: message.to_string(),
        });
    }

    pub fn set_auto_decline(&self, enabled: bool) {
        self.send(MonitorEvent::SetAutoDecline { enabled });
    }

    pub fn set_voice_confirm(&self, enabled: bool) {
        self.send(MonitorEvent::SetVoiceConfirm { enabled });
    }

    pub fn reset_call_history(&self) {
        self.send(MonitorEvent::ResetCallHistory);
    }

    /// Consistent view of the monitor after every previously enqueued
    /// event has been processed.
    pub async fn snapshot(&self) -> Result<MonitorSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MonitorEvent::Snapshot { reply: reply_tx });
        reply_rx
            .await
            .map_err(|_| anyhow!("monitor loop terminated before replying"))
    }

    /// Stops the event loop and waits for it to finish.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            handle
                .await
                .context("monitor loop task failed to join")?;
        }
        Ok(())
    }

    fn send(&self, event: MonitorEvent) {
        if self.tx.send(event).is_err() {
            warn!("monitor event dropped; loop is no longer running");
        }
    }
}
