use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::TripStore;
use crate::effects::{self, DeviceBridge, Effect};
use crate::history::{classify, CallHistory};
use crate::models::{
    ActivityEntry, CallOutcome, CallStatus, CallerId, RawCallNotification, ResolvedCall,
    TripSession, MAX_TRIP_HISTORY,
};
use crate::policy::{decide, match_voice_command, Decision, VoiceAction};
use crate::resolver::{CallResolver, ResolverAction};
use crate::settings::SettingsStore;

use super::config::MonitorConfig;
use super::events::MonitorEvent;
use super::state::{DrivingMode, MonitorSnapshot, MonitorState};

pub(super) struct MonitorWorker {
    state: MonitorState,
    resolver: CallResolver,
    call_history: CallHistory,
    config: MonitorConfig,
    settings: Arc<SettingsStore>,
    store: TripStore,
    bridge: Arc<dyn DeviceBridge>,
    tx: UnboundedSender<MonitorEvent>,
    grace_timer: Option<JoinHandle<()>>,
}

impl MonitorWorker {
    pub(super) fn new(
        config: MonitorConfig,
        settings: Arc<SettingsStore>,
        store: TripStore,
        bridge: Arc<dyn DeviceBridge>,
        trip_history: Vec<TripSession>,
        tx: UnboundedSender<MonitorEvent>,
    ) -> Self {
        Self {
            state: MonitorState::new(trip_history),
            resolver: CallResolver::new(config.dedup_window_ms, config.unknown_grace_ms),
            call_history: CallHistory::new(),
            config,
            settings,
            store,
            bridge,
            tx,
            grace_timer: None,
        }
    }

    async fn handle(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::StartDriving { at } => self.start_driving(at),
            MonitorEvent::StopDriving { at } => self.stop_driving(at).await,
            MonitorEvent::Notification(raw) => self.on_notification(raw),
            MonitorEvent::GraceElapsed { generation } => {
                match self.resolver.on_grace_elapsed(generation) {
                    Some(resolved) => {
                        self.grace_timer = None;
                        self.on_resolved(resolved);
                    }
                    // Cancelled or superseded timer firing late.
                    None => debug!("stale grace timer (generation {generation}) ignored"),
                }
            }
            MonitorEvent::VoiceCommand { transcript, at } => self.on_voice_command(&transcript, at),
            MonitorEvent::DismissAlert => {
                if self.state.active_alert.take().is_some() {
                    debug!("urgent alert dismissed");
                }
            }
            MonitorEvent::AddVip { number } => {
                self.update_settings(move |s| s.add_vip(&number), "VIP number added");
            }
            MonitorEvent::RemoveVip { number } => {
                self.update_settings(move |s| s.remove_vip(&number), "VIP number removed");
            }
            MonitorEvent::SetAutoReply { message } => {
                self.update_settings(
                    move |s| {
                        s.auto_reply_message = message;
                        true
                    },
                    "Auto-reply message updated",
                );
            }
            MonitorEvent::SetAutoDecline { enabled } => {
                self.update_settings(
                    move |s| {
                        s.auto_decline = enabled;
                        true
                    },
                    "Auto-decline toggled",
                );
            }
            MonitorEvent::SetVoiceConfirm { enabled } => {
                self.update_settings(
                    move |s| {
                        s.voice_confirm = enabled;
                        true
                    },
                    "Voice confirmation toggled",
                );
            }
            MonitorEvent::ResetCallHistory => {
                self.call_history.reset();
                self.log_activity(Utc::now(), "Call history cleared".to_string());
            }
            MonitorEvent::EffectSettled { label, outcome } => match outcome {
                Ok(()) => debug!("{label} request completed"),
                Err(err) => {
                    // Never fatal; the session keeps running and the
                    // failure is surfaced for the driver to see later.
                    warn!("{label} request failed: {err}");
                    self.log_activity(Utc::now(), format!("{label} request failed: {err}"));
                }
            },
            MonitorEvent::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn start_driving(&mut self, at: DateTime<Utc>) {
        if self.state.mode == DrivingMode::Active {
            debug!("start driving ignored; already active");
            return;
        }

        self.state.mode = DrivingMode::Active;
        self.state.activity.clear();
        let trip = TripSession::begin(at);
        info!("Started driving; trip {}", trip.id);
        self.state.trip = Some(trip);
        self.log_activity(at, "Started driving".to_string());
    }

    async fn stop_driving(&mut self, at: DateTime<Utc>) {
        if self.state.mode == DrivingMode::Idle {
            debug!("stop driving ignored; already idle");
            return;
        }

        // Cancel, not merely ignore: an unresolved buffer must never fire
        // into an ended trip.
        self.cancel_grace_timer();
        self.resolver.reset();
        self.state.pending_voice = None;
        self.state.active_alert = None;
        self.state.mode = DrivingMode::Idle;

        if let Some(mut trip) = self.state.trip.take() {
            trip.complete(at);
            info!(
                "Stopped driving; trip {} recorded {} call(s)",
                trip.id,
                trip.calls.len()
            );
            self.state.trip_history.insert(0, trip.clone());
            self.state.trip_history.truncate(MAX_TRIP_HISTORY);
            if let Err(err) = self.store.insert_trip(&trip).await {
                error!("failed to persist trip {}: {err:#}", trip.id);
            }
        }
        self.log_activity(at, "Stopped driving".to_string());
    }

    fn on_notification(&mut self, raw: RawCallNotification) {
        if self.state.mode == DrivingMode::Idle {
            debug!("call notification ignored while parked");
            return;
        }

        // A disconnect also abandons any capture still waiting on the
        // driver's voice; the caller is gone.
        if matches!(raw.kind, crate::models::CallEventKind::Disconnected)
            && self.state.pending_voice.take().is_some()
        {
            debug!("pending voice confirmation dropped; caller disconnected");
        }

        match self.resolver.on_notification(&raw) {
            ResolverAction::Resolve(resolved) => {
                self.cancel_grace_timer();
                self.on_resolved(resolved);
            }
            ResolverAction::Buffer {
                fire_at,
                generation,
            } => self.arm_grace_timer(raw.at, fire_at, generation),
            ResolverAction::Drop => {}
        }
    }

    fn on_resolved(&mut self, resolved: ResolvedCall) {
        // A fresh call supersedes a capture still waiting on the driver.
        if self.state.pending_voice.take().is_some() {
            debug!("pending voice confirmation dropped; new call resolved");
        }

        let urgency = classify(
            &mut self.call_history,
            &resolved.caller,
            resolved.observed_at,
            self.config.urgency_threshold_ms,
        );
        let settings = self.settings.current();

        match decide(&resolved.caller, &urgency, &settings) {
            Decision::Settle { status, effects } => {
                if status == CallStatus::UrgentAlert {
                    self.state.active_alert = Some(resolved.caller.clone());
                }
                self.dispatch_effects(effects);
                self.record_outcome(resolved.caller, status, resolved.observed_at);
            }
            Decision::AwaitVoice { effects } => {
                info!("awaiting voice confirmation for {}", resolved.caller);
                self.state.pending_voice = Some(resolved.caller.clone());
                self.dispatch_effects(effects);
                self.log_activity(
                    resolved.observed_at,
                    format!("Awaiting voice confirmation for {}", resolved.caller),
                );
            }
        }
    }

    fn on_voice_command(&mut self, transcript: &str, at: DateTime<Utc>) {
        let Some(caller) = self.state.pending_voice.clone() else {
            debug!("voice command {transcript:?} ignored; no call awaiting confirmation");
            return;
        };

        match match_voice_command(transcript) {
            Some(VoiceAction::Accept) => {
                self.state.pending_voice = None;
                self.dispatch_effects(vec![Effect::AcceptCall]);
                self.record_outcome(caller, CallStatus::Accepted, at);
            }
            Some(VoiceAction::Decline) => {
                self.state.pending_voice = None;
                let mut effects = vec![Effect::DeclineCall];
                if let CallerId::Known(number) = &caller {
                    effects.push(Effect::SendSms {
                        to: number.clone(),
                        body: self.settings.current().auto_reply_message,
                    });
                }
                self.dispatch_effects(effects);
                self.record_outcome(caller, CallStatus::DeclinedAndReplied, at);
            }
            None => debug!("unrecognized voice command: {transcript:?}"),
        }
    }

    fn record_outcome(&mut self, caller: CallerId, status: CallStatus, at: DateTime<Utc>) {
        info!("call from {caller} settled as {}", status.as_str());
        self.log_activity(at, format!("{caller}: {}", status.as_str()));
        let outcome = CallOutcome { caller, status, at };
        if let Some(trip) = self.state.trip.as_mut() {
            trip.calls.push(outcome);
        }
    }

    /// Hands each requested effect to the bridge on its own task. The
    /// result comes back through the queue; call processing never waits.
    fn dispatch_effects(&self, requested: Vec<Effect>) {
        for effect in requested {
            let bridge = Arc::clone(&self.bridge);
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let label = effect.label();
                let outcome = effects::dispatch(bridge.as_ref(), &effect).await;
                let _ = tx.send(MonitorEvent::EffectSettled { label, outcome });
            });
        }
    }

    fn arm_grace_timer(&mut self, now: DateTime<Utc>, fire_at: DateTime<Utc>, generation: u64) {
        self.cancel_grace_timer();

        let delay = (fire_at - now).to_std().unwrap_or_default();
        let tx = self.tx.clone();
        self.grace_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(MonitorEvent::GraceElapsed { generation });
        }));
    }

    fn cancel_grace_timer(&mut self) {
        if let Some(handle) = self.grace_timer.take() {
            handle.abort();
        }
    }

    fn update_settings<F>(&mut self, mutate: F, note: &str)
    where
        F: FnOnce(&mut crate::settings::Settings) -> bool,
    {
        let mut changed = false;
        let result = self.settings.update(|s| {
            changed = mutate(s);
        });
        match result {
            Ok(_) if changed => self.log_activity(Utc::now(), note.to_string()),
            Ok(_) => {}
            Err(err) => {
                // Settings keep their in-memory value; only the write failed.
                warn!("failed to persist settings: {err:#}");
                self.log_activity(Utc::now(), format!("Settings save failed: {err}"));
            }
        }
    }

    fn log_activity(&mut self, at: DateTime<Utc>, message: String) {
        self.state.activity.push(ActivityEntry { at, message });
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            mode: self.state.mode,
            trip: self.state.trip.clone(),
            active_alert: self.state.active_alert.clone(),
            activity: self.state.activity.clone(),
            trip_history: self.state.trip_history.clone(),
            settings: self.settings.current(),
        }
    }
}

pub(super) async fn monitor_loop(
    mut worker: MonitorWorker,
    mut rx: UnboundedReceiver<MonitorEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => worker.handle(event).await,
                None => break,
            }
        }
    }

    worker.cancel_grace_timer();
    info!("monitor loop shutting down");
}
