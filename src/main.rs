use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::info;

use driveguard::{
    CallEventKind, DeviceBridge, DispatchError, DriveMonitor, MonitorConfig, RawCallNotification,
    SettingsStore, TripStore,
};

/// Bridge that only logs what the engine asked for. Stands in for the
/// platform SMS/telecom/speech collaborators during simulation.
struct ConsoleBridge;

#[async_trait]
impl DeviceBridge for ConsoleBridge {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), DispatchError> {
        info!("[bridge] SMS to {to}: {body}");
        Ok(())
    }

    async fn decline_call(&self) -> Result<(), DispatchError> {
        info!("[bridge] decline call");
        Ok(())
    }

    async fn accept_call(&self) -> Result<(), DispatchError> {
        info!("[bridge] accept call");
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<(), DispatchError> {
        info!("[bridge] speak: {text}");
        Ok(())
    }

    async fn capture_voice(&self) -> Result<(), DispatchError> {
        info!("[bridge] listening for a voice command");
        Ok(())
    }

    async fn local_alert(&self, caller: &str) -> Result<(), DispatchError> {
        info!("[bridge] URGENT alert: {caller}");
        Ok(())
    }

    async fn vibrate(&self, pattern: &[u64]) -> Result<(), DispatchError> {
        info!("[bridge] vibrate {pattern:?}");
        Ok(())
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), DispatchError> {
        info!("[bridge] notification: {title} — {body}");
        Ok(())
    }
}

fn ring(caller: Option<&str>) -> RawCallNotification {
    RawCallNotification {
        kind: CallEventKind::Incoming,
        caller: caller.map(str::to_string),
        at: Utc::now(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let data_dir = std::env::temp_dir().join("driveguard-sim");
    std::fs::create_dir_all(&data_dir)?;

    let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
    let store = TripStore::new(data_dir.join("trips.sqlite3"))?;
    let monitor = DriveMonitor::start(
        MonitorConfig::default(),
        settings,
        store,
        Arc::new(ConsoleBridge),
    )
    .await?;

    info!("--- simulated trip starting ---");
    monitor.start_driving();

    // First contact: one call ringing twice. Only one auto-reply goes out.
    monitor.notify_call(ring(Some("+1 (987) 654-3210")));
    tokio::time::sleep(Duration::from_millis(300)).await;
    monitor.notify_call(ring(Some("9876543210")));

    // A caller whose id arrives a beat after the first ring.
    tokio::time::sleep(Duration::from_secs(3)).await;
    monitor.notify_call(ring(None));
    tokio::time::sleep(Duration::from_millis(250)).await;
    monitor.notify_call(ring(Some("5551234567")));

    // A withheld id that never resolves; the grace window runs out.
    tokio::time::sleep(Duration::from_secs(3)).await;
    monitor.notify_call(ring(None));
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // The first caller tries again inside the urgency window.
    monitor.notify_call(ring(Some("9876543210")));
    tokio::time::sleep(Duration::from_millis(200)).await;

    monitor.stop_driving();

    let snapshot = monitor.snapshot().await?;
    info!("--- trip complete ---");
    if let Some(trip) = snapshot.trip_history.first() {
        for outcome in &trip.calls {
            info!("  {} -> {}", outcome.caller, outcome.status.as_str());
        }
    }
    info!("{} trip(s) in history", snapshot.trip_history.len());

    monitor.shutdown().await?;
    Ok(())
}
