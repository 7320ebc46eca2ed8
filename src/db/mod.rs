use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{CallOutcome, CallStatus, CallerId, TripSession, MAX_TRIP_HISTORY};

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct TripStoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for TripStoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to trip store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join trip store thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn status_from_str(value: &str) -> Result<CallStatus> {
    match value {
        "VipIgnored" => Ok(CallStatus::VipIgnored),
        "UrgentAlert" => Ok(CallStatus::UrgentAlert),
        "Replied" => Ok(CallStatus::Replied),
        "DeclinedAndReplied" => Ok(CallStatus::DeclinedAndReplied),
        "Declined" => Ok(CallStatus::Declined),
        "Accepted" => Ok(CallStatus::Accepted),
        "Ignored" => Ok(CallStatus::Ignored),
        _ => Err(anyhow!("unknown call status '{value}'")),
    }
}

/// Persisted trip history behind a dedicated worker thread. All SQLite
/// access happens on that thread; callers await a oneshot reply.
#[derive(Clone)]
pub struct TripStore {
    inner: Arc<TripStoreInner>,
    db_path: Arc<PathBuf>,
}

impl TripStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create trip store directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("driveguard-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run trip store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Trip store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Trip store thread shutting down");
            })
            .with_context(|| "failed to spawn trip store worker thread")?;

        ready_rx
            .recv()
            .context("trip store worker exited before signaling readiness")??;

        info!("Trip store initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(TripStoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Trip store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to trip store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("trip store thread terminated unexpectedly"))?
    }

    /// Persists a completed trip with its ordered call outcomes and prunes
    /// history past the retention bound, all in one transaction.
    pub async fn insert_trip(&self, trip: &TripSession) -> Result<()> {
        let record = trip.clone();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .with_context(|| "failed to open trip insert transaction")?;

            tx.execute(
                "INSERT INTO trips (id, started_at, ended_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                ],
            )
            .with_context(|| "failed to insert trip")?;

            for (seq, call) in record.calls.iter().enumerate() {
                tx.execute(
                    "INSERT INTO trip_calls (trip_id, seq, caller, status, at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.id,
                        seq as i64,
                        call.caller.to_string(),
                        call.status.as_str(),
                        call.at.to_rfc3339(),
                    ],
                )
                .with_context(|| "failed to insert trip call outcome")?;
            }

            tx.execute(
                "DELETE FROM trips
                 WHERE id NOT IN (
                     SELECT id FROM trips
                     ORDER BY started_at DESC, rowid DESC
                     LIMIT ?1
                 )",
                params![MAX_TRIP_HISTORY as i64],
            )
            .with_context(|| "failed to prune trip history")?;

            tx.commit().with_context(|| "failed to commit trip insert")?;
            Ok(())
        })
        .await
    }

    /// Loads the retained trip history, most-recent-first. Called once at
    /// startup.
    pub async fn load_history(&self) -> Result<Vec<TripSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, started_at, ended_at
                 FROM trips
                 ORDER BY started_at DESC, rowid DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![MAX_TRIP_HISTORY as i64])?;
            let mut trips = Vec::new();
            while let Some(row) = rows.next()? {
                trips.push(TripSession {
                    id: row.get(0)?,
                    started_at: parse_datetime(&row.get::<_, String>(1)?)?,
                    ended_at: row
                        .get::<_, Option<String>>(2)?
                        .map(|s| parse_datetime(&s))
                        .transpose()?,
                    calls: Vec::new(),
                });
            }

            let mut call_stmt = conn.prepare(
                "SELECT caller, status, at
                 FROM trip_calls
                 WHERE trip_id = ?1
                 ORDER BY seq ASC",
            )?;

            for trip in &mut trips {
                let mut call_rows = call_stmt.query(params![trip.id])?;
                while let Some(row) = call_rows.next()? {
                    trip.calls.push(CallOutcome {
                        caller: CallerId::from_raw(Some(&row.get::<_, String>(0)?)),
                        status: status_from_str(&row.get::<_, String>(1)?)?,
                        at: parse_datetime(&row.get::<_, String>(2)?)?,
                    });
                }
            }

            Ok(trips)
        })
        .await
    }
}
