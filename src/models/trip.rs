use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::call::CallOutcome;

/// Completed trips kept in history, most-recent-first. Oldest entries are
/// evicted past this bound.
pub const MAX_TRIP_HISTORY: usize = 20;

/// One continuous interval of driving mode, bounding a set of call outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub calls: Vec<CallOutcome>,
}

impl TripSession {
    pub fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at,
            ended_at: None,
            calls: Vec::new(),
        }
    }

    pub fn complete(&mut self, ended_at: DateTime<Utc>) {
        self.ended_at = Some(ended_at);
    }
}

/// Line in the live display log shown while driving; cleared on each
/// trip start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}
