use chrono::{DateTime, Utc};

use crate::models::CallerId;

/// Classifier verdict for one resolved call. The two flags are mutually
/// exclusive and exhaustive: a call is either a fresh contact or an
/// urgent repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgencyResult {
    pub caller: CallerId,
    pub is_urgent: bool,
    pub is_first_contact: bool,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    caller: CallerId,
    timestamps: Vec<DateTime<Utc>>,
}

/// Per-caller call timestamps, append-only and ascending within an entry.
/// Lookup uses the same suffix-containment matching as VIP checks, so
/// `+15551234567` and `555-123-4567` share one entry. Owned explicitly by
/// the monitor and cleared only on an explicit user reset.
#[derive(Debug, Clone, Default)]
pub struct CallHistory {
    entries: Vec<HistoryEntry>,
}

impl CallHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self, caller: &CallerId) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|entry| entry.caller.matches(caller))
            .and_then(|entry| entry.timestamps.last().copied())
    }

    pub fn record(&mut self, caller: &CallerId, at: DateTime<Utc>) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.caller.matches(caller))
        {
            Some(entry) => entry.timestamps.push(at),
            None => self.entries.push(HistoryEntry {
                caller: caller.clone(),
                timestamps: vec![at],
            }),
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decides whether `caller` is a first contact or an urgent repeat, then
/// records `now` against the caller — unconditionally, including for
/// `Unknown`. Repeated withheld-id calls in quick succession therefore all
/// flag urgent even when they come from distinct people; an accepted
/// limitation of keying history by caller identity.
pub fn classify(
    history: &mut CallHistory,
    caller: &CallerId,
    now: DateTime<Utc>,
    threshold_ms: i64,
) -> UrgencyResult {
    let is_urgent = history
        .last_seen(caller)
        .map(|last| (now - last).num_milliseconds() < threshold_ms)
        .unwrap_or(false);

    history.record(caller, now);

    UrgencyResult {
        caller: caller.clone(),
        is_urgent,
        is_first_contact: !is_urgent,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_contact_is_not_urgent() {
        let mut history = CallHistory::new();
        let caller = CallerId::Known("5551234567".into());

        let result = classify(&mut history, &caller, base(), 120_000);
        assert!(!result.is_urgent);
        assert!(result.is_first_contact);
        assert_eq!(history.last_seen(&caller), Some(base()));
    }

    #[test]
    fn repeat_inside_threshold_is_urgent() {
        let mut history = CallHistory::new();
        let caller = CallerId::Known("5551234567".into());

        classify(&mut history, &caller, base(), 120_000);
        let result = classify(&mut history, &caller, base() + Duration::seconds(90), 120_000);
        assert!(result.is_urgent);
        assert!(!result.is_first_contact);
    }

    #[test]
    fn repeat_outside_threshold_is_first_contact_again() {
        let mut history = CallHistory::new();
        let caller = CallerId::Known("5551234567".into());

        classify(&mut history, &caller, base(), 120_000);
        let result = classify(&mut history, &caller, base() + Duration::seconds(150), 120_000);
        assert!(!result.is_urgent);
        assert!(result.is_first_contact);
    }

    #[test]
    fn country_code_variants_share_history() {
        let mut history = CallHistory::new();
        classify(
            &mut history,
            &CallerId::Known("+15551234567".into()),
            base(),
            120_000,
        );

        let result = classify(
            &mut history,
            &CallerId::Known("5551234567".into()),
            base() + Duration::seconds(30),
            120_000,
        );
        assert!(result.is_urgent);
    }

    #[test]
    fn unknown_callers_share_one_entry() {
        let mut history = CallHistory::new();
        classify(&mut history, &CallerId::Unknown, base(), 120_000);

        let result = classify(
            &mut history,
            &CallerId::Unknown,
            base() + Duration::seconds(60),
            120_000,
        );
        assert!(result.is_urgent);
    }

    #[test]
    fn reset_clears_all_entries() {
        let mut history = CallHistory::new();
        let caller = CallerId::Known("5551234567".into());
        classify(&mut history, &caller, base(), 120_000);

        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.last_seen(&caller), None);
    }
}
