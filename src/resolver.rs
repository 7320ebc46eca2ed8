use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::models::{CallEventKind, CallerId, RawCallNotification, ResolvedCall};

/// Buffered "caller id not yet known" notification awaiting its grace
/// window. At most one exists at a time; a resolved number arriving in the
/// meantime supersedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUnresolved {
    pub scheduled_at: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
    pub generation: u64,
}

/// What the caller of `on_notification` must do next. Timer scheduling is
/// left to the event loop so this state machine stays synchronous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverAction {
    /// Deliver this resolved call to the pipeline.
    Resolve(ResolvedCall),
    /// Arm a one-shot timer that posts the generation back at `fire_at`.
    Buffer {
        fire_at: DateTime<Utc>,
        generation: u64,
    },
    /// Duplicate or non-ringing transition; nothing to do.
    Drop,
}

/// Turns the raw, noisy notification stream into at most one resolved
/// event per physical call. Telephony stacks routinely deliver a blank
/// caller id first and the real number a fraction of a second later, plus
/// duplicate ringing transitions; without this step the pipeline would
/// double-act on a single phone call.
#[derive(Debug)]
pub struct CallResolver {
    dedup_window: Duration,
    unknown_grace: Duration,
    last_resolved: Option<ResolvedCall>,
    pending: Option<PendingUnresolved>,
    generations: u64,
}

impl CallResolver {
    pub fn new(dedup_window_ms: i64, unknown_grace_ms: i64) -> Self {
        Self {
            dedup_window: Duration::milliseconds(dedup_window_ms),
            unknown_grace: Duration::milliseconds(unknown_grace_ms),
            last_resolved: None,
            pending: None,
            generations: 0,
        }
    }

    pub fn pending(&self) -> Option<&PendingUnresolved> {
        self.pending.as_ref()
    }

    pub fn on_notification(&mut self, raw: &RawCallNotification) -> ResolverAction {
        match raw.kind {
            CallEventKind::Ringing | CallEventKind::Incoming => {
                self.on_ring(raw.caller_id(), raw.at)
            }
            // The call was answered or ended before its id resolved; the
            // buffered notification must never fire.
            CallEventKind::Offhook | CallEventKind::Disconnected => {
                if self.cancel_pending() {
                    debug!("pending unresolved call cancelled by {:?}", raw.kind);
                }
                ResolverAction::Drop
            }
        }
    }

    fn on_ring(&mut self, caller: CallerId, at: DateTime<Utc>) -> ResolverAction {
        match caller {
            CallerId::Unknown => {
                if self.pending.is_some() {
                    return ResolverAction::Drop;
                }
                if self.recently_resolved(&CallerId::Unknown, at) {
                    debug!("duplicate unknown-caller transition dropped");
                    return ResolverAction::Drop;
                }
                let generation = self.next_generation();
                let fire_at = at + self.unknown_grace;
                self.pending = Some(PendingUnresolved {
                    scheduled_at: at,
                    fire_at,
                    generation,
                });
                ResolverAction::Buffer {
                    fire_at,
                    generation,
                }
            }
            known => {
                if self.pending.take().is_some() {
                    // The real number for the buffered call arrived late.
                    // It is strictly better information about the same
                    // physical call, so skip the grace window entirely.
                    debug!("late caller id {known} supersedes unknown buffer");
                    return self.resolve(known, at);
                }
                if self.recently_resolved(&known, at) {
                    debug!("duplicate transition for {known} dropped");
                    return ResolverAction::Drop;
                }
                self.resolve(known, at)
            }
        }
    }

    /// Fires the buffered unknown call. A generation that no longer
    /// matches the live buffer belongs to a cancelled timer and is a
    /// guaranteed no-op.
    pub fn on_grace_elapsed(&mut self, generation: u64) -> Option<ResolvedCall> {
        match self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                let event = ResolvedCall {
                    caller: CallerId::Unknown,
                    observed_at: pending.fire_at,
                };
                self.last_resolved = Some(event.clone());
                Some(event)
            }
            _ => None,
        }
    }

    /// Returns whether a buffer was actually discarded.
    pub fn cancel_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.last_resolved = None;
    }

    fn resolve(&mut self, caller: CallerId, at: DateTime<Utc>) -> ResolverAction {
        let event = ResolvedCall {
            caller,
            observed_at: at,
        };
        self.last_resolved = Some(event.clone());
        ResolverAction::Resolve(event)
    }

    fn recently_resolved(&self, caller: &CallerId, at: DateTime<Utc>) -> bool {
        self.last_resolved
            .as_ref()
            .map(|prev| prev.caller.matches(caller) && at - prev.observed_at < self.dedup_window)
            .unwrap_or(false)
    }

    fn next_generation(&mut self) -> u64 {
        self.generations += 1;
        self.generations
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const DEDUP_MS: i64 = 2000;
    const GRACE_MS: i64 = 800;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn ring(caller: Option<&str>, at: DateTime<Utc>) -> RawCallNotification {
        RawCallNotification {
            kind: CallEventKind::Incoming,
            caller: caller.map(str::to_string),
            at,
        }
    }

    fn resolver() -> CallResolver {
        CallResolver::new(DEDUP_MS, GRACE_MS)
    }

    #[test]
    fn duplicate_known_transitions_resolve_once() {
        let mut resolver = resolver();

        let first = resolver.on_notification(&ring(Some("5551234567"), base()));
        assert!(matches!(first, ResolverAction::Resolve(_)));

        let second = resolver.on_notification(&ring(
            Some("5551234567"),
            base() + Duration::milliseconds(500),
        ));
        assert_eq!(second, ResolverAction::Drop);
    }

    #[test]
    fn same_caller_after_window_is_a_new_call() {
        let mut resolver = resolver();
        resolver.on_notification(&ring(Some("5551234567"), base()));

        let later = resolver.on_notification(&ring(
            Some("5551234567"),
            base() + Duration::milliseconds(DEDUP_MS + 1),
        ));
        assert!(matches!(later, ResolverAction::Resolve(_)));
    }

    #[test]
    fn late_number_supersedes_unknown_buffer() {
        let mut resolver = resolver();

        let buffered = resolver.on_notification(&ring(None, base()));
        let generation = match buffered {
            ResolverAction::Buffer { generation, .. } => generation,
            other => panic!("expected buffer, got {other:?}"),
        };

        let resolved = resolver.on_notification(&ring(
            Some("+15551234567"),
            base() + Duration::milliseconds(300),
        ));
        match resolved {
            ResolverAction::Resolve(event) => {
                assert_eq!(event.caller, CallerId::Known("+15551234567".into()));
                assert_eq!(event.observed_at, base() + Duration::milliseconds(300));
            }
            other => panic!("expected resolve, got {other:?}"),
        }

        // The superseded timer firing anyway must be a no-op.
        assert_eq!(resolver.on_grace_elapsed(generation), None);
        assert!(resolver.pending().is_none());
    }

    #[test]
    fn grace_expiry_resolves_unknown_at_fire_time() {
        let mut resolver = resolver();

        let generation = match resolver.on_notification(&ring(None, base())) {
            ResolverAction::Buffer {
                fire_at,
                generation,
            } => {
                assert_eq!(fire_at, base() + Duration::milliseconds(GRACE_MS));
                generation
            }
            other => panic!("expected buffer, got {other:?}"),
        };

        let event = resolver.on_grace_elapsed(generation).expect("should fire");
        assert_eq!(event.caller, CallerId::Unknown);
        assert_eq!(event.observed_at, base() + Duration::milliseconds(GRACE_MS));

        // Firing twice for one buffer is impossible.
        assert_eq!(resolver.on_grace_elapsed(generation), None);
    }

    #[test]
    fn second_unknown_while_buffered_is_dropped() {
        let mut resolver = resolver();
        resolver.on_notification(&ring(None, base()));

        let second =
            resolver.on_notification(&ring(None, base() + Duration::milliseconds(200)));
        assert_eq!(second, ResolverAction::Drop);
    }

    #[test]
    fn unknown_rering_after_resolution_is_deduplicated() {
        let mut resolver = resolver();
        let generation = match resolver.on_notification(&ring(None, base())) {
            ResolverAction::Buffer { generation, .. } => generation,
            other => panic!("expected buffer, got {other:?}"),
        };
        resolver.on_grace_elapsed(generation).expect("should fire");

        // Another ringing transition of the same still-unresolved call.
        let rering =
            resolver.on_notification(&ring(None, base() + Duration::milliseconds(1000)));
        assert_eq!(rering, ResolverAction::Drop);
    }

    #[test]
    fn disconnect_cancels_pending_buffer() {
        let mut resolver = resolver();
        let generation = match resolver.on_notification(&ring(None, base())) {
            ResolverAction::Buffer { generation, .. } => generation,
            other => panic!("expected buffer, got {other:?}"),
        };

        let disconnect = RawCallNotification {
            kind: CallEventKind::Disconnected,
            caller: None,
            at: base() + Duration::milliseconds(400),
        };
        assert_eq!(resolver.on_notification(&disconnect), ResolverAction::Drop);
        assert_eq!(resolver.on_grace_elapsed(generation), None);
    }

    #[test]
    fn known_after_unknown_resolution_is_preferred_not_deduplicated() {
        let mut resolver = resolver();
        let generation = match resolver.on_notification(&ring(None, base())) {
            ResolverAction::Buffer { generation, .. } => generation,
            other => panic!("expected buffer, got {other:?}"),
        };
        resolver.on_grace_elapsed(generation).expect("should fire");

        // Real number arrives after the grace window already produced an
        // Unknown event: a known id never dedups against Unknown.
        let late = resolver.on_notification(&ring(
            Some("5551234567"),
            base() + Duration::milliseconds(1200),
        ));
        assert!(matches!(late, ResolverAction::Resolve(_)));
    }
}
