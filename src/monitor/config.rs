/// Tunable windows for call-event arbitration. The defaults were chosen
/// to absorb the notification jitter real telephony stacks produce.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Two ringing notifications for one caller inside this window are
    /// transitions of the same physical call.
    pub dedup_window_ms: i64,

    /// How long to hold a withheld-id notification before treating the
    /// caller as genuinely unknown.
    pub unknown_grace_ms: i64,

    /// A repeat call from the same caller inside this window counts as
    /// urgent.
    pub urgency_threshold_ms: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 2_000,
            unknown_grace_ms: 800,
            urgency_threshold_ms: 120_000, // 2 minutes
        }
    }
}
