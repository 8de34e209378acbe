use time::{Duration, OffsetDateTime};

/// Remaining-time hints from the server that differ from the local computation by more than
/// this are logged.
const HINT_TOLERANCE_SECONDS: i64 = 5;

/// Deadline of one attempt. The end instant is computed once and every reading of the
/// remaining time is derived from it and the current wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamTimer {
    started_at: OffsetDateTime,
    ends_at: OffsetDateTime,
}

impl ExamTimer {
    /// `end = start + duration`, cut short by the exam window when the window closes first.
    /// Returns `None` when the duration does not fit in a date.
    pub fn new(
        started_at: OffsetDateTime,
        duration_minutes: i64,
        window_end: Option<OffsetDateTime>,
    ) -> Option<Self> {
        let duration_deadline = duration_minutes
            .max(0)
            .checked_mul(60)
            .and_then(|seconds| started_at.checked_add(Duration::seconds(seconds)))?;
        let ends_at = match window_end {
            Some(window_end) if window_end < duration_deadline => window_end,
            _ => duration_deadline,
        };

        Some(Self { started_at, ends_at })
    }

    /// Deadline fixed by the exam window alone, for exams without a duration.
    pub fn until(started_at: OffsetDateTime, ends_at: OffsetDateTime) -> Self {
        Self { started_at, ends_at: ends_at.max(started_at) }
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn ends_at(&self) -> OffsetDateTime {
        self.ends_at
    }

    pub fn remaining_seconds(&self, now: OffsetDateTime) -> i64 {
        (self.ends_at - now).whole_seconds().max(0)
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.remaining_seconds(now) == 0
    }

    /// Compares the server's remaining-time hint against the local deadline. The hint never
    /// moves the deadline; a large gap usually means the local clock is off.
    pub fn check_hint(&self, now: OffsetDateTime, hint_seconds: Option<i64>) -> Option<i64> {
        let hint = hint_seconds?;
        let drift = self.remaining_seconds(now) - hint.max(0);
        if drift.abs() > HINT_TOLERANCE_SECONDS {
            tracing::warn!(
                local_remaining = self.remaining_seconds(now),
                server_remaining = hint,
                drift_seconds = drift,
                "Local exam deadline disagrees with server hint; check the system clock"
            );
            return Some(drift);
        }
        None
    }
}
