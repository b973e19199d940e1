use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::{add_seconds, elapsed_seconds, seconds_to_minutes, sub_seconds};

/// The singleton timer record. Idle is represented by the absence of a record, so a value of
/// this type is always either running or paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub domain: String,
    /// Seconds of finished segments that haven't been written to the ledger yet.
    #[serde(default)]
    pub unsaved_elapsed_seconds: u64,
    #[serde(flatten)]
    pub phase: TimerPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TimerPhase {
    #[serde(rename_all = "camelCase")]
    Running {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        start: DateTime<Utc>,
        /// Absolute deadline of the countdown.
        #[serde(with = "chrono::serde::ts_milliseconds")]
        end: DateTime<Utc>,
        /// Start of the current segment.
        #[serde(with = "chrono::serde::ts_milliseconds")]
        last_active_ts: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Paused { remaining_seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paused {
    pub record: TimerRecord,
    /// Length of the segment that was just closed.
    pub segment_elapsed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resumed {
    Running(TimerRecord),
    /// Nothing was left on the countdown, the timer goes back to idle.
    Exhausted,
}

impl TimerRecord {
    pub fn start(domain: String, duration_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            domain,
            unsaved_elapsed_seconds: 0,
            phase: TimerPhase::Running {
                start: now,
                end: add_seconds(now, duration_seconds),
                last_active_ts: now,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, TimerPhase::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, TimerPhase::Paused { .. })
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            TimerPhase::Running { end, .. } => Some(end),
            TimerPhase::Paused { .. } => None,
        }
    }

    /// Seconds left on the countdown as seen at `now`. Derived from timestamps only.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.phase {
            TimerPhase::Running { end, .. } => elapsed_seconds(now, end),
            TimerPhase::Paused { remaining_seconds } => remaining_seconds,
        }
    }

    /// Running -> Paused. The finished segment is folded into the unsaved accumulator; nothing is
    /// logged. Returns `None` when the timer isn't running.
    pub fn pause(&self, now: DateTime<Utc>) -> Option<Paused> {
        let TimerPhase::Running {
            end,
            last_active_ts,
            ..
        } = self.phase
        else {
            return None;
        };
        let segment_elapsed = elapsed_seconds(last_active_ts, now);
        Some(Paused {
            record: TimerRecord {
                domain: self.domain.clone(),
                unsaved_elapsed_seconds: self.unsaved_elapsed_seconds.saturating_add(segment_elapsed),
                phase: TimerPhase::Paused {
                    remaining_seconds: elapsed_seconds(now, end),
                },
            },
            segment_elapsed,
        })
    }

    /// Paused -> Running. Returns `None` when the timer isn't paused.
    pub fn resume(&self, now: DateTime<Utc>) -> Option<Resumed> {
        let TimerPhase::Paused { remaining_seconds } = self.phase else {
            return None;
        };
        if remaining_seconds == 0 {
            return Some(Resumed::Exhausted);
        }
        Some(Resumed::Running(TimerRecord {
            domain: self.domain.clone(),
            unsaved_elapsed_seconds: self.unsaved_elapsed_seconds,
            phase: TimerPhase::Running {
                start: now,
                end: add_seconds(now, remaining_seconds),
                last_active_ts: now,
            },
        }))
    }

    /// Origin and length of the time to log when the countdown runs out: everything unsaved
    /// plus the full final segment, attributed as if it all started at the last `start`.
    pub fn completion(&self) -> Option<(DateTime<Utc>, u64)> {
        let TimerPhase::Running { start, end, .. } = self.phase else {
            return None;
        };
        Some((
            start,
            self.unsaved_elapsed_seconds
                .saturating_add(elapsed_seconds(start, end)),
        ))
    }

    pub fn flushed(&self) -> Self {
        Self {
            unsaved_elapsed_seconds: 0,
            ..self.clone()
        }
    }
}

/// Time that was paused but not yet committed, waiting for the user to keep or drop it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsavedSegment {
    pub domain: String,
    pub elapsed_seconds: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub paused_at: DateTime<Utc>,
}

impl UnsavedSegment {
    /// Where the segment is assumed to have begun: right before the pause.
    pub fn approximate_origin(&self) -> DateTime<Utc> {
        sub_seconds(self.paused_at, self.elapsed_seconds)
    }

    pub fn minutes(&self) -> u64 {
        seconds_to_minutes(self.elapsed_seconds)
    }
}
