use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DAILY_GOAL: u32 = 150;
pub const DEFAULT_POMODORO_MINUTES: u32 = 25;
pub const MAX_DAILY_GOAL: i64 = 24 * 60;
pub const MAX_POMODORO_MINUTES: i64 = 60;

/// Domain used when a caller doesn't say where the time went.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// The whole day-keyed ledger. Stored as a single JSON object where every key is either a
/// `YYYY-MM-DD` day or `"__meta"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(rename = "__meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaRecord>,
    #[serde(flatten)]
    pub days: BTreeMap<String, DayRecord>,
}

impl Ledger {
    pub fn default_goal(&self) -> u32 {
        self.meta
            .as_ref()
            .and_then(|meta| meta.daily_goal)
            .unwrap_or(DEFAULT_DAILY_GOAL)
    }

    pub fn pomodoro_seconds(&self) -> u64 {
        let minutes = self
            .meta
            .as_ref()
            .and_then(|meta| meta.pom_duration)
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_POMODORO_MINUTES);
        u64::from(minutes) * 60
    }

    pub fn day(&self, key: &str) -> Option<&DayRecord> {
        self.days.get(key)
    }

    /// Returns the record for `key`, creating it with the default goal when missing.
    pub fn day_mut(&mut self, key: &str) -> &mut DayRecord {
        let goal = self.default_goal();
        self.days
            .entry(key.to_owned())
            .or_insert_with(|| DayRecord::new(goal))
    }

    /// Goal that applies to a day: its own, else the process-wide default.
    pub fn goal_for(&self, day: &DayRecord) -> u32 {
        day.goal.unwrap_or_else(|| self.default_goal())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_goal: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pom_duration: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    #[serde(default)]
    pub total_minutes: u64,
    #[serde(default)]
    pub domains: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<u32>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl DayRecord {
    pub fn new(goal: u32) -> Self {
        Self {
            goal: Some(goal),
            ..Default::default()
        }
    }

    /// The only way minutes enter a day. Keeps `total_minutes` equal to the sum of `domains`.
    pub fn add_minutes(&mut self, domain: &str, minutes: u64) {
        *self.domains.entry(domain.to_owned()).or_default() += minutes;
        self.total_minutes += minutes;
    }

    /// Removes a domain and its minutes from the total. Returns the removed minutes.
    pub fn remove_domain(&mut self, domain: &str) -> Option<u64> {
        let minutes = self.domains.remove(domain)?;
        self.total_minutes = self.total_minutes.saturating_sub(minutes);
        Some(minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// Free-running focus measurement, separate from the Pomodoro timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFocus {
    pub domain: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
}
