//! Direct edits of the ledger that don't go through the accumulator: settings, tasks, domain
//! removal and bulk clearing. All of them operate on the day record for `today`.

use std::{collections::BTreeMap, ops::Bound};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::TimerError;

use super::entities::{
    DayRecord, Ledger, MetaRecord, Task, DEFAULT_DAILY_GOAL, DEFAULT_POMODORO_MINUTES,
    MAX_DAILY_GOAL, MAX_POMODORO_MINUTES,
};

/// Writes the install timestamp once. Returns true if it was missing.
pub fn ensure_meta(ledger: &mut Ledger, now: DateTime<Utc>) -> bool {
    let meta = ledger.meta.get_or_insert_with(MetaRecord::default);
    if meta.created.is_some() {
        return false;
    }
    meta.created = Some(now);
    true
}

/// Validates and stores the default daily goal and Pomodoro length. Values above the limits are
/// rejected, non-positive values fall back to the defaults. The goal also becomes today's goal.
pub fn update_settings(
    ledger: &mut Ledger,
    today: &str,
    daily_goal: Option<i64>,
    pom_duration: Option<i64>,
) -> Result<MetaRecord, TimerError> {
    if let Some(goal) = daily_goal.filter(|goal| *goal > MAX_DAILY_GOAL) {
        return Err(TimerError::InvalidInput(format!(
            "daily goal {goal} exceeds {MAX_DAILY_GOAL} minutes"
        )));
    }
    if let Some(minutes) = pom_duration.filter(|minutes| *minutes > MAX_POMODORO_MINUTES) {
        return Err(TimerError::InvalidInput(format!(
            "pomodoro length {minutes} exceeds {MAX_POMODORO_MINUTES} minutes"
        )));
    }

    let meta = ledger.meta.get_or_insert_with(MetaRecord::default);
    if let Some(goal) = daily_goal {
        let goal = if goal <= 0 { DEFAULT_DAILY_GOAL } else { goal as u32 };
        meta.daily_goal = Some(goal);
    }
    if let Some(minutes) = pom_duration {
        let minutes = if minutes <= 0 {
            DEFAULT_POMODORO_MINUTES
        } else {
            minutes as u32
        };
        meta.pom_duration = Some(minutes);
    }
    let meta = meta.clone();

    if daily_goal.is_some() {
        ledger.day_mut(today).goal = meta.daily_goal;
    }
    Ok(meta)
}

pub fn add_task(ledger: &mut Ledger, today: &str, text: &str) -> Result<Vec<Task>, TimerError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TimerError::InvalidInput("task text is empty".into()));
    }
    let day = ledger.day_mut(today);
    day.tasks.push(Task {
        text: text.to_owned(),
        completed: false,
    });
    Ok(day.tasks.clone())
}

pub fn toggle_task(ledger: &mut Ledger, today: &str, index: usize) -> Vec<Task> {
    let Some(day) = ledger.days.get_mut(today) else {
        warn!("No record for {today}, nothing to toggle");
        return vec![];
    };
    match day.tasks.get_mut(index) {
        Some(task) => task.completed = !task.completed,
        None => warn!("Task {index} not found for {today}"),
    }
    day.tasks.clone()
}

pub fn delete_task(ledger: &mut Ledger, today: &str, index: usize) -> Vec<Task> {
    let Some(day) = ledger.days.get_mut(today) else {
        warn!("No record for {today}, nothing to delete");
        return vec![];
    };
    if index < day.tasks.len() {
        day.tasks.remove(index);
    } else {
        warn!("Task {index} not found for {today}");
    }
    day.tasks.clone()
}

/// Removes all minutes of `domain` from today. Returns the minutes removed.
pub fn delete_domain(ledger: &mut Ledger, today: &str, domain: &str) -> Option<u64> {
    let removed = ledger
        .days
        .get_mut(today)
        .and_then(|day| day.remove_domain(domain));
    match removed {
        Some(minutes) => info!("Deleted {minutes} minutes of {domain} from {today}"),
        None => warn!("Domain {domain} not found for deletion on {today}"),
    }
    removed
}

/// Replaces the ledger with an empty one that only carries a fresh install timestamp.
pub fn clear(ledger: &mut Ledger, now: DateTime<Utc>) {
    *ledger = Ledger::default();
    ensure_meta(ledger, now);
}

/// Day records with keys in `[from, to]`. Either end may be open.
pub fn export_range(
    ledger: &Ledger,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<BTreeMap<String, DayRecord>, TimerError> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(TimerError::InvalidInput(format!(
                "start date {from} is after end date {to}"
            )));
        }
    }
    let lower = from.map_or(Bound::Unbounded, Bound::Included);
    let upper = to.map_or(Bound::Unbounded, Bound::Included);
    Ok(ledger
        .days
        .range::<str, _>((lower, upper))
        .map(|(key, day)| (key.clone(), day.clone()))
        .collect())
}
