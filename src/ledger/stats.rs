use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::utils::time::day_key;

use super::entities::{DayRecord, Ledger};

const MAX_STREAK_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMinutes {
    pub domain: String,
    pub minutes: u64,
}

/// Everything a day view shows about one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total_minutes: u64,
    pub goal: u32,
    /// Domains sorted by minutes, largest first.
    pub domains: Vec<DomainMinutes>,
    pub tasks_done: usize,
    pub tasks_total: usize,
    /// Consecutive days ending at `date` that reached their goal.
    pub goal_streak: u32,
    /// Consecutive days ending at `date` with any logged time.
    pub active_streak: u32,
    /// Percent change of total minutes against the previous day.
    pub change_vs_previous: Option<i64>,
}

pub fn summarize(ledger: &Ledger, date: NaiveDate) -> DaySummary {
    let day = ledger.day(&day_key(date));

    let mut domains = day
        .map(|day| {
            day.domains
                .iter()
                .map(|(domain, minutes)| DomainMinutes {
                    domain: domain.clone(),
                    minutes: *minutes,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    domains.sort_by(|a, b| b.minutes.cmp(&a.minutes).then_with(|| a.domain.cmp(&b.domain)));

    let (goal_streak, active_streak) = match day {
        Some(_) => (
            streak(ledger, date, |day| day.total_minutes >= u64::from(ledger.goal_for(day))),
            streak(ledger, date, |day| day.total_minutes > 0),
        ),
        None => (0, 0),
    };

    DaySummary {
        date,
        total_minutes: day.map_or(0, |day| day.total_minutes),
        goal: day.map_or_else(|| ledger.default_goal(), |day| ledger.goal_for(day)),
        domains,
        tasks_done: day.map_or(0, |day| day.tasks.iter().filter(|t| t.completed).count()),
        tasks_total: day.map_or(0, |day| day.tasks.len()),
        goal_streak,
        active_streak,
        change_vs_previous: change_vs_previous(ledger, date, day),
    }
}

/// Counts days backwards from `date` while records exist and satisfy `counts`.
fn streak(ledger: &Ledger, date: NaiveDate, counts: impl Fn(&DayRecord) -> bool) -> u32 {
    let mut streak = 0;
    let mut current = date;
    while streak < MAX_STREAK_DAYS {
        match ledger.day(&day_key(current)) {
            Some(day) if counts(day) => streak += 1,
            _ => break,
        }
        let Some(previous) = current.checked_sub_days(Days::new(1)) else {
            break;
        };
        current = previous;
    }
    streak
}

fn change_vs_previous(ledger: &Ledger, date: NaiveDate, day: Option<&DayRecord>) -> Option<i64> {
    let day = day?;
    let previous = date
        .checked_sub_days(Days::new(1))
        .and_then(|previous| ledger.day(&day_key(previous)));
    let total = day.total_minutes as i64;
    match previous {
        Some(previous) if previous.total_minutes > 0 => {
            let diff = total - previous.total_minutes as i64;
            Some((diff as f64 * 100. / previous.total_minutes as f64 + 0.5).floor() as i64)
        }
        Some(_) => Some(if total > 0 { 100 } else { 0 }),
        None if total > 0 => Some(100),
        None => None,
    }
}
