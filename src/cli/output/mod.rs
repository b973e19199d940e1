//! Terminal rendering of daemon replies.

use std::{collections::BTreeMap, io::Write};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};

use crate::{
    ledger::{
        entities::{DayRecord, MetaRecord, Task},
        stats::DaySummary,
    },
    timer::{
        request::{FullState, Response},
        state::{TimerPhase, TimerRecord, UnsavedSegment},
    },
};

pub fn print_response(response: &Response) -> Result<()> {
    match response {
        Response::Timer { timer } => println!("{}", describe_timer(timer.as_ref(), Utc::now())),
        Response::Logged { logged_minutes } => println!("Logged {logged_minutes} min"),
        Response::Staged { segment } => print_staged(segment),
        Response::Ok => println!("Done"),
        Response::FullState(state) => print_full_state(state, Utc::now()),
        Response::Settings { meta } => print_settings(meta),
        Response::Tasks { tasks } => print_tasks(tasks),
        Response::DomainDeleted { removed_minutes } => match removed_minutes {
            Some(minutes) => println!("Removed {minutes} min"),
            None => println!("Nothing to remove"),
        },
        Response::Export { days } => print_export(days)?,
        Response::Summary(summary) => print_summary(summary),
    }
    Ok(())
}

/// One line describing the timer as seen at `now`.
pub fn describe_timer(timer: Option<&TimerRecord>, now: DateTime<Utc>) -> String {
    let Some(timer) = timer else {
        return "Idle".into();
    };
    let remaining = format_duration(timer.remaining_seconds(now));
    let unsaved = if timer.unsaved_elapsed_seconds > 0 {
        format!(
            ", {} unsaved",
            format_duration(timer.unsaved_elapsed_seconds)
        )
    } else {
        String::new()
    };
    match timer.phase {
        TimerPhase::Running { end, .. } => format!(
            "Running\t{}\t{remaining} left, ends {}{unsaved}",
            timer.domain,
            end.with_timezone(&Local).format("%H:%M:%S")
        ),
        TimerPhase::Paused { .. } => {
            format!("Paused\t{}\t{remaining} left{unsaved}", timer.domain)
        }
    }
}

pub fn print_staged(segment: &UnsavedSegment) {
    println!(
        "Staged {} of {}. Keep it with `bprod commit` or drop it with `bprod discard`",
        format_duration(segment.elapsed_seconds),
        segment.domain
    );
}

fn print_full_state(state: &FullState, now: DateTime<Utc>) {
    if state.just_finished {
        println!("Pomodoro finished!");
    }
    println!("{}", describe_timer(state.timer.as_ref(), now));
    if let Some(segment) = &state.staged_segment {
        print_staged(segment);
    }
    if let Some(focus) = &state.active_focus {
        let elapsed = (now - focus.start).num_seconds().max(0) as u64;
        println!("Focus\t{}\t{}", focus.domain, format_duration(elapsed));
    }
}

fn print_settings(meta: &MetaRecord) {
    if let Some(goal) = meta.daily_goal {
        println!("Daily goal\t{goal} min");
    }
    if let Some(minutes) = meta.pom_duration {
        println!("Pomodoro\t{minutes} min");
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks");
    }
    for (index, task) in tasks.iter().enumerate() {
        let mark = if task.completed { "x" } else { " " };
        println!("{index}\t[{mark}]\t{}", task.text);
    }
}

fn print_export(days: &BTreeMap<String, DayRecord>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, days)?;
    writeln!(stdout)?;
    Ok(())
}

fn print_summary(summary: &DaySummary) {
    let percent = (summary.total_minutes * 100)
        .checked_div(u64::from(summary.goal))
        .unwrap_or(0);
    println!(
        "{}\t{} / {} min\t{percent}%",
        summary.date,
        summary.total_minutes,
        summary.goal
    );
    match summary.change_vs_previous {
        Some(change) => println!("vs previous day\t{change:+}%"),
        None => println!("vs previous day\t-"),
    }
    println!(
        "Streaks\t{} days on goal\t{} days active",
        summary.goal_streak, summary.active_streak
    );
    if summary.tasks_total > 0 {
        println!("Tasks\t{}/{}", summary.tasks_done, summary.tasks_total);
    }
    for entry in &summary.domains {
        println!("\t{}\t{}", format_duration(entry.minutes * 60), entry.domain);
    }
}

pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = seconds % 3600 / 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
