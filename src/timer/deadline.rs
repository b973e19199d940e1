use chrono::{DateTime, Utc};

/// One-shot trigger for the end of a running countdown. At most one trigger is pending: a new
/// `schedule` replaces the previous one. `cancel` must be called on every transition away from
/// running, a trigger left behind fires against superseded state.
#[cfg_attr(test, mockall::automock)]
pub trait DeadlineScheduler: Send {
    fn schedule(&mut self, at: DateTime<Utc>);

    fn cancel(&mut self);
}

/// Side effect of a Pomodoro running out (sound and message).
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send {
    fn pomodoro_finished(&self, domain: &str, logged_minutes: u64);
}
