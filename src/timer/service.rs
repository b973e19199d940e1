use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{TimerError, NO_PAUSED_TIMER},
    ledger::{
        accumulator::add_elapsed,
        editing,
        entities::{Ledger, Task, UNKNOWN_DOMAIN},
        repository::LedgerRepository,
        stats,
    },
    utils::{
        clock::Clock,
        time::{day_key, seconds_to_minutes, sub_seconds},
    },
};

use super::{
    deadline::{DeadlineScheduler, NotificationSink},
    request::{FullState, Request, Response},
    state::{Resumed, TimerRecord},
};

/// Longest countdown a client may request.
pub const MAX_TIMER_SECONDS: u64 = 24 * 60 * 60;

/// The timer state machine. Owns nothing but handles: the timer itself lives in the store and is
/// re-read on every action, so a failed write leaves the previous state in place.
///
/// Calls must be serialized by the owner; two actions running at the same time would race on the
/// timer record.
pub struct TimerService<Tz: TimeZone = Local> {
    repository: LedgerRepository,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    scheduler: Box<dyn DeadlineScheduler>,
    notifier: Box<dyn NotificationSink>,
}

impl<Tz: TimeZone> TimerService<Tz> {
    pub fn new(
        repository: LedgerRepository,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        scheduler: Box<dyn DeadlineScheduler>,
        notifier: Box<dyn NotificationSink>,
    ) -> Self {
        Self {
            repository,
            clock,
            timezone,
            scheduler,
            notifier,
        }
    }

    pub fn repository(&self) -> &LedgerRepository {
        &self.repository
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    pub(super) fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.timezone).date_naive()
    }

    pub(super) fn scheduler(&mut self) -> &mut dyn DeadlineScheduler {
        self.scheduler.as_mut()
    }

    /// Logs `seconds` of `domain` starting at `origin`, split by local day.
    pub(super) async fn log_elapsed(
        &self,
        domain: &str,
        origin: DateTime<Utc>,
        elapsed: u64,
    ) -> Result<u64, TimerError> {
        Ok(add_elapsed(&self.repository, domain, origin, elapsed, &self.timezone).await?)
    }

    #[instrument(skip(self))]
    pub async fn handle(&mut self, request: Request) -> Result<Response, TimerError> {
        match request {
            Request::StartOrToggle {
                domain,
                duration_seconds,
            } => self
                .start_or_toggle(domain, duration_seconds)
                .await
                .map(|timer| Response::Timer { timer }),
            Request::Save => self
                .save()
                .await
                .map(|logged_minutes| Response::Logged { logged_minutes }),
            Request::Reset => self.reset().await.map(|_| Response::Timer { timer: None }),
            Request::PauseAndStage => self
                .pause_and_stage()
                .await
                .map(|segment| Response::Staged { segment }),
            Request::SurfaceClosed => {
                self.on_surface_closed().await;
                Ok(Response::Ok)
            }
            Request::CommitStaged => self
                .commit_staged()
                .await
                .map(|logged_minutes| Response::Logged { logged_minutes }),
            Request::DiscardStaged => self.discard_staged().await.map(|_| Response::Ok),
            Request::GetFullState => self.full_state().await.map(Response::FullState),
            Request::FocusStart { domain } => self.focus_start(domain).await.map(|_| Response::Ok),
            Request::FocusStop => self
                .focus_stop()
                .await
                .map(|logged_minutes| Response::Logged { logged_minutes }),
            Request::UpdateSettings {
                daily_goal,
                pom_duration,
            } => {
                let today = day_key(self.today());
                self.repository
                    .try_update_ledger(|ledger| {
                        editing::update_settings(ledger, &today, daily_goal, pom_duration)
                    })
                    .await
                    .map(|meta| Response::Settings { meta })
            }
            Request::AddTask { text } => {
                let today = day_key(self.today());
                self.repository
                    .try_update_ledger(|ledger| editing::add_task(ledger, &today, &text))
                    .await
                    .map(|tasks| Response::Tasks { tasks })
            }
            Request::ToggleTask { index } => self
                .edit_tasks(|ledger, today| editing::toggle_task(ledger, today, index))
                .await
                .map(|tasks| Response::Tasks { tasks }),
            Request::DeleteTask { index } => self
                .edit_tasks(|ledger, today| editing::delete_task(ledger, today, index))
                .await
                .map(|tasks| Response::Tasks { tasks }),
            Request::DeleteDomain { domain } => {
                let today = day_key(self.today());
                let removed_minutes = self
                    .repository
                    .update_ledger(|ledger| editing::delete_domain(ledger, &today, &domain))
                    .await?;
                Ok(Response::DomainDeleted { removed_minutes })
            }
            Request::ClearData => {
                let now = self.now();
                self.repository
                    .update_ledger(|ledger| editing::clear(ledger, now))
                    .await?;
                info!("Cleared all ledger data");
                Ok(Response::Ok)
            }
            Request::Export { from, to } => {
                let ledger = self.repository.ledger().await?;
                let from = from.map(day_key);
                let to = to.map(day_key);
                editing::export_range(&ledger, from.as_deref(), to.as_deref())
                    .map(|days| Response::Export { days })
            }
            Request::Summary { date } => {
                let date = date.unwrap_or_else(|| self.today());
                let ledger = self.repository.ledger().await?;
                Ok(Response::Summary(stats::summarize(&ledger, date)))
            }
        }
    }

    async fn edit_tasks(
        &self,
        f: impl FnOnce(&mut Ledger, &str) -> Vec<Task>,
    ) -> Result<Vec<Task>, TimerError> {
        let today = day_key(self.today());
        Ok(self
            .repository
            .update_ledger(|ledger| f(ledger, &today))
            .await?)
    }

    /// Idle -> Running, Running -> Paused, Paused -> Running (or Idle when nothing is left).
    pub async fn start_or_toggle(
        &mut self,
        domain: Option<String>,
        duration_seconds: Option<u64>,
    ) -> Result<Option<TimerRecord>, TimerError> {
        let now = self.now();
        if let Some(duration) = duration_seconds.filter(|seconds| *seconds > MAX_TIMER_SECONDS) {
            return Err(TimerError::InvalidInput(format!(
                "timer length {duration}s exceeds {MAX_TIMER_SECONDS}s"
            )));
        }
        let Some(timer) = self.repository.timer().await? else {
            let duration = match duration_seconds.filter(|seconds| *seconds > 0) {
                Some(duration) => duration,
                None => self.repository.ledger().await?.pomodoro_seconds(),
            };
            let domain = domain
                .filter(|domain| !domain.is_empty())
                .unwrap_or_else(|| UNKNOWN_DOMAIN.to_owned());
            let timer = TimerRecord::start(domain, duration, now);
            self.repository.save_timer(&timer).await?;
            if let Some(end) = timer.deadline() {
                self.scheduler.schedule(end);
            }
            info!("Started {duration}s timer for {}", timer.domain);
            return Ok(Some(timer));
        };

        if let Some(paused) = timer.pause(now) {
            self.repository.save_timer(&paused.record).await?;
            self.scheduler.cancel();
            info!(
                "Paused timer after {}s segment, {}s unsaved",
                paused.segment_elapsed, paused.record.unsaved_elapsed_seconds
            );
            return Ok(Some(paused.record));
        }

        match timer.resume(now) {
            Some(Resumed::Running(running)) => {
                self.repository.save_timer(&running).await?;
                if let Some(end) = running.deadline() {
                    self.scheduler.schedule(end);
                }
                info!("Resumed timer for {}", running.domain);
                Ok(Some(running))
            }
            Some(Resumed::Exhausted) | None => {
                self.repository.clear_timer().await?;
                self.scheduler.cancel();
                if timer.unsaved_elapsed_seconds > 0 {
                    warn!(
                        "Timer had no time left, dropped {}s of unsaved time",
                        timer.unsaved_elapsed_seconds
                    );
                }
                Ok(None)
            }
        }
    }

    /// Logs the unsaved time of a paused timer and keeps it paused.
    pub async fn save(&mut self) -> Result<u64, TimerError> {
        let timer = self
            .repository
            .timer()
            .await?
            .filter(TimerRecord::is_paused)
            .ok_or(TimerError::InvalidTransition(NO_PAUSED_TIMER))?;
        let now = self.now();
        self.flush_paused(&timer, now).await
    }

    /// Writes a paused timer's unsaved seconds to the ledger as if they ended at `now`, then
    /// zeroes the accumulator. Returns the minutes logged.
    pub(super) async fn flush_paused(
        &self,
        timer: &TimerRecord,
        now: DateTime<Utc>,
    ) -> Result<u64, TimerError> {
        let elapsed = timer.unsaved_elapsed_seconds;
        if !timer.is_paused() || elapsed == 0 {
            return Ok(0);
        }
        // The boundaries of the individual segments aren't kept, so they are treated as one
        // block that ended right now.
        self.log_elapsed(&timer.domain, sub_seconds(now, elapsed), elapsed)
            .await?;
        self.repository.save_timer(&timer.flushed()).await?;
        let minutes = seconds_to_minutes(elapsed);
        info!("Flushed {elapsed}s ({minutes} min) of {}", timer.domain);
        Ok(minutes)
    }

    /// Back to idle from any state. Unsaved time is dropped, not logged. The pending deadline is
    /// only cancelled once the record is gone, a failed reset keeps a running timer armed.
    pub async fn reset(&mut self) -> Result<(), TimerError> {
        match self.repository.timer().await {
            Ok(Some(timer)) if timer.unsaved_elapsed_seconds > 0 => warn!(
                "Reset dropped {}s of unsaved {} time",
                timer.unsaved_elapsed_seconds, timer.domain
            ),
            Ok(_) => (),
            Err(e) => debug!("Couldn't inspect timer before reset {e}"),
        }
        self.repository.clear_timer().await?;
        self.scheduler.cancel();
        Ok(())
    }

    /// Natural end of the countdown scheduled for `deadline`. Triggers that don't match the live
    /// timer are ignored.
    ///
    /// There is no automatic retry when the store fails here. The record stays running with a
    /// deadline in the past: the next startup completes it, and until then the user can still
    /// pause and save it.
    pub async fn deadline_fired(&mut self, deadline: DateTime<Utc>) -> Result<(), TimerError> {
        let Some(timer) = self.repository.timer().await? else {
            debug!("Deadline {deadline} fired without a timer");
            return Ok(());
        };
        let Some((origin, elapsed)) = timer.completion() else {
            debug!("Deadline {deadline} fired for a paused timer");
            return Ok(());
        };
        if timer.deadline() != Some(deadline) {
            debug!("Ignoring stale deadline {deadline}");
            return Ok(());
        }

        self.log_elapsed(&timer.domain, origin, elapsed).await?;
        self.repository.clear_timer().await?;
        if let Err(e) = self.repository.mark_just_finished().await {
            warn!("Failed to record finished flag {e}");
        }
        let minutes = seconds_to_minutes(elapsed);
        info!("Pomodoro for {} finished, logged {minutes} min", timer.domain);
        self.notifier.pomodoro_finished(&timer.domain, minutes);
        Ok(())
    }

    pub async fn full_state(&self) -> Result<FullState, TimerError> {
        let now = self.now();
        let ledger = self.repository.ledger().await?;
        let timer = self.repository.timer().await?;
        let staged_segment = self.repository.staged_segment().await?;
        let active_focus = self.repository.active_focus().await?;
        let just_finished = self.repository.take_just_finished().await?;
        Ok(FullState {
            ledger,
            remaining_seconds: timer.as_ref().map(|timer| timer.remaining_seconds(now)),
            timer,
            staged_segment,
            active_focus,
            just_finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::Duration;
    use mockall::predicate::eq;

    use crate::{
        error::{StorageError, TimerError, NO_PAUSED_TIMER},
        ledger::{
            repository::{LedgerRepository, TIMER_KEY},
            store::MockBlobStore,
        },
        timer::{
            deadline::{MockDeadlineScheduler, MockNotificationSink},
            request::{Request, Response},
            state::TimerRecord,
            test_support::{at, zone, TestService},
        },
    };

    use super::{TimerService, MAX_TIMER_SECONDS};

    #[tokio::test]
    async fn test_full_pomodoro_logs_its_length() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut scheduler = MockDeadlineScheduler::new();
        scheduler
            .expect_schedule()
            .with(eq(at(3, 10, 25, 0)))
            .times(1)
            .return_const(());
        let mut notifier = MockNotificationSink::new();
        notifier
            .expect_pomodoro_finished()
            .with(eq("github.com"), eq(25))
            .times(1)
            .return_const(());
        let mut service = test.build(scheduler, notifier);

        service
            .start_or_toggle(Some("github.com".into()), Some(1500))
            .await?;
        test.clock.advance(Duration::seconds(1500));
        service.deadline_fired(at(3, 10, 25, 0)).await?;

        let ledger = service.repository().ledger().await?;
        let day = ledger.day("2024-11-03").unwrap();
        assert_eq!(day.domains["github.com"], 25);
        assert_eq!(day.total_minutes, 25);

        let state = service.full_state().await?;
        assert_eq!(state.timer, None);
        assert!(state.just_finished);
        assert!(!service.full_state().await?.just_finished);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_before_midnight() -> Result<()> {
        let test = TestService::new(at(2, 23, 50, 0))?;
        let mut service = test.relaxed();

        service.start_or_toggle(Some("x".into()), Some(1500)).await?;
        test.clock.advance(Duration::seconds(30));
        let paused = service.start_or_toggle(None, None).await?.unwrap();
        assert!(paused.is_paused());

        assert_eq!(service.save().await?, 1);
        let ledger = service.repository().ledger().await?;
        assert_eq!(ledger.day("2024-11-02").unwrap().domains["x"], 1);
        assert!(ledger.day("2024-11-03").is_none());

        let timer = service.repository().timer().await?.unwrap();
        assert!(timer.is_paused());
        assert_eq!(timer.unsaved_elapsed_seconds, 0);
        assert_eq!(timer.remaining_seconds(at(3, 0, 0, 0)), 1470);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_needs_paused_timer() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();
        assert!(matches!(
            service.save().await,
            Err(TimerError::InvalidTransition(NO_PAUSED_TIMER))
        ));

        service.start_or_toggle(None, Some(600)).await?;
        assert!(matches!(
            service.save().await,
            Err(TimerError::InvalidTransition(NO_PAUSED_TIMER))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_save_with_nothing_unsaved_writes_nothing() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();

        service.start_or_toggle(Some("x".into()), Some(600)).await?;
        service.start_or_toggle(None, None).await?;
        assert_eq!(service.save().await?, 0);
        assert!(service.repository().ledger().await?.days.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_drops_unsaved_time() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        // Start schedules; pause, reset and the second reset cancel.
        let mut service = test.strict(1, 3);

        service.start_or_toggle(Some("x".into()), Some(1500)).await?;
        test.clock.advance(Duration::seconds(400));
        service.start_or_toggle(None, None).await?;
        service.reset().await?;

        assert_eq!(service.repository().timer().await?, None);
        assert!(service.repository().ledger().await?.days.is_empty());

        service.reset().await?;
        assert_eq!(service.repository().timer().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_resume_with_nothing_left_goes_idle() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();

        service.start_or_toggle(Some("x".into()), Some(60)).await?;
        test.clock.advance(Duration::seconds(90));
        let paused = service.start_or_toggle(None, None).await?.unwrap();
        assert_eq!(paused.unsaved_elapsed_seconds, 90);

        assert_eq!(service.start_or_toggle(None, None).await?, None);
        assert_eq!(service.repository().timer().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_deadline_is_ignored() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut notifier = MockNotificationSink::new();
        notifier
            .expect_pomodoro_finished()
            .times(1)
            .return_const(());
        let mut scheduler = MockDeadlineScheduler::new();
        scheduler.expect_schedule().times(2).return_const(());
        scheduler.expect_cancel().times(1).return_const(());
        let mut service = test.build(scheduler, notifier);

        service.start_or_toggle(Some("x".into()), Some(600)).await?;
        let first_deadline = at(3, 10, 10, 0);
        test.clock.advance(Duration::seconds(100));
        service.start_or_toggle(None, None).await?;
        test.clock.advance(Duration::seconds(200));
        let resumed = service.start_or_toggle(None, None).await?.unwrap();
        let second_deadline = resumed.deadline().unwrap();
        assert_eq!(second_deadline, at(3, 10, 13, 20));

        service.deadline_fired(first_deadline).await?;
        assert!(service.repository().timer().await?.is_some());
        assert!(service.repository().ledger().await?.days.is_empty());

        test.clock.set(second_deadline);
        service.deadline_fired(second_deadline).await?;
        service.deadline_fired(second_deadline).await?;

        // 100s before the pause plus the 500s final segment.
        let ledger = service.repository().ledger().await?;
        assert_eq!(ledger.day("2024-11-03").unwrap().domains["x"], 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_defaults_from_settings() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();

        service
            .handle(Request::UpdateSettings {
                daily_goal: None,
                pom_duration: Some(30),
            })
            .await?;
        let timer = service.start_or_toggle(Some(String::new()), None).await?.unwrap();
        assert_eq!(timer.domain, "unknown");
        assert_eq!(timer.deadline(), Some(at(3, 10, 30, 0)));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_trigger() {
        let mut store = MockBlobStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_set()
            .returning(|_, _| Err(StorageError::Unavailable("quota".into())));
        let mut scheduler = MockDeadlineScheduler::new();
        scheduler.expect_schedule().never();
        let test_clock = crate::utils::clock::test_clock::TestClock::new(at(3, 10, 0, 0));
        let mut service = TimerService::new(
            LedgerRepository::new(store),
            Arc::new(test_clock),
            zone(),
            Box::new(scheduler),
            Box::new(MockNotificationSink::new()),
        );

        let result = service.start_or_toggle(Some("x".into()), Some(60)).await;
        assert!(matches!(result, Err(TimerError::Storage(_))));
    }

    #[tokio::test]
    async fn test_oversized_length_is_rejected() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.strict(0, 0);

        for length in [MAX_TIMER_SECONDS + 1, 10_000_000_000_000, u64::MAX] {
            let result = service.start_or_toggle(Some("x".into()), Some(length)).await;
            assert!(matches!(result, Err(TimerError::InvalidInput(_))));
        }
        assert_eq!(service.repository().timer().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_deadline_armed() -> Result<()> {
        let running = TimerRecord::start("x".into(), 1500, at(3, 10, 0, 0));
        let raw = serde_json::to_string(&running)?;
        let mut store = MockBlobStore::new();
        store
            .expect_get()
            .returning(move |key| Ok((key == TIMER_KEY).then(|| raw.clone())));
        store
            .expect_remove()
            .returning(|_| Err(StorageError::Unavailable("quota".into())));
        let mut scheduler = MockDeadlineScheduler::new();
        scheduler.expect_cancel().never();
        let test_clock = crate::utils::clock::test_clock::TestClock::new(at(3, 10, 5, 0));
        let mut service = TimerService::new(
            LedgerRepository::new(store),
            Arc::new(test_clock),
            zone(),
            Box::new(scheduler),
            Box::new(MockNotificationSink::new()),
        );

        let result = service.reset().await;
        assert!(matches!(result, Err(TimerError::Storage(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_task_requests_edit_today() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();

        service
            .handle(Request::AddTask {
                text: "review".into(),
            })
            .await?;
        let Response::Tasks { tasks } = service.handle(Request::ToggleTask { index: 0 }).await?
        else {
            panic!("expected tasks");
        };
        assert!(tasks[0].completed);

        let ledger = service.repository().ledger().await?;
        assert_eq!(ledger.day("2024-11-03").unwrap().tasks.len(), 1);
        Ok(())
    }
}
