//! The Pomodoro timer: a state machine over a singleton record (idle, running, paused), the
//! staging slot for paused time the user hasn't decided on yet, focus sessions and the recovery
//! paths run when the daemon stops or starts.
//!
//! [service::TimerService] is the only writer of the timer record. It must be driven from one
//! task at a time; the daemon's event loop does that.

pub mod deadline;
pub mod focus;
pub mod recovery;
pub mod request;
pub mod service;
pub mod staging;
pub mod state;

#[cfg(test)]
pub mod test_support {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    use crate::{
        ledger::{repository::LedgerRepository, store::FileBlobStore},
        utils::clock::test_clock::TestClock,
    };

    use super::{
        deadline::{MockDeadlineScheduler, MockNotificationSink},
        service::TimerService,
    };

    /// Local zone used by timer tests, five hours behind UTC.
    pub fn zone() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    /// Local wall time on the given day of November 2024.
    pub fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        zone()
            .with_ymd_and_hms(2024, 11, day, hour, minute, second)
            .unwrap()
            .with_timezone(&Utc)
    }

    /// A file store in a temporary directory plus a shared test clock. Services built from it see
    /// the same records.
    pub struct TestService {
        pub dir: TempDir,
        pub clock: TestClock,
    }

    impl TestService {
        pub fn new(now: DateTime<Utc>) -> Result<Self> {
            *crate::utils::logging::TEST_LOGGING;
            Ok(Self {
                dir: tempdir()?,
                clock: TestClock::new(now),
            })
        }

        pub fn repository(&self) -> LedgerRepository {
            LedgerRepository::new(
                FileBlobStore::new(self.dir.path().join("store")).expect("store dir"),
            )
        }

        pub fn build(
            &self,
            scheduler: MockDeadlineScheduler,
            notifier: MockNotificationSink,
        ) -> TimerService<FixedOffset> {
            TimerService::new(
                self.repository(),
                Arc::new(self.clock.clone()),
                zone(),
                Box::new(scheduler),
                Box::new(notifier),
            )
        }

        /// Scheduler and notifier accept any number of calls.
        pub fn relaxed(&self) -> TimerService<FixedOffset> {
            let mut scheduler = MockDeadlineScheduler::new();
            scheduler.expect_schedule().return_const(());
            scheduler.expect_cancel().return_const(());
            let mut notifier = MockNotificationSink::new();
            notifier.expect_pomodoro_finished().return_const(());
            self.build(scheduler, notifier)
        }

        /// Scheduler must see exactly `schedules` and `cancels` calls, the notifier none.
        pub fn strict(&self, schedules: usize, cancels: usize) -> TimerService<FixedOffset> {
            let mut scheduler = MockDeadlineScheduler::new();
            scheduler
                .expect_schedule()
                .times(schedules)
                .return_const(());
            scheduler.expect_cancel().times(cancels).return_const(());
            self.build(scheduler, MockNotificationSink::new())
        }
    }
}
