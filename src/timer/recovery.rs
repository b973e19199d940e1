//! Reactions to the process around the timer going away or coming back.
//!
//! None of these raise: they run on paths where there is nobody to report an error to, so
//! failures are logged and the remaining steps still run.

use chrono::TimeZone;
use tracing::{debug, error, info, warn};

use crate::{error::TimerError, ledger::editing};

use super::service::TimerService;

impl<Tz: TimeZone> TimerService<Tz> {
    /// The daemon is shutting down. A running timer is paused and everything unsaved is written
    /// straight to the ledger, an active focus session is stopped and logged.
    pub async fn on_teardown(&mut self) {
        self.scheduler().cancel();
        let now = self.now();

        match self.repository().timer().await {
            Ok(Some(timer)) => {
                let timer = match timer.pause(now) {
                    Some(paused) => match self.repository().save_timer(&paused.record).await {
                        Ok(()) => paused.record,
                        Err(e) => {
                            error!("Failed to pause timer on teardown {e}");
                            paused.record
                        }
                    },
                    None => timer,
                };
                match self.flush_paused(&timer, now).await {
                    Ok(0) => debug!("Nothing unsaved on teardown"),
                    Ok(minutes) => info!("Teardown logged {minutes} min of {}", timer.domain),
                    Err(e) => error!("Failed to flush timer on teardown {e}"),
                }
            }
            Ok(None) => (),
            Err(e) => error!("Failed to read timer on teardown {e}"),
        }

        match self.focus_stop().await {
            Ok(minutes) => info!("Teardown stopped focus, logged {minutes} min"),
            Err(TimerError::InvalidTransition(_)) => (),
            Err(e) => error!("Failed to stop focus on teardown {e}"),
        }
    }

    /// The surface showing the timer was closed. Unlike teardown, unsaved time goes to the stage
    /// and waits for the user instead of being logged.
    pub async fn on_surface_closed(&mut self) {
        match self.pause_and_stage().await {
            Ok(segment) => info!(
                "Surface closed, staged {}s of {}",
                segment.elapsed_seconds, segment.domain
            ),
            Err(TimerError::InvalidTransition(reason)) => {
                debug!("Surface closed with nothing to stage: {reason}")
            }
            Err(e) => error!("Failed to stage on surface close {e}"),
        }
    }

    /// The daemon came up. Leftovers of a previous run are settled: a paused timer with unsaved
    /// time is flushed, a running timer gets its deadline back or completes if it already passed.
    pub async fn on_startup(&mut self) {
        let now = self.now();
        match self
            .repository()
            .update_ledger(|ledger| editing::ensure_meta(ledger, now))
            .await
        {
            Ok(true) => info!("Initialized ledger metadata"),
            Ok(false) => (),
            Err(e) => error!("Failed to initialize ledger metadata {e}"),
        }

        let timer = match self.repository().timer().await {
            Ok(Some(timer)) => timer,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to read timer on startup {e}");
                return;
            }
        };

        if let Some(end) = timer.deadline() {
            if end <= now {
                info!("Timer for {} ran out while stopped", timer.domain);
                if let Err(e) = self.deadline_fired(end).await {
                    error!("Failed to complete overdue timer {e}");
                }
            } else {
                debug!("Re-arming deadline {end}");
                self.scheduler().schedule(end);
            }
            return;
        }

        match self.flush_paused(&timer, now).await {
            Ok(0) => (),
            Ok(minutes) => warn!(
                "Recovered {minutes} min of unsaved {} time from a previous run",
                timer.domain
            ),
            Err(e) => error!("Failed to flush leftover timer {e}"),
        }
    }
}
