//! Open-ended focus sessions, tracked next to the countdown timer and logged through the same
//! day-split accumulator when they stop.

use chrono::TimeZone;
use tracing::{info, warn};

use crate::{
    error::{TimerError, NO_ACTIVE_FOCUS},
    ledger::entities::{ActiveFocus, UNKNOWN_DOMAIN},
    utils::time::elapsed_seconds,
};

use super::service::TimerService;

impl<Tz: TimeZone> TimerService<Tz> {
    /// Starts tracking `domain`. A session already in progress is stopped and logged first.
    pub async fn focus_start(&mut self, domain: String) -> Result<(), TimerError> {
        if self.repository().active_focus().await?.is_some() {
            let minutes = self.focus_stop().await?;
            info!("Switched focus, previous session logged {minutes} min");
        }
        let domain = if domain.is_empty() {
            UNKNOWN_DOMAIN.to_owned()
        } else {
            domain
        };
        let focus = ActiveFocus {
            domain,
            start: self.now(),
        };
        self.repository().save_active_focus(&focus).await?;
        info!("Focus on {} since {}", focus.domain, focus.start);
        Ok(())
    }

    /// Logs the session from its start until now and clears it. Returns the minutes logged.
    pub async fn focus_stop(&mut self) -> Result<u64, TimerError> {
        let focus = self
            .repository()
            .active_focus()
            .await?
            .ok_or(TimerError::InvalidTransition(NO_ACTIVE_FOCUS))?;
        let now = self.now();
        let elapsed = elapsed_seconds(focus.start, now);
        if focus.start > now {
            warn!("Focus on {} started in the future, logging nothing", focus.domain);
        }

        let minutes = self.log_elapsed(&focus.domain, focus.start, elapsed).await?;
        self.repository().clear_active_focus().await?;
        info!("Focus on {} stopped after {elapsed}s", focus.domain);
        Ok(minutes)
    }
}
