//! A single slot holding paused time that waits for the user to confirm or drop it.

use chrono::TimeZone;
use tracing::info;

use crate::error::{TimerError, NOTHING_STAGED, NO_ELAPSED_TIME, NO_RUNNING_TIMER};

use super::{service::TimerService, state::UnsavedSegment};

impl<Tz: TimeZone> TimerService<Tz> {
    /// Stores `segment`, replacing whatever was staged before.
    pub async fn stage(&self, segment: &UnsavedSegment) -> Result<(), TimerError> {
        self.repository().save_staged_segment(segment).await?;
        info!(
            "Staged {}s of {} paused at {}",
            segment.elapsed_seconds, segment.domain, segment.paused_at
        );
        Ok(())
    }

    /// Pauses the running timer, moves all of its unsaved time into the stage and drops the
    /// timer. The paused record is written before staging, so a failed stage still leaves a
    /// paused timer holding the time.
    pub async fn pause_and_stage(&mut self) -> Result<UnsavedSegment, TimerError> {
        let now = self.now();
        let paused = self
            .repository()
            .timer()
            .await?
            .and_then(|timer| timer.pause(now))
            .ok_or(TimerError::InvalidTransition(NO_RUNNING_TIMER))?;
        if paused.segment_elapsed == 0 {
            return Err(TimerError::InvalidTransition(NO_ELAPSED_TIME));
        }

        self.repository().save_timer(&paused.record).await?;
        self.scheduler().cancel();

        let segment = UnsavedSegment {
            domain: paused.record.domain.clone(),
            elapsed_seconds: paused.record.unsaved_elapsed_seconds,
            paused_at: now,
        };
        self.stage(&segment).await?;
        self.repository().clear_timer().await?;
        Ok(segment)
    }

    /// Logs the staged segment and empties the stage.
    pub async fn commit_staged(&mut self) -> Result<u64, TimerError> {
        let segment = self
            .repository()
            .staged_segment()
            .await?
            .filter(|segment| segment.elapsed_seconds > 0)
            .ok_or(TimerError::InvalidTransition(NOTHING_STAGED))?;

        self.log_elapsed(
            &segment.domain,
            segment.approximate_origin(),
            segment.elapsed_seconds,
        )
        .await?;
        self.repository().clear_staged_segment().await?;
        info!("Committed {}s of {}", segment.elapsed_seconds, segment.domain);
        Ok(segment.minutes())
    }

    /// Empties the stage without logging anything.
    pub async fn discard_staged(&mut self) -> Result<(), TimerError> {
        if let Some(segment) = self.repository().staged_segment().await.ok().flatten() {
            info!("Discarding {}s of {}", segment.elapsed_seconds, segment.domain);
        }
        self.repository().clear_staged_segment().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Duration;

    use crate::{
        error::TimerError,
        timer::{
            request::{Request, Response},
            test_support::{at, TestService},
        },
    };

    #[tokio::test]
    async fn test_commit_logs_to_day_before_pause() -> Result<()> {
        let test = TestService::new(at(3, 0, 0, 30))?;
        let mut service = test.relaxed();
        let segment = crate::timer::state::UnsavedSegment {
            domain: "x".into(),
            elapsed_seconds: 90,
            paused_at: at(3, 0, 0, 30),
        };
        service.stage(&segment).await?;

        assert_eq!(service.commit_staged().await?, 2);

        // Origin is 23:59:00 on the 2nd: 60s there, 30s on the 3rd.
        let ledger = service.repository().ledger().await?;
        assert_eq!(ledger.day("2024-11-02").unwrap().domains["x"], 1);
        assert_eq!(ledger.day("2024-11-03").unwrap().domains["x"], 1);
        assert_eq!(service.repository().staged_segment().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_without_stage_fails() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();
        assert!(matches!(
            service.commit_staged().await,
            Err(TimerError::InvalidTransition(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_stage_keeps_only_latest() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();
        for elapsed_seconds in [120, 600] {
            service
                .stage(&crate::timer::state::UnsavedSegment {
                    domain: "x".into(),
                    elapsed_seconds,
                    paused_at: at(3, 10, 0, 0),
                })
                .await?;
        }
        assert_eq!(service.commit_staged().await?, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_pause_and_stage_moves_time_out_of_timer() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.strict(1, 1);

        service
            .handle(Request::StartOrToggle {
                domain: Some("x".into()),
                duration_seconds: Some(1500),
            })
            .await?;
        test.clock.advance(Duration::seconds(200));

        let Response::Staged { segment } = service.handle(Request::PauseAndStage).await? else {
            panic!("expected a staged segment");
        };
        assert_eq!(segment.elapsed_seconds, 200);
        assert_eq!(segment.paused_at, at(3, 10, 3, 20));
        assert_eq!(service.repository().timer().await?, None);

        // Nothing reached the ledger until the user decides.
        assert!(service.repository().ledger().await?.days.is_empty());
        service.discard_staged().await?;
        assert_eq!(service.repository().staged_segment().await?, None);
        assert!(service.repository().ledger().await?.days.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_pause_and_stage_includes_earlier_segments() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();

        service.start_or_toggle(Some("x".into()), Some(1500)).await?;
        test.clock.advance(Duration::seconds(100));
        service.start_or_toggle(None, None).await?;
        test.clock.advance(Duration::seconds(500));
        service.start_or_toggle(None, None).await?;
        test.clock.advance(Duration::seconds(50));

        let segment = service.pause_and_stage().await?;
        assert_eq!(segment.elapsed_seconds, 150);
        Ok(())
    }

    #[tokio::test]
    async fn test_pause_and_stage_needs_running_timer() -> Result<()> {
        let test = TestService::new(at(3, 10, 0, 0))?;
        let mut service = test.relaxed();
        assert!(matches!(
            service.pause_and_stage().await,
            Err(TimerError::InvalidTransition(crate::error::NO_RUNNING_TIMER))
        ));

        service.start_or_toggle(Some("x".into()), Some(60)).await?;
        assert!(matches!(
            service.pause_and_stage().await,
            Err(TimerError::InvalidTransition(crate::error::NO_ELAPSED_TIME))
        ));
        assert!(service.repository().timer().await?.unwrap().is_running());
        Ok(())
    }
}
