//! Attribution of elapsed time to calendar days.
//!
//! A duration starting at some instant is cut at every local midnight it crosses. Each piece is
//! rounded to whole minutes on its own, so a session spanning N days can log up to N-1 minutes
//! more or less than rounding the undivided total would.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::{
    error::StorageError,
    utils::time::{day_key, elapsed_seconds, next_day_start, seconds_to_minutes},
};

use super::{entities::UNKNOWN_DOMAIN, repository::LedgerRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayChunk {
    pub day: NaiveDate,
    pub seconds: u64,
}

impl DayChunk {
    pub fn minutes(&self) -> u64 {
        seconds_to_minutes(self.seconds)
    }
}

/// Splits `[start, start + duration_seconds)` at local midnights of `tz`.
pub fn split_by_day<Tz: TimeZone>(
    start: DateTime<Utc>,
    duration_seconds: u64,
    tz: &Tz,
) -> Vec<DayChunk> {
    let mut chunks = Vec::new();
    let mut remaining = duration_seconds;
    let mut cursor = start.with_timezone(tz);

    while remaining > 0 {
        let midnight = next_day_start(&cursor);
        let until_midnight =
            elapsed_seconds(cursor.with_timezone(&Utc), midnight.with_timezone(&Utc));
        let chunk = remaining.min(until_midnight);
        // A cursor within half a second of midnight rounds to an empty piece.
        if chunk > 0 {
            chunks.push(DayChunk {
                day: cursor.date_naive(),
                seconds: chunk,
            });
        }
        remaining -= chunk;
        cursor = midnight;
    }

    chunks
}

/// Adds `duration_seconds` for `domain` starting at `start` into the ledger. Every day touched is
/// its own read-modify-write, so a failure part way leaves the earlier days updated and reports
/// the error for the rest. Returns the minutes actually written.
pub async fn add_elapsed<Tz: TimeZone>(
    repository: &LedgerRepository,
    domain: &str,
    start: DateTime<Utc>,
    duration_seconds: u64,
    tz: &Tz,
) -> Result<u64, StorageError> {
    let domain = if domain.is_empty() {
        UNKNOWN_DOMAIN
    } else {
        domain
    };

    let mut logged = 0;
    for chunk in split_by_day(start, duration_seconds, tz) {
        let key = day_key(chunk.day);
        let minutes = chunk.minutes();
        repository
            .update_ledger(|ledger| ledger.day_mut(&key).add_minutes(domain, minutes))
            .await?;
        debug!(
            "Logged {minutes} minutes ({} seconds) of {domain} to {key}",
            chunk.seconds
        );
        logged += minutes;
    }
    Ok(logged)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use anyhow::Result;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        error::StorageError,
        ledger::{
            repository::LedgerRepository,
            store::{FileBlobStore, MockBlobStore},
        },
    };

    use super::{add_elapsed, split_by_day, DayChunk};

    fn tz() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
    }

    #[test]
    fn test_split_within_one_day() {
        let start = tz().with_ymd_and_hms(2024, 11, 3, 10, 0, 0).unwrap().with_timezone(&Utc);
        assert_eq!(
            split_by_day(start, 3600, &tz()),
            vec![DayChunk {
                day: date(3),
                seconds: 3600
            }]
        );
    }

    #[test]
    fn test_split_uses_local_midnight_not_utc() {
        // 20:00 local is already the next UTC day, but the whole hour belongs to the 3rd locally.
        let start = tz().with_ymd_and_hms(2024, 11, 3, 20, 0, 0).unwrap().with_timezone(&Utc);
        let chunks = split_by_day(start, 3600, &tz());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].day, date(3));
    }

    #[test]
    fn test_split_across_midnight() {
        let start = tz().with_ymd_and_hms(2024, 11, 3, 23, 59, 50).unwrap().with_timezone(&Utc);
        assert_eq!(
            split_by_day(start, 20, &tz()),
            vec![
                DayChunk {
                    day: date(3),
                    seconds: 10
                },
                DayChunk {
                    day: date(4),
                    seconds: 10
                },
            ]
        );
    }

    #[test]
    fn test_split_spanning_several_days() {
        let start = tz().with_ymd_and_hms(2024, 11, 3, 23, 0, 0).unwrap().with_timezone(&Utc);
        let chunks = split_by_day(start, 3600 + 86_400 + 1800, &tz());
        let seconds = chunks.iter().map(|c| c.seconds).collect::<Vec<_>>();
        assert_eq!(seconds, vec![3600, 86_400, 1800]);
        assert_eq!(chunks[2].day, date(5));
    }

    #[test]
    fn test_zero_duration_is_empty() {
        assert!(split_by_day(Utc::now(), 0, &tz()).is_empty());
    }

    #[test]
    fn test_rounding_per_chunk_stays_within_one_minute() {
        // 23:59:00 + 90s crosses midnight: 60s and 30s round to 1 + 1, undivided 90s rounds to 2.
        // 23:59:31 + 58s gives 29s + 29s: 0 + 0 against 1 undivided.
        for (h, m, s, duration) in [(23, 59, 0, 90), (23, 59, 31, 58), (23, 30, 15, 1789)] {
            let start = tz().with_ymd_and_hms(2024, 11, 3, h, m, s).unwrap().with_timezone(&Utc);
            let chunks = split_by_day(start, duration, &tz());
            assert_eq!(chunks.len(), 2);
            let split_total: u64 = chunks.iter().map(DayChunk::minutes).sum();
            let undivided = crate::utils::time::seconds_to_minutes(duration);
            assert!(split_total.abs_diff(undivided) <= 1);
        }
    }

    #[tokio::test]
    async fn test_add_elapsed_creates_single_day() -> Result<()> {
        let dir = tempdir()?;
        let repository = LedgerRepository::new(FileBlobStore::new(dir.path().to_owned())?);
        let start = tz().with_ymd_and_hms(2024, 11, 3, 9, 0, 0).unwrap().with_timezone(&Utc);

        let logged = add_elapsed(&repository, "x", start, 1500, &tz()).await?;

        assert_eq!(logged, 25);
        let ledger = repository.ledger().await?;
        assert_eq!(ledger.days.len(), 1);
        let day = ledger.day("2024-11-03").unwrap();
        assert_eq!(day.total_minutes, 25);
        assert_eq!(day.domains["x"], 25);
        assert_eq!(day.goal, Some(150));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_elapsed_short_time_still_creates_day() -> Result<()> {
        let dir = tempdir()?;
        let repository = LedgerRepository::new(FileBlobStore::new(dir.path().to_owned())?);
        let start = tz().with_ymd_and_hms(2024, 11, 3, 9, 0, 0).unwrap().with_timezone(&Utc);

        assert_eq!(add_elapsed(&repository, "", start, 20, &tz()).await?, 0);

        let ledger = repository.ledger().await?;
        let day = ledger.day("2024-11-03").unwrap();
        assert_eq!(day.total_minutes, 0);
        assert_eq!(day.domains["unknown"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_elapsed_accumulates_existing_day() -> Result<()> {
        let dir = tempdir()?;
        let repository = LedgerRepository::new(FileBlobStore::new(dir.path().to_owned())?);
        let start = tz().with_ymd_and_hms(2024, 11, 3, 9, 0, 0).unwrap().with_timezone(&Utc);

        add_elapsed(&repository, "x", start, 600, &tz()).await?;
        add_elapsed(&repository, "y", start, 300, &tz()).await?;
        add_elapsed(&repository, "x", start, 60, &tz()).await?;

        let ledger = repository.ledger().await?;
        let day = ledger.day("2024-11-03").unwrap();
        assert_eq!(day.domains["x"], 11);
        assert_eq!(day.domains["y"], 5);
        assert_eq!(day.total_minutes, 16);
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_mid_flush_keeps_earlier_days() {
        let writes = Arc::new(AtomicUsize::new(0));
        let mut store = MockBlobStore::new();
        store.expect_get().returning(|_| Ok(None));
        let counter = writes.clone();
        store.expect_set().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(())
            } else {
                Err(StorageError::Unavailable("quota".into()))
            }
        });
        let repository = LedgerRepository::new(store);
        let start = tz().with_ymd_and_hms(2024, 11, 3, 23, 0, 0).unwrap().with_timezone(&Utc);

        let result = add_elapsed(&repository, "x", start, 7200, &tz()).await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(writes.load(Ordering::SeqCst), 2);
    }
}
