use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::{
    error::{StorageError, TimerError},
    timer::state::{TimerRecord, UnsavedSegment},
};

use super::{
    entities::{ActiveFocus, Ledger},
    store::BlobStore,
};

pub const LEDGER_KEY: &str = "ledger";
pub const TIMER_KEY: &str = "timer";
pub const STAGED_SEGMENT_KEY: &str = "staged_segment";
pub const ACTIVE_FOCUS_KEY: &str = "active_focus";
pub const JUST_FINISHED_KEY: &str = "timer_just_finished";

/// Typed access to the records kept in a [BlobStore]. The ledger and the timer are independent
/// records, so a write to one never touches the other.
pub struct LedgerRepository {
    store: Box<dyn BlobStore>,
}

impl LedgerRepository {
    pub fn new(store: impl BlobStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_owned(),
                source,
            })
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Corrupt {
            key: key.to_owned(),
            source,
        })?;
        self.store.set(key, raw).await
    }

    pub async fn ledger(&self) -> Result<Ledger, StorageError> {
        Ok(self.read(LEDGER_KEY).await?.unwrap_or_default())
    }

    pub async fn save_ledger(&self, ledger: &Ledger) -> Result<(), StorageError> {
        self.write(LEDGER_KEY, ledger).await
    }

    /// One read-modify-write of the ledger.
    pub async fn update_ledger<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> Result<R, StorageError> {
        let mut ledger = self.ledger().await?;
        let result = f(&mut ledger);
        self.save_ledger(&ledger).await?;
        Ok(result)
    }

    /// Like [Self::update_ledger], but nothing is written when `f` rejects the edit.
    pub async fn try_update_ledger<R>(
        &self,
        f: impl FnOnce(&mut Ledger) -> Result<R, TimerError>,
    ) -> Result<R, TimerError> {
        let mut ledger = self.ledger().await?;
        let result = f(&mut ledger)?;
        self.save_ledger(&ledger).await?;
        Ok(result)
    }

    pub async fn timer(&self) -> Result<Option<TimerRecord>, StorageError> {
        self.read(TIMER_KEY).await
    }

    pub async fn save_timer(&self, timer: &TimerRecord) -> Result<(), StorageError> {
        self.write(TIMER_KEY, timer).await
    }

    pub async fn clear_timer(&self) -> Result<(), StorageError> {
        self.store.remove(TIMER_KEY).await
    }

    pub async fn staged_segment(&self) -> Result<Option<UnsavedSegment>, StorageError> {
        self.read(STAGED_SEGMENT_KEY).await
    }

    pub async fn save_staged_segment(&self, segment: &UnsavedSegment) -> Result<(), StorageError> {
        self.write(STAGED_SEGMENT_KEY, segment).await
    }

    pub async fn clear_staged_segment(&self) -> Result<(), StorageError> {
        self.store.remove(STAGED_SEGMENT_KEY).await
    }

    pub async fn active_focus(&self) -> Result<Option<ActiveFocus>, StorageError> {
        self.read(ACTIVE_FOCUS_KEY).await
    }

    pub async fn save_active_focus(&self, focus: &ActiveFocus) -> Result<(), StorageError> {
        self.write(ACTIVE_FOCUS_KEY, focus).await
    }

    pub async fn clear_active_focus(&self) -> Result<(), StorageError> {
        self.store.remove(ACTIVE_FOCUS_KEY).await
    }

    /// Reads and resets the "a Pomodoro just finished" flag.
    pub async fn take_just_finished(&self) -> Result<bool, StorageError> {
        let finished = self.read::<bool>(JUST_FINISHED_KEY).await?.unwrap_or(false);
        if finished {
            if let Err(e) = self.store.remove(JUST_FINISHED_KEY).await {
                warn!("Failed to reset finished flag {e}");
            }
        }
        Ok(finished)
    }

    pub async fn mark_just_finished(&self) -> Result<(), StorageError> {
        self.write(JUST_FINISHED_KEY, &true).await
    }
}
