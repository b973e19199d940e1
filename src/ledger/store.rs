use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;

use crate::error::StorageError;

/// Durable key-value blob store. Keys are opaque strings, values are serialized records. There are
/// no transactions: each call stands on its own and any of them may fail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `None` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// The main realization of [BlobStore]. Every key is a `<key>.json` file inside one directory.
/// Writes go to `<key>.json.tmp` first and are renamed into place, so a reader holding its shared
/// lock sees either the old record or the new one, never a half written file. The daemon is the
/// only writer.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Where a new value is written before it is renamed over [Self::path_for].
    fn staging_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json.tmp"))
    }
}

fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_owned(),
        source,
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        async fn read(path: &Path) -> Result<String, std::io::Error> {
            let mut file = File::open(path).await?;
            file.lock_shared()?;
            let mut content = String::new();
            let result = file.read_to_string(&mut content).await;
            file.unlock_async().await?;
            result?;
            Ok(content)
        }

        let path = self.path_for(key);
        debug!("Reading {path:?}");
        match read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let staging = self.staging_path_for(key);
        debug!("Writing {path:?}");

        // The value is complete on disk before it replaces the old file. A crash leaves either
        // the previous record or the new one, and a leftover staging file is overwritten next time.
        let mut file = File::create(&staging).await.map_err(io_error(key))?;
        file.write_all(value.as_bytes())
            .await
            .map_err(io_error(key))?;
        file.sync_all().await.map_err(io_error(key))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(io_error(key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key)(e)),
        }
    }
}
