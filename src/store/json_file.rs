//! JSON documents on disk.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::BrokerError;

/// A JSON document at a fixed path, or an ephemeral one that is never
/// written anywhere.
#[derive(Debug, Clone)]
pub struct JsonFile<T> {
    path: Option<PathBuf>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Document stored at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            _marker: PhantomData,
        }
    }

    /// Document that lives only in memory.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the document.
    ///
    /// A missing, unreadable, or corrupt file yields `T::default()`.
    pub fn load(&self) -> T {
        let Some(path) = &self.path else {
            return T::default();
        };

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read state file");
                return T::default();
            }
        };

        match serde_json::from_slice(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt state file");
                T::default()
            }
        }
    }

    /// Write the document, creating parent directories as needed.
    ///
    /// The JSON goes to a sibling temp file that is renamed over the target,
    /// so readers never see a partial document.
    pub fn save(&self, value: &T) -> crate::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(value)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// [`load`](Self::load) on the blocking pool.
    pub async fn load_async(&self) -> T
    where
        T: Send + 'static,
    {
        if self.path.is_none() {
            return T::default();
        }

        let file = self.detached();
        match tokio::task::spawn_blocking(move || file.load()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "state file read task failed");
                T::default()
            }
        }
    }

    /// [`save`](Self::save) on the blocking pool.
    pub async fn save_async(&self, value: T) -> crate::Result<()>
    where
        T: Send + 'static,
    {
        if self.path.is_none() {
            return Ok(());
        }

        let file = self.detached();
        tokio::task::spawn_blocking(move || file.save(&value))
            .await
            .map_err(|e| BrokerError::Io(std::io::Error::other(e)))?
    }

    fn detached(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}
