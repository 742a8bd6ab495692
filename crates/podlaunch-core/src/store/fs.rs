use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::trace;

use super::{StateStore, StoreError};

/// Documents as files below a root directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a watcher
/// never reads a half-written document. The file and its directory are synced before
/// `put` returns.
#[derive(Debug, Clone)]
pub struct FsStateStore {
    root: PathBuf,
}

impl FsStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> Result<PathBuf, StoreError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(StoreError::Unavailable(format!("unusable key {key:?}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn put(&self, key: &str, body: &str) -> Result<(), StoreError> {
        let path = self.path_of(key)?;
        let io_err = |source: io::Error| StoreError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = File::create(&tmp).await.map_err(io_err)?;
        file.write_all(body.as_bytes()).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        if let Some(parent) = path.parent() {
            sync_dir(parent).await.map_err(io_err)?;
        }
        trace!(target: "podlaunch.lifecycle", path = %path.display(), bytes = body.len(), "document written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_of(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Persist directory entries (the rename) on platforms that allow opening a directory.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
