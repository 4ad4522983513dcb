//! Local directory backend
//!
//! Serves the configured server root. Uploads are written to a hidden
//! `.<name>.part` file next to the target and moved into place on commit,
//! either inline or through the background transfer worker. A background
//! commit copies into its own hidden file and renames it over the target,
//! so the target is never seen half written.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::background::{BackgroundTransfer, ProgressReporter};
use crate::error::StorageError;
use crate::storage::{FileEntry, FileSystem, ReadStream, Upload, VirtualPath};
use crate::transfer::copy_cancellable;

const STAGING_SUFFIX: &str = ".part";

pub struct LocalFileSystem {
    root: PathBuf,
    background_uploads: bool,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>, background_uploads: bool) -> Self {
        Self {
            root: root.into(),
            background_uploads,
        }
    }

    /// Creates the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::from_io(e, &self.root.display().to_string()))?;
        info!("Serving files from {}", self.root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn real_path(&self, path: &VirtualPath) -> PathBuf {
        path.to_real_path(&self.root)
    }
}

fn is_staging_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

fn staging_path(target: &Path, name: &str) -> PathBuf {
    target.with_file_name(format!(".{}{}", name, STAGING_SUFFIX))
}

fn commit_path(target: &Path, name: &str, id: &str) -> PathBuf {
    target.with_file_name(format!(".{}.{}{}", name, id, STAGING_SUFFIX))
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn list(&self, path: &VirtualPath) -> Result<Vec<FileEntry>, StorageError> {
        let real = self.real_path(path);
        let virtual_name = path.to_string();

        let mut reader = fs::read_dir(&real)
            .await
            .map_err(|e| StorageError::from_io(e, &virtual_name))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(e, &virtual_name))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_staging_name(&name) {
                continue;
            }

            match entry.metadata().await {
                Ok(metadata) => entries.push(FileEntry {
                    name,
                    size: if metadata.is_dir() { 0 } else { metadata.len() },
                    is_dir: metadata.is_dir(),
                    modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                }),
                Err(e) => {
                    debug!("Skipping {} in {}: {}", name, virtual_name, e);
                }
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} - {} entries", virtual_name, entries.len());
        Ok(entries)
    }

    async fn is_directory(&self, path: &VirtualPath) -> Result<bool, StorageError> {
        match fs::metadata(self.real_path(path)).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(e, &path.to_string())),
        }
    }

    async fn open_read(&self, path: &VirtualPath) -> Result<ReadStream, StorageError> {
        let real = self.real_path(path);
        let virtual_name = path.to_string();

        let metadata = fs::metadata(&real)
            .await
            .map_err(|e| StorageError::from_io(e, &virtual_name))?;
        if metadata.is_dir() {
            return Err(StorageError::NotFound(format!("{} is a directory", virtual_name)));
        }

        let file = fs::File::open(&real)
            .await
            .map_err(|e| StorageError::from_io(e, &virtual_name))?;
        Ok(Box::new(file))
    }

    async fn create_write(&self, path: &VirtualPath) -> Result<Box<dyn Upload>, StorageError> {
        let virtual_name = path.to_string();
        let name = match path.file_name() {
            Some(name) if !is_staging_name(name) => name.to_string(),
            _ => return Err(StorageError::InvalidName(virtual_name)),
        };

        let target = self.real_path(path);
        if fs::metadata(&target).await.is_ok_and(|m| m.is_dir()) {
            return Err(StorageError::InvalidName(virtual_name));
        }

        let staging = staging_path(&target, &name);
        let file = fs::File::create(&staging)
            .await
            .map_err(|e| StorageError::from_io(e, &virtual_name))?;

        debug!("Staging upload of {} in {}", virtual_name, staging.display());
        Ok(Box::new(LocalUpload {
            file,
            name,
            virtual_name,
            staging,
            target,
            background: self.background_uploads,
        }))
    }
}

/// Write side of an upload in progress.
struct LocalUpload {
    file: fs::File,
    name: String,
    /// Client-visible path, used in errors instead of the host path.
    virtual_name: String,
    staging: PathBuf,
    target: PathBuf,
    background: bool,
}

impl AsyncWrite for LocalUpload {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

#[async_trait]
impl Upload for LocalUpload {
    async fn commit(self: Box<Self>) -> Result<Option<Box<dyn BackgroundTransfer>>, StorageError> {
        let LocalUpload {
            mut file,
            name,
            virtual_name,
            staging,
            target,
            background,
        } = *self;

        file.flush().await.map_err(|e| StorageError::from_io(e, &virtual_name))?;
        file.sync_all().await.map_err(|e| StorageError::from_io(e, &virtual_name))?;
        drop(file);

        if background {
            let id = Uuid::new_v4().to_string();
            let commit = DeferredCommit {
                temp: commit_path(&target, &name, &id),
                id,
                staging,
                target,
            };
            debug!("Deferring commit of {} as {}", virtual_name, commit.id);
            return Ok(Some(Box::new(commit)));
        }

        fs::rename(&staging, &target)
            .await
            .map_err(|e| StorageError::from_io(e, &virtual_name))?;
        Ok(None)
    }

    async fn discard(self: Box<Self>) {
        let LocalUpload { file, staging, .. } = *self;
        drop(file);
        remove_if_exists(&staging).await;
    }
}

/// Moves a staged upload into place from the background worker.
///
/// The staging file is only removed once the target has been replaced.
/// A commit cancelled or dropped part way leaves the target and the
/// staging file as they were.
pub struct DeferredCommit {
    id: String,
    staging: PathBuf,
    temp: PathBuf,
    target: PathBuf,
}

#[async_trait]
impl BackgroundTransfer for DeferredCommit {
    fn transfer_id(&self) -> &str {
        &self.id
    }

    async fn start(&mut self, progress: ProgressReporter, cancel: CancellationToken) -> io::Result<()> {
        let mut source = fs::File::open(&self.staging).await?;
        let mut destination = fs::File::create(&self.temp).await?;

        let copied =
            copy_cancellable(&mut source, &mut destination, &cancel, |n| progress.report(n)).await;
        if let Err(e) = copied {
            drop(destination);
            remove_if_exists(&self.temp).await;
            return Err(e);
        }

        destination.sync_all().await?;
        drop(destination);
        fs::rename(&self.temp, &self.target).await?;
        remove_if_exists(&self.staging).await;
        Ok(())
    }

    async fn dispose(&mut self) {
        remove_if_exists(&self.temp).await;
    }
}

async fn remove_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
