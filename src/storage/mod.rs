//! Module `storage`
//!
//! The file system seam used by the transfer commands. The engine only talks
//! to [`FileSystem`]; [`LocalFileSystem`] serves a directory of the host.

pub mod local;
pub mod path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::background::BackgroundTransfer;
use crate::error::StorageError;

pub use local::LocalFileSystem;
pub use path::VirtualPath;

/// One directory entry as reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub modified: Option<DateTime<Utc>>,
}

pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn list(&self, path: &VirtualPath) -> Result<Vec<FileEntry>, StorageError>;

    async fn is_directory(&self, path: &VirtualPath) -> Result<bool, StorageError>;

    async fn open_read(&self, path: &VirtualPath) -> Result<ReadStream, StorageError>;

    /// Opens a sink for an upload. Data is not visible under `path` until
    /// the returned upload is committed.
    async fn create_write(&self, path: &VirtualPath) -> Result<Box<dyn Upload>, StorageError>;
}

/// Staged upload data.
#[async_trait]
pub trait Upload: AsyncWrite + Send + Unpin {
    /// Finalizes the upload. A returned transfer completes the commit in the
    /// background and must be handed to the background worker.
    async fn commit(self: Box<Self>) -> Result<Option<Box<dyn BackgroundTransfer>>, StorageError>;

    /// Drops the staged data of a failed or aborted upload.
    async fn discard(self: Box<Self>);
}
