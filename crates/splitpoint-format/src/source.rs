//! Byte-range access to audio files.
//!
//! A [`MediaSource`] is the only way the library touches file contents. Reads
//! behave like slicing a blob: the end is clamped to the source size and an
//! empty or inverted range yields an empty buffer.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::Result;

/// A named, sized, randomly readable byte source.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// File name used for extension-based detection and diagnostics.
    fn name(&self) -> &str;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Read `[start, end)`, clamped to the source size.
    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes>;
}

fn clamp_range(start: u64, end: u64, size: u64) -> Option<(u64, u64)> {
    let end = end.min(size);
    if start >= end {
        None
    } else {
        Some((start, end))
    }
}

/// A source backed by an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Bytes,
}

impl MemorySource {
    /// Wrap a buffer under the given file name.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl MediaSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        Ok(match clamp_range(start, end, self.size()) {
            Some((start, end)) => self.data.slice(start as usize..end as usize),
            None => Bytes::new(),
        })
    }
}

/// A source backed by a file on disk.
///
/// The handle is shared behind an async mutex so each read can seek
/// independently.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
    file: Mutex<File>,
}

impl FileSource {
    /// Open a file for range reads.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        let size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path,
            name,
            size,
            file: Mutex::new(file),
        })
    }

    /// Path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MediaSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let Some((start, end)) = clamp_range(start, end, self.size) else {
            return Ok(Bytes::new());
        };

        let mut buf = vec![0u8; (end - start) as usize];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(&mut buf).await?;

        Ok(Bytes::from(buf))
    }
}
