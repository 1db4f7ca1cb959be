//! Local file byte source

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{DbError, Result};
use crate::source::ByteSource;

/// Byte source over a local database file
///
/// Open one per concurrent lookup stream; the file is immutable, so
/// instances never interfere. A source opened with [`FileSource::open`]
/// closes its file on drop. A source built from an externally managed
/// handle with [`FileSource::new`] can hand it back via
/// [`FileSource::into_inner`]; the lookup engine never closes it.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: Option<PathBuf>,
}

impl FileSource {
    /// Open a database file for reading
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(DbError::io)?;
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Adopt an externally managed file handle
    pub fn new(file: File) -> Self {
        Self { file, path: None }
    }

    /// The path this source was opened with, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Give the underlying file handle back
    pub fn into_inner(self) -> File {
        self.file
    }
}

impl ByteSource for FileSource {
    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(DbError::io)?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(DbError::io)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }
}
