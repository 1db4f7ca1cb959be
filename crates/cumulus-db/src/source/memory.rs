//! In-memory byte source

use bytes::Bytes;

use crate::error::Result;
use crate::source::ByteSource;

/// Byte source over an in-memory buffer
///
/// Useful for tests and for databases small enough to hold resident.
/// Reads are cheap slices of the shared buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Wrap a buffer
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Total length of the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for MemorySource {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl ByteSource for MemorySource {
    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        let start = (offset.min(self.data.len() as u64)) as usize;
        let end = start.saturating_add(len).min(self.data.len());
        Ok(self.data.slice(start..end))
    }
}
