//! Seekable byte source abstraction
//!
//! Lookups only need positional reads, so the whole accessor contract is
//! one method. Implementations cover a local file ([`FileSource`]), an
//! in-memory buffer ([`MemorySource`]), and, behind the `remote` feature,
//! a window-cached ranged HTTP reader ([`HttpRangeSource`]).
//!
//! Each source owns its own cursor, so concurrent lookups over the same
//! immutable file just use distinct source instances; the `&mut` receiver
//! makes cursor races unrepresentable.

use bytes::Bytes;

use crate::error::{DbError, Result};

pub mod file;
#[cfg(feature = "remote")]
pub mod http;
pub mod memory;

pub use file::FileSource;
#[cfg(feature = "remote")]
pub use http::HttpRangeSource;
pub use memory::MemorySource;

/// Positional byte reader
///
/// The one seam between the lookup engine and storage. A short return is
/// only allowed at the end of the source; anywhere else it is an error in
/// the implementation, not a recoverable condition.
#[trait_variant::make(Send)]
pub trait ByteSource {
    /// Read up to `len` bytes starting at `offset`
    ///
    /// Returns fewer than `len` bytes only when the source ends inside
    /// the requested range.
    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes>;
}

/// Read exactly `len` bytes at `offset`, failing on a short read
pub async fn read_exact_at<S: ByteSource>(source: &mut S, offset: u64, len: usize) -> Result<Bytes> {
    let buf = source.read_at(offset, len).await?;
    if buf.len() < len {
        return Err(DbError::truncated(len, buf.len()));
    }
    Ok(buf)
}
