//! The `.dat` binary container format
//!
//! A database file is a 128-byte header, a run of branch pages, then the
//! deduplicated leaf payloads (including the info page). All integers are
//! big-endian. Pointers encode `2 * target_offset + kind_bit`, where the
//! low bit distinguishes a branch page (0) from a leaf payload (1), so a
//! reader in any language needs nothing beyond seek, read, and integer
//! unpacking.

use crate::error::{DbError, Result};
use crate::source::{ByteSource, read_exact_at};

pub mod reader;
pub mod writer;

/// Magic bytes at the start of every database file
///
/// 21 bytes; the version field starts right after. The trailing NUL
/// doubles as the seek target: readers seek to byte 21, not past a
/// notional 22-byte literal.
pub const COOKIE: &[u8; 21] = b"Cloud IPs Database\n\x00\x00";

/// The only supported container version
pub const VERSION: u16 = 2;

/// Total header length; the root branch page starts here
pub const HEADER_LEN: u64 = 128;

/// Bytes reserved per branch page during offset assignment
///
/// The on-disk pointers occupy `2 * field_size <= 8` of these; the rest is
/// dead space the reader never touches. Fixing the reservation keeps the
/// page layout independent of the pointer width chosen afterwards.
pub(crate) const BRANCH_PAGE_LEN: u64 = 8;

/// Parsed fixed header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Container version, always 2
    pub version: u16,
    /// Width in bytes of every page pointer
    pub field_size: u16,
    /// Absolute byte offset of the info page
    pub info_offset: u64,
}

impl Header {
    /// Read and validate the header from any byte source
    pub async fn read<S: ByteSource>(source: &mut S) -> Result<Self> {
        let buf = read_exact_at(source, COOKIE.len() as u64, 12).await?;

        let version = u16::from_be_bytes([buf[0], buf[1]]);
        let field_size = u16::from_be_bytes([buf[2], buf[3]]);
        let mut info = [0u8; 8];
        info.copy_from_slice(&buf[4..12]);
        let info_offset = u64::from_be_bytes(info);

        if version != VERSION {
            return Err(DbError::unsupported_version(version));
        }
        if !(1..=8).contains(&field_size) {
            return Err(DbError::malformed_value(format!(
                "field size {} is outside 1..=8",
                field_size
            )));
        }

        Ok(Self {
            version,
            field_size,
            info_offset,
        })
    }
}
