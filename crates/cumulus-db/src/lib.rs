//! Cloud provider IP database primitives
//!
//! This crate builds and reads a single, language-independent, file-backed
//! database answering: given an IP address (v4 or v6), which cloud
//! providers, services, and regions claim it?
//!
//! - **Builder**: ingests `(source, prefix, service, region)` records into
//!   a path-compressed binary trie where overlapping claims stack up on
//!   the leaves they cover
//! - **Container**: a compact self-describing binary format with
//!   variable-width page pointers and deduplicated leaf payloads, readable
//!   from any language with seek, read, and integer unpacking
//! - **Lookup**: a bit-by-bit trie walk costing `O(bit-length)` small
//!   reads against any [`ByteSource`] (local file, memory buffer, or a
//!   ranged HTTP window cache behind the `remote` feature)
//!
//! Lookups return *all* claims over an address, in insertion order; there
//! is no longest-prefix priority. The emitted file is immutable.
//!
//! # Example
//!
//! ```rust,ignore
//! use cumulus_db::{DbBuilder, MemorySource, WriteOptions};
//!
//! # async fn example() -> cumulus_db::Result<()> {
//! let mut builder = DbBuilder::new();
//! builder.register_source("private", "Private IP");
//! builder.insert("private", "127.0.0.0/8", "Loopback addresses", "")?;
//!
//! let mut db = MemorySource::new(cumulus_db::write_db_bytes(&builder, &WriteOptions::default())?);
//! let matches = cumulus_db::lookup(&mut db, "127.1.2.7").await?;
//! assert_eq!(matches[0].source, "Private IP");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

/// Address and prefix parsing
pub mod addr;
/// Binary container format: header, serializer, lookup engine
pub mod dat;
pub mod error;
/// Seekable byte source abstraction
pub mod source;
/// In-memory prefix trie
pub mod trie;
/// Tagged-value codec
pub mod value;

pub use addr::Cidr;
pub use dat::reader::{INFO_KEY, Match, Query, info, info_path, lookup, lookup_path, query};
pub use dat::writer::{WriteOptions, write_db, write_db_bytes};
pub use dat::{COOKIE, HEADER_LEN, Header, VERSION};
pub use error::{DbError, DbErrorKind, Result};
pub use source::{ByteSource, FileSource, MemorySource};
#[cfg(feature = "remote")]
pub use source::HttpRangeSource;
pub use trie::{Annotation, DbBuilder, Record};
pub use value::Value;
