//! Database lookups
//!
//! Walks the bit-indexed trie with `O(bit-length)` small reads against any
//! [`ByteSource`], decodes the terminal leaf payload, and joins provider
//! short names against the info page's `sources` dict. Lookups are pure:
//! every error aborts the call, nothing is retried or repaired.

use std::path::Path;

use smol_str::SmolStr;

use crate::addr::{bit_at, ip_key};
use crate::dat::{HEADER_LEN, Header};
use crate::error::{DbError, DbErrorKind, Result};
use crate::source::{ByteSource, FileSource, read_exact_at};
use crate::value::Value;

/// The lookup key that returns the info page instead of matches
pub const INFO_KEY: &str = "info";

/// One provider claim over the queried address
///
/// `service`, `region`, and `prefix` are present only when the ingested
/// record carried a non-empty value, which keeps the JSON row shape
/// consumers expect.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Match {
    /// Human-readable provider name, or the short identifier when no
    /// pretty name was registered
    pub source: SmolStr,
    /// Service name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<SmolStr>,
    /// Region name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<SmolStr>,
    /// The CIDR the claim was ingested under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<SmolStr>,
}

/// Result of a keyed query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// The info page, for the `"info"` sentinel key
    Info(Value),
    /// Claims over the queried address, in insertion order
    Matches(Vec<Match>),
}

/// Look up a key: either a textual IP address or the `"info"` sentinel
pub async fn query<S: ByteSource>(source: &mut S, key: &str) -> Result<Query> {
    if key == INFO_KEY {
        Ok(Query::Info(info(source).await?))
    } else {
        Ok(Query::Matches(lookup(source, key).await?))
    }
}

/// Read the info page
pub async fn info<S: ByteSource>(source: &mut S) -> Result<Value> {
    let header = Header::read(source).await?;
    decode_value_at(source, header.info_offset).await
}

/// Look up all claims over an IP address, in insertion order
///
/// Returns an empty vec for addresses no provider claims.
pub async fn lookup<S: ByteSource>(source: &mut S, ip: &str) -> Result<Vec<Match>> {
    let header = Header::read(source).await?;
    let key = ip_key(ip)?;
    let field_size = header.field_size as u64;

    // The key carries the family discriminator in a full leading byte; only
    // its last bit matters, so start just before bit 7. The root branch
    // page sits at 128, encoded as an even pointer.
    let mut bit = 6usize;
    let mut pointer = HEADER_LEN * 2;
    while pointer & 1 == 0 {
        bit += 1;
        if bit / 8 >= key.len() {
            return Err(DbError::malformed_value(
                "branch walk ran past the key's last bit",
            )
            .with_context(format!("pointer {} at bit {}", pointer, bit)));
        }
        let side = bit_at(&key, bit) as u64;
        let field = read_exact_at(
            source,
            pointer / 2 + side * field_size,
            field_size as usize,
        )
        .await?;
        pointer = field.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    }

    let payload = decode_value_at(source, pointer / 2).await?;
    let info = decode_value_at(source, header.info_offset).await?;

    let items = payload
        .as_list()
        .ok_or_else(|| DbError::malformed_value("leaf payload is not a list"))?;
    let sources = info.get("sources");

    let mut matches = Vec::with_capacity(items.len());
    for item in items {
        let fields = item
            .as_list()
            .filter(|fields| fields.len() == 4)
            .ok_or_else(|| DbError::malformed_value("annotation is not a 4-element list"))?;
        let short = fields[0]
            .as_str()
            .ok_or_else(|| DbError::malformed_value("annotation source is not a string"))?;
        let pretty = sources
            .and_then(|s| s.get(short))
            .and_then(Value::as_str)
            .unwrap_or(short);
        matches.push(Match {
            source: SmolStr::new(pretty),
            service: non_empty(&fields[1])?,
            region: non_empty(&fields[2])?,
            prefix: non_empty(&fields[3])?,
        });
    }
    Ok(matches)
}

/// Look up a key in a database file, opening and closing it for the call
pub async fn lookup_path(path: impl AsRef<Path>, ip: &str) -> Result<Vec<Match>> {
    let mut source = FileSource::open(path).await?;
    lookup(&mut source, ip).await
}

/// Read the info page of a database file, opening and closing it for the call
pub async fn info_path(path: impl AsRef<Path>) -> Result<Value> {
    let mut source = FileSource::open(path).await?;
    info(&mut source).await
}

fn non_empty(value: &Value) -> Result<Option<SmolStr>> {
    let s = value
        .as_str()
        .ok_or_else(|| DbError::malformed_value("annotation field is not a string"))?;
    Ok((!s.is_empty()).then(|| SmolStr::new(s)))
}

/// Decode a tagged value at an absolute offset
///
/// Payload lengths are not stored, so read a window and widen it whenever
/// the decoder runs off its end while the source still had more to give.
async fn decode_value_at<S: ByteSource>(source: &mut S, offset: u64) -> Result<Value> {
    let mut window = 512usize;
    loop {
        let buf = source.read_at(offset, window).await?;
        match Value::decode(&buf, 0) {
            Ok((value, _)) => return Ok(value),
            Err(e) if e.kind() == &DbErrorKind::TruncatedInput && buf.len() == window => {
                window *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
