//! Tagged-value codec
//!
//! The self-describing encoding used for leaf payloads and the info page.
//! Three types only: dict (ordered key/value pairs), list, and UTF-8 string.
//!
//! Each value starts with one byte: the low two bits are the type tag
//! (`01` dict, `10` list, `11` string; `00` is invalid) and the high six
//! bits are a length in `0..=62`, with `63` escaping to a big-endian u16
//! length for strings. Dicts and lists have no escape; a collection that
//! would need more than 62 entries cannot be encoded and fails the build.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::{Result, ValueError};

/// Maximum entries in a dict or elements in a list
pub const MAX_COLLECTION_LEN: usize = 62;

/// Maximum byte length of a string (16-bit extended length field)
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Decoder recursion limit; real payloads nest three levels
const MAX_DEPTH: usize = 64;

const TAG_DICT: u8 = 1;
const TAG_LIST: u8 = 2;
const TAG_STRING: u8 = 3;

/// A decoded or to-be-encoded value
///
/// Dicts preserve insertion order, which the serializer relies on for
/// reproducible output. The wire grammar would allow any value as a dict
/// key, but this database only ever writes string keys, so keys are typed
/// as strings and a non-string key on decode is malformed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Ordered key/value pairs
    Dict(IndexMap<SmolStr, Value>),
    /// Ordered sequence of values
    List(Vec<Value>),
    /// UTF-8 string
    String(SmolStr),
}

impl Value {
    /// Shorthand for a string value
    pub fn string(s: impl Into<SmolStr>) -> Self {
        Value::String(s.into())
    }

    /// Get a dict entry by key
    ///
    /// Returns `None` if this is not a dict or the key is absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries.get(key),
            _ => None,
        }
    }

    /// View this value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// View this value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Encode this value, appending to `out`
    pub fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Value::Dict(entries) => {
                if entries.len() > MAX_COLLECTION_LEN {
                    return Err(ValueError::DictTooLarge {
                        len: entries.len(),
                        max: MAX_COLLECTION_LEN,
                    }
                    .into());
                }
                out.push(((entries.len() as u8) << 2) | TAG_DICT);
                for (key, value) in entries {
                    encode_str(key, out)?;
                    value.encode_to(out)?;
                }
            }
            Value::List(items) => {
                if items.len() > MAX_COLLECTION_LEN {
                    return Err(ValueError::ListTooLarge {
                        len: items.len(),
                        max: MAX_COLLECTION_LEN,
                    }
                    .into());
                }
                out.push(((items.len() as u8) << 2) | TAG_LIST);
                for item in items {
                    item.encode_to(out)?;
                }
            }
            Value::String(s) => encode_str(s, out)?,
        }
        Ok(())
    }

    /// Encode this value to a fresh byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_to(&mut out)?;
        Ok(out)
    }

    /// Decode one value starting at `offset`
    ///
    /// Decoding is purely sequential; returns the value and the offset of
    /// the first byte past it.
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Value, usize)> {
        decode_at(buf, offset, 0)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(SmolStr::new(s))
    }
}

fn encode_str(s: &str, out: &mut Vec<u8>) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() >= 63 {
        if bytes.len() > MAX_STRING_LEN {
            return Err(ValueError::StringTooLarge {
                len: bytes.len(),
                max: MAX_STRING_LEN,
            }
            .into());
        }
        out.push((63 << 2) | TAG_STRING);
        out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    } else {
        out.push(((bytes.len() as u8) << 2) | TAG_STRING);
    }
    out.extend_from_slice(bytes);
    Ok(())
}

fn take<'a>(buf: &'a [u8], offset: usize, len: usize) -> Result<&'a [u8]> {
    let end = offset.checked_add(len).ok_or(ValueError::Truncated {
        needed: len,
        available: buf.len().saturating_sub(offset),
    })?;
    if end > buf.len() {
        return Err(ValueError::Truncated {
            needed: len,
            available: buf.len().saturating_sub(offset),
        }
        .into());
    }
    Ok(&buf[offset..end])
}

fn decode_at(buf: &[u8], offset: usize, depth: usize) -> Result<(Value, usize)> {
    if depth > MAX_DEPTH {
        return Err(ValueError::TooDeep { max: MAX_DEPTH }.into());
    }

    let tag_byte = take(buf, offset, 1)?[0];
    let mut offset = offset + 1;
    let len = (tag_byte >> 2) as usize;

    match tag_byte & 3 {
        TAG_DICT => {
            let mut entries = IndexMap::with_capacity(len);
            for _ in 0..len {
                let (key, next) = decode_at(buf, offset, depth + 1)?;
                let Value::String(key) = key else {
                    return Err(ValueError::NonStringKey.into());
                };
                let (value, next) = decode_at(buf, next, depth + 1)?;
                entries.insert(key, value);
                offset = next;
            }
            Ok((Value::Dict(entries), offset))
        }
        TAG_LIST => {
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let (value, next) = decode_at(buf, offset, depth + 1)?;
                items.push(value);
                offset = next;
            }
            Ok((Value::List(items), offset))
        }
        TAG_STRING => {
            let len = if len == 63 {
                let ext = take(buf, offset, 2)?;
                offset += 2;
                u16::from_be_bytes([ext[0], ext[1]]) as usize
            } else {
                len
            };
            let bytes = take(buf, offset, len)?;
            let s = std::str::from_utf8(bytes).map_err(ValueError::InvalidUtf8)?;
            Ok((Value::String(SmolStr::new(s)), offset + len))
        }
        _ => Err(ValueError::InvalidTag { offset: offset - 1 }.into()),
    }
}
