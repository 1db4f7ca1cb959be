//! Database serialization
//!
//! Lays the trie out as branch pages and deduplicated leaf payloads, then
//! writes the whole container in one pass. Page enumeration is
//! breadth-first from the root; the same order is used for offset
//! assignment and for writing, and the writer verifies the running offset
//! against every page's assigned offset as it goes.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::dat::{BRANCH_PAGE_LEN, COOKIE, HEADER_LEN, VERSION};
use crate::error::{DbError, Result};
use crate::trie::builder::DbBuilder;
use crate::trie::node::Node;
use crate::value::Value;

/// Serialization knobs
///
/// The defaults produce the smallest self-consistent file; both fields
/// exist for reproducing a specific artifact byte-for-byte.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Pointer width in bytes, `1..=4`
    ///
    /// `None` picks the smallest width that can represent every pointer.
    /// A pinned width that is too narrow fails the build with
    /// `OffsetOverflow`.
    pub field_size: Option<u16>,

    /// Pin the info page's `built` timestamp
    ///
    /// `None` stamps the current UTC time. With a pinned timestamp the
    /// output is byte-identical across runs for identical input.
    pub built_at: Option<DateTime<Utc>>,
}

/// A page in enumeration order; children and payloads by index
enum Page {
    Branch { zero: usize, one: usize },
    Leaf { payload: usize },
}

/// Serialize the builder's trie to database bytes
pub fn write_db_bytes(builder: &DbBuilder, opts: &WriteOptions) -> Result<Vec<u8>> {
    // Pass 1: enumerate pages breadth-first, dedup leaf payloads on their
    // encoded bytes. A child's enumeration index is known at push time:
    // pages already emitted plus pages still queued ahead of it.
    let mut pages: Vec<Page> = Vec::new();
    let mut payloads: IndexMap<Vec<u8>, u64> = IndexMap::new();
    let mut queue: VecDeque<&Node> = VecDeque::from([builder.root()]);
    while let Some(node) = queue.pop_front() {
        match node {
            Node::Branch { zero, one } => {
                let base = pages.len() + queue.len() + 1;
                pages.push(Page::Branch {
                    zero: base,
                    one: base + 1,
                });
                queue.push_back(zero);
                queue.push_back(one);
            }
            Node::Leaf(annotations) => {
                let value = Value::List(annotations.iter().map(|a| a.to_value()).collect());
                let entry = payloads.entry(value.to_bytes()?);
                let payload = entry.index();
                entry.or_insert(0);
                pages.push(Page::Leaf { payload });
            }
        }
    }

    // Branch page offsets: 8-byte slots from the end of the header
    let mut offset = HEADER_LEN;
    let mut branches = 0u64;
    let mut page_offsets = Vec::with_capacity(pages.len());
    for page in &pages {
        match page {
            Page::Branch { .. } => {
                page_offsets.push(offset);
                offset += BRANCH_PAGE_LEN;
                branches += 1;
            }
            Page::Leaf { .. } => page_offsets.push(0),
        }
    }
    let branch_end = offset;

    // `size` counts everything but the info page, which doesn't exist yet
    let leafs = payloads.len() as u64;
    let size = branch_end + payloads.keys().map(|p| p.len() as u64).sum::<u64>();

    let info = info_page(builder, opts, branches, leafs, size);
    let info_index = {
        let entry = payloads.entry(info.to_bytes()?);
        let index = entry.index();
        entry.or_insert(0);
        index
    };

    // Leaf payload offsets, in table insertion order
    for (encoded, slot) in payloads.iter_mut() {
        *slot = offset;
        offset += encoded.len() as u64;
    }
    let total = offset;
    let payload_offsets: Vec<u64> = payloads.values().copied().collect();

    let field_size = choose_field_size(total, opts.field_size)?;

    // Pass 2: write, verifying every page lands on its assigned offset
    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(COOKIE);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&field_size.to_be_bytes());
    out.extend_from_slice(&payload_offsets[info_index].to_be_bytes());
    out.resize(HEADER_LEN as usize, 0);

    for (index, page) in pages.iter().enumerate() {
        let Page::Branch { zero, one } = page else {
            continue;
        };
        if out.len() as u64 != page_offsets[index] {
            return Err(DbError::layout_corruption(page_offsets[index], out.len() as u64));
        }
        for child in [*zero, *one] {
            let pointer = match pages[child] {
                Page::Branch { .. } => page_offsets[child] * 2,
                Page::Leaf { payload } => payload_offsets[payload] * 2 + 1,
            };
            out.extend_from_slice(&pointer.to_be_bytes()[8 - field_size as usize..]);
        }
        // Fill the rest of the 8-byte slot
        out.resize((page_offsets[index] + BRANCH_PAGE_LEN) as usize, 0);
    }

    for (encoded, &payload_offset) in payloads.iter() {
        if out.len() as u64 != payload_offset {
            return Err(DbError::layout_corruption(payload_offset, out.len() as u64));
        }
        out.extend_from_slice(encoded);
    }

    tracing::debug!(
        ranges = builder.ranges(),
        branches,
        leafs,
        bytes = total,
        field_size,
        "serialized database"
    );
    Ok(out)
}

/// Serialize the builder's trie and write it to `path`
///
/// The file is written in one shot, so a build error never leaves a
/// half-written container behind the cookie.
pub async fn write_db(
    path: impl AsRef<Path>,
    builder: &DbBuilder,
    opts: &WriteOptions,
) -> Result<()> {
    let bytes = write_db_bytes(builder, opts)?;
    tokio::fs::write(path, bytes).await.map_err(DbError::io)
}

fn info_page(
    builder: &DbBuilder,
    opts: &WriteOptions,
    branches: u64,
    leafs: u64,
    size: u64,
) -> Value {
    let sources = builder
        .sources()
        .iter()
        .map(|(short, pretty)| (short.clone(), Value::String(pretty.clone())))
        .collect();

    // The codec has no integer type; counters travel as decimal strings
    let mut stats = IndexMap::new();
    stats.insert(SmolStr::new("ranges"), Value::string(builder.ranges().to_string()));
    stats.insert(
        SmolStr::new("sources"),
        Value::string(builder.sources().len().to_string()),
    );
    stats.insert(SmolStr::new("branches"), Value::string(branches.to_string()));
    stats.insert(SmolStr::new("leafs"), Value::string(leafs.to_string()));
    stats.insert(SmolStr::new("size"), Value::string(size.to_string()));

    let built = opts
        .built_at
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let mut info = IndexMap::new();
    info.insert(SmolStr::new("sources"), Value::Dict(sources));
    info.insert(SmolStr::new("built"), Value::string(built));
    info.insert(SmolStr::new("stats"), Value::Dict(stats));
    Value::Dict(info)
}

/// Smallest pointer width that can represent every pointer in a file of
/// `total` bytes, honoring a pinned width if one was given
fn choose_field_size(total: u64, pinned: Option<u16>) -> Result<u16> {
    let largest = (total as u128) * 2;
    let required = (1..=8u16)
        .find(|width| largest < 1u128 << (8 * *width as u32))
        .unwrap_or(9);

    match pinned {
        Some(width) if !(1..=4).contains(&width) => Err(DbError::offset_overflow(width, required)
            .with_context(format!("field size {} is outside the supported range 1..=4", width))),
        Some(width) if width < required => Err(DbError::offset_overflow(width, required)),
        Some(width) => Ok(width),
        // Branch pages reserve 8 bytes, so two pointers wider than 4 bytes
        // cannot fit a page
        None if required > 4 => Err(DbError::offset_overflow(4, required)),
        None => Ok(required),
    }
}
