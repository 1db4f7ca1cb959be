//! Incremental trie construction from ingestion records

use std::collections::VecDeque;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::addr::Cidr;
use crate::error::Result;
use crate::trie::node::{Annotation, Node};

/// One ingestion record from a publisher adapter
///
/// `service` and `region` may be empty; most publishers only fill them for
/// part of their ranges.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    /// Short provider identifier, e.g. `aws`
    pub source: SmolStr,
    /// CIDR prefix in v4 or v6 form
    pub prefix: SmolStr,
    /// Service name
    #[serde(default)]
    pub service: SmolStr,
    /// Region name
    #[serde(default)]
    pub region: SmolStr,
}

/// In-memory database builder
///
/// Grows a single binary trie covering both address families, then hands
/// it to the serializer (see [`write_db_bytes`](crate::dat::writer::write_db_bytes)).
/// Single-threaded and used once: build, serialize, discard.
///
/// # Example
///
/// ```rust,ignore
/// use cumulus_db::DbBuilder;
///
/// let mut builder = DbBuilder::new();
/// builder.register_source("private", "Private IP");
/// builder.insert("private", "127.0.0.0/8", "Loopback", "")?;
/// let bytes = cumulus_db::write_db_bytes(&builder, &Default::default())?;
/// ```
#[derive(Debug, Clone)]
pub struct DbBuilder {
    /// Root branch: `zero` holds IPv4, `one` holds IPv6
    root: Node,
    /// Short name to human-readable name, in registration order
    sources: IndexMap<SmolStr, SmolStr>,
    /// Count of inserted records
    ranges: u64,
}

impl DbBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            root: Node::Branch {
                zero: Box::new(Node::leaf()),
                one: Box::new(Node::leaf()),
            },
            sources: IndexMap::new(),
            ranges: 0,
        }
    }

    /// Register the human-readable name for a short provider identifier
    ///
    /// The mapping ends up in the info page's `sources` dict and is used by
    /// lookups to pretty-print the provider. Registration order is kept.
    pub fn register_source(&mut self, short: impl Into<SmolStr>, pretty: impl Into<SmolStr>) {
        let short = short.into();
        let pretty = pretty.into();
        tracing::debug!(source = %short, name = %pretty, "registering source");
        self.sources.insert(short, pretty);
    }

    /// Insert one prefix claim
    ///
    /// Walks the trie one bit at a time (discriminator bit first, then the
    /// prefix's network bits), splitting path-compressed leaves on the way
    /// down, and appends the annotation to every leaf the prefix covers.
    /// Insertion order is preserved all the way to lookup results.
    pub fn insert(&mut self, source: &str, prefix: &str, service: &str, region: &str) -> Result<()> {
        let cidr = Cidr::parse(prefix)?;
        let annotation = Annotation {
            source: source.into(),
            service: service.into(),
            region: region.into(),
            prefix: cidr.text().clone(),
        };

        let mut node = self.root.descend(if cidr.is_v6() { 1 } else { 0 });
        for i in 0..cidr.network_bits() {
            node = node.descend(cidr.bit(i));
        }

        // The remaining key bits are host bits: the claim covers every
        // leaf under this node.
        let mut todo: VecDeque<&mut Node> = VecDeque::from([node]);
        while let Some(page) = todo.pop_front() {
            match page {
                Node::Leaf(annotations) => annotations.push(annotation.clone()),
                Node::Branch { zero, one } => {
                    todo.push_back(zero.as_mut());
                    todo.push_back(one.as_mut());
                }
            }
        }

        self.ranges += 1;
        tracing::trace!(source, prefix, "inserted range");
        Ok(())
    }

    /// Insert one ingestion record
    pub fn insert_record(&mut self, record: &Record) -> Result<()> {
        self.insert(&record.source, &record.prefix, &record.service, &record.region)
    }

    /// Insert a stream of ingestion records, stopping at the first error
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) -> Result<()> {
        for record in records {
            self.insert_record(&record)?;
        }
        Ok(())
    }

    /// Registered pretty-name map, in registration order
    pub fn sources(&self) -> &IndexMap<SmolStr, SmolStr> {
        &self.sources
    }

    /// Number of records inserted so far
    pub fn ranges(&self) -> u64 {
        self.ranges
    }

    /// Root of the trie (the v4/v6 split branch)
    pub(crate) fn root(&self) -> &Node {
        &self.root
    }
}

impl Default for DbBuilder {
    fn default() -> Self {
        Self::new()
    }
}
