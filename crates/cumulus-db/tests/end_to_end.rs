//! End-to-end build/lookup tests over the binary container

use bytes::Bytes;
use cumulus_db::{
    ByteSource, DbBuilder, DbErrorKind, MemorySource, Query, WriteOptions, info, info_path,
    lookup, lookup_path, query, write_db, write_db_bytes,
};

fn build_bytes(sources: &[(&str, &str)], records: &[(&str, &str, &str, &str)]) -> Vec<u8> {
    let mut builder = DbBuilder::new();
    for (short, pretty) in sources {
        builder.register_source(*short, *pretty);
    }
    for (source, prefix, service, region) in records {
        builder.insert(source, prefix, service, region).unwrap();
    }
    write_db_bytes(&builder, &WriteOptions::default()).unwrap()
}

fn build(sources: &[(&str, &str)], records: &[(&str, &str, &str, &str)]) -> MemorySource {
    MemorySource::new(build_bytes(sources, records))
}

#[tokio::test]
async fn test_s1_private_loopback() {
    let mut db = build(
        &[("private", "Private IP")],
        &[("private", "127.0.0.0/8", "Loopback", "")],
    );

    let matches = lookup(&mut db, "127.1.2.7").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].source, "Private IP");
    assert_eq!(matches[0].service.as_deref(), Some("Loopback"));
    assert_eq!(matches[0].region, None);
    assert_eq!(matches[0].prefix.as_deref(), Some("127.0.0.0/8"));

    assert!(lookup(&mut db, "126.255.255.255").await.unwrap().is_empty());
    assert!(lookup(&mut db, "128.0.0.0").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_s2_overlapping_claims() {
    let mut db = build(
        &[("aws", "AWS"), ("google", "Google")],
        &[
            ("aws", "34.80.0.0/15", "EC2", "ap-northeast-1"),
            ("google", "34.80.0.0/16", "compute", "asia-east1"),
        ],
    );

    // Inside both prefixes: both claims, in insertion order
    let matches = lookup(&mut db, "34.80.0.0").await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].source, "AWS");
    assert_eq!(matches[0].service.as_deref(), Some("EC2"));
    assert_eq!(matches[0].region.as_deref(), Some("ap-northeast-1"));
    assert_eq!(matches[1].source, "Google");
    assert_eq!(matches[1].region.as_deref(), Some("asia-east1"));

    // Inside the /15 but past the /16: only the aws claim
    let matches = lookup(&mut db, "34.81.0.0").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].source, "AWS");
}

#[tokio::test]
async fn test_s3_ipv6() {
    let mut db = build(
        &[("azure", "Azure")],
        &[("azure", "2a01:111:f403:f910::/62", "AzureCloud", "eastus")],
    );

    let matches = lookup(&mut db, "2a01:111:f403:f910::").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].source, "Azure");
    assert_eq!(matches[0].service.as_deref(), Some("AzureCloud"));
    assert_eq!(matches[0].region.as_deref(), Some("eastus"));

    // Last address of the /62 still matches, the next one doesn't
    let matches = lookup(&mut db, "2a01:111:f403:f913:ffff:ffff:ffff:ffff")
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert!(
        lookup(&mut db, "2a01:111:f403:f914::")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_s4_unclaimed_space() {
    let mut db = build(
        &[("private", "Private IP")],
        &[("private", "10.0.0.0/8", "", "")],
    );
    assert!(lookup(&mut db, "8.8.8.8").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_s5_info_page() {
    let mut db = build(
        &[("private", "Private IP")],
        &[("private", "127.0.0.0/8", "Loopback", "")],
    );

    let info = info(&mut db).await.unwrap();
    let sources = info.get("sources").unwrap();
    assert_eq!(
        sources.get("private").and_then(|v| v.as_str()),
        Some("Private IP")
    );

    // built is YYYY-MM-DD HH:MM:SS
    let built = info.get("built").unwrap().as_str().unwrap();
    assert_eq!(built.len(), 19);
    for (index, c) in built.char_indices() {
        match index {
            4 | 7 => assert_eq!(c, '-', "{:?}", built),
            10 => assert_eq!(c, ' ', "{:?}", built),
            13 | 16 => assert_eq!(c, ':', "{:?}", built),
            _ => assert!(c.is_ascii_digit(), "{:?}", built),
        }
    }

    let stats = info.get("stats").unwrap();
    assert_eq!(stats.get("ranges").and_then(|v| v.as_str()), Some("1"));
    assert_eq!(stats.get("sources").and_then(|v| v.as_str()), Some("1"));
}

#[tokio::test]
async fn test_s6_sources_dict_cap() {
    let mut builder = DbBuilder::new();
    for i in 0..63 {
        builder.register_source(format!("src{}", i), format!("Source {}", i));
    }
    let err = write_db_bytes(&builder, &WriteOptions::default()).unwrap_err();
    assert_eq!(err.kind(), &DbErrorKind::DictTooLarge);
}

#[tokio::test]
async fn test_no_leakage_on_split() {
    let mut db = build(
        &[],
        &[("A", "10.0.0.0/8", "", ""), ("B", "10.0.0.0/24", "", "")],
    );

    let sources: Vec<_> = lookup(&mut db, "10.0.0.1")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.source)
        .collect();
    assert_eq!(sources, vec!["A", "B"]);

    let sources: Vec<_> = lookup(&mut db, "10.1.0.1")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.source)
        .collect();
    assert_eq!(sources, vec!["A"]);
}

#[tokio::test]
async fn test_split_children_independent() {
    let mut db = build(
        &[],
        &[("A", "0.0.0.0/0", "", ""), ("B", "0.0.0.0/1", "", "")],
    );

    // 200.0.0.1 sits in the upper half, which the /1 never touched
    let sources: Vec<_> = lookup(&mut db, "200.0.0.1")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.source)
        .collect();
    assert_eq!(sources, vec!["A"]);

    let sources: Vec<_> = lookup(&mut db, "1.2.3.4")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.source)
        .collect();
    assert_eq!(sources, vec!["A", "B"]);
}

#[tokio::test]
async fn test_order_preservation() {
    let mut db = build(
        &[],
        &[
            ("one", "192.0.2.0/24", "", ""),
            ("two", "192.0.2.0/25", "", ""),
            ("three", "192.0.2.0/26", "", ""),
            ("one", "192.0.2.0/27", "again", ""),
        ],
    );

    let matches = lookup(&mut db, "192.0.2.1").await.unwrap();
    let sources: Vec<_> = matches.iter().map(|m| m.source.as_str()).collect();
    assert_eq!(sources, vec!["one", "two", "three", "one"]);
    assert_eq!(matches[3].service.as_deref(), Some("again"));
}

#[tokio::test]
async fn test_address_space_partition() {
    let mut db = build(
        &[],
        &[("v4", "0.0.0.0/0", "", ""), ("v6", "::/0", "", "")],
    );

    for ip in ["0.0.0.0", "127.0.0.1", "255.255.255.255"] {
        let matches = lookup(&mut db, ip).await.unwrap();
        assert_eq!(matches.len(), 1, "{}", ip);
        assert_eq!(matches[0].source, "v4", "{}", ip);
    }
    for ip in ["::", "::1", "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"] {
        let matches = lookup(&mut db, ip).await.unwrap();
        assert_eq!(matches.len(), 1, "{}", ip);
        assert_eq!(matches[0].source, "v6", "{}", ip);
    }
}

#[tokio::test]
async fn test_round_trip_samples_across_prefix() {
    let mut db = build(
        &[("hetzner", "Hetzner")],
        &[("hetzner", "65.108.0.0/14", "cloud", "eu-central")],
    );

    // First, last, and interior addresses of the prefix all carry the claim
    for ip in ["65.108.0.0", "65.111.255.255", "65.109.77.3"] {
        let matches = lookup(&mut db, ip).await.unwrap();
        assert_eq!(matches.len(), 1, "{}", ip);
        assert_eq!(matches[0].source, "Hetzner");
        assert_eq!(matches[0].prefix.as_deref(), Some("65.108.0.0/14"));
    }
    assert!(lookup(&mut db, "65.112.0.0").await.unwrap().is_empty());
    assert!(lookup(&mut db, "65.107.255.255").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unregistered_source_falls_back_to_short_name() {
    let mut db = build(&[], &[("mystery", "192.0.2.0/24", "", "")]);
    let matches = lookup(&mut db, "192.0.2.7").await.unwrap();
    assert_eq!(matches[0].source, "mystery");
}

#[tokio::test]
async fn test_query_sentinel() {
    let mut db = build(
        &[("private", "Private IP")],
        &[("private", "127.0.0.0/8", "", "")],
    );

    match query(&mut db, "info").await.unwrap() {
        Query::Info(value) => assert!(value.get("sources").is_some()),
        Query::Matches(_) => panic!("expected the info page"),
    }
    match query(&mut db, "127.0.0.1").await.unwrap() {
        Query::Matches(matches) => assert_eq!(matches.len(), 1),
        Query::Info(_) => panic!("expected matches"),
    }
}

#[tokio::test]
async fn test_invalid_address() {
    let mut db = build(&[], &[]);
    for bad in ["not-an-ip", "10.0.0", "10.0.0.0/8", ""] {
        let err = lookup(&mut db, bad).await.unwrap_err();
        assert_eq!(err.kind(), &DbErrorKind::InvalidAddress, "{:?}", bad);
    }
}

#[tokio::test]
async fn test_unsupported_version() {
    let mut bytes = build_bytes(&[], &[]);
    bytes[21..23].copy_from_slice(&7u16.to_be_bytes());
    let mut db = MemorySource::new(bytes);
    let err = lookup(&mut db, "10.0.0.1").await.unwrap_err();
    assert_eq!(err.kind(), &DbErrorKind::UnsupportedVersion);
}

#[tokio::test]
async fn test_truncated_database() {
    let bytes = build_bytes(&[], &[("a", "10.0.0.0/8", "", "")]);
    let mut db = MemorySource::new(bytes[..130].to_vec());
    let err = lookup(&mut db, "10.0.0.1").await.unwrap_err();
    assert_eq!(err.kind(), &DbErrorKind::TruncatedInput);
}

#[tokio::test]
async fn test_serializer_idempotent_with_pinned_timestamp() {
    let mut builder = DbBuilder::new();
    builder.register_source("aws", "AWS");
    builder.insert("aws", "34.80.0.0/15", "EC2", "").unwrap();

    let opts = WriteOptions {
        built_at: Some(chrono::DateTime::from_timestamp(1_750_000_000, 0).unwrap()),
        ..Default::default()
    };
    assert_eq!(
        write_db_bytes(&builder, &opts).unwrap(),
        write_db_bytes(&builder, &opts).unwrap()
    );
}

#[tokio::test]
async fn test_file_round_trip() {
    let mut builder = DbBuilder::new();
    builder.register_source("private", "Private IP");
    builder.insert("private", "127.0.0.0/8", "Loopback", "").unwrap();

    let temp_file = tempfile::NamedTempFile::new().unwrap();
    write_db(temp_file.path(), &builder, &WriteOptions::default())
        .await
        .unwrap();

    let matches = lookup_path(temp_file.path(), "127.0.0.1").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].source, "Private IP");

    let info = info_path(temp_file.path()).await.unwrap();
    assert!(info.get("built").is_some());
}

#[tokio::test]
async fn test_match_json_shape() {
    let mut db = build(
        &[("private", "Private IP")],
        &[("private", "127.0.0.0/8", "Loopback", "")],
    );
    let matches = lookup(&mut db, "127.0.0.1").await.unwrap();
    let json = serde_json::to_value(&matches[0]).unwrap();

    assert_eq!(json["source"], "Private IP");
    assert_eq!(json["service"], "Loopback");
    assert_eq!(json["prefix"], "127.0.0.0/8");
    // Empty region was dropped, not serialized as null
    assert!(json.get("region").is_none());
}

/// Counts positional reads to pin down the lookup's read budget
struct CountingSource {
    inner: MemorySource,
    reads: usize,
}

impl ByteSource for CountingSource {
    async fn read_at(&mut self, offset: u64, len: usize) -> cumulus_db::Result<Bytes> {
        self.reads += 1;
        self.inner.read_at(offset, len).await
    }
}

#[tokio::test]
async fn test_read_budget() {
    // A /128 forces the deepest possible walk: 129 branch reads
    let bytes = build_bytes(&[], &[("deep", "::1/128", "", "")]);
    let mut db = CountingSource {
        inner: MemorySource::new(bytes),
        reads: 0,
    };

    let matches = lookup(&mut db, "::1").await.unwrap();
    assert_eq!(matches.len(), 1);

    // 129 branch reads, plus the header and the leaf and info decodes
    assert!(db.reads <= 129 + 4, "{} reads", db.reads);
}
