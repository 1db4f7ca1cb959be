//! Address and prefix parsing
//!
//! The database stores IPv4 and IPv6 in one trie by prepending a single
//! discriminator bit to every address: 0 for v4, 1 for v6. On the wire
//! that bit rides in a full leading byte (`0x00` or `0xFF`) so lookups can
//! index bits without special-casing the first one.

use std::net::{Ipv4Addr, Ipv6Addr};

use smol_str::SmolStr;

use crate::error::{DbError, Result};

/// A parsed CIDR prefix
///
/// The address is kept exactly as given; host bits past `network_bits` are
/// ignored during insertion, so non-canonical prefixes like `10.0.0.1/8`
/// are accepted the way the publishers emit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cidr {
    octets: [u8; 16],
    octet_len: usize,
    network_bits: u8,
    text: SmolStr,
}

impl Cidr {
    /// Parse a CIDR in `a.b.c.d/n` or `h:h:…/n` form
    ///
    /// The `/n` part is optional and defaults to the full address length.
    /// The address family is chosen by the presence of `:`, matching the
    /// lookup side.
    pub fn parse(text: &str) -> Result<Self> {
        let (addr_part, mask_part) = match text.split_once('/') {
            Some((addr, mask)) => (addr, Some(mask)),
            None => (text, None),
        };

        let (octets, octet_len) = parse_addr(addr_part).ok_or_else(|| {
            DbError::invalid_address(text)
        })?;

        let max_bits = (octet_len * 8) as u8;
        let network_bits = match mask_part {
            Some(mask) => {
                let bits: u8 = mask.parse().map_err(|_| DbError::invalid_address(text))?;
                if bits > max_bits {
                    return Err(DbError::invalid_address(text));
                }
                bits
            }
            None => max_bits,
        };

        Ok(Self {
            octets,
            octet_len,
            network_bits,
            text: SmolStr::new(text),
        })
    }

    /// Whether this is an IPv6 prefix
    pub fn is_v6(&self) -> bool {
        self.octet_len == 16
    }

    /// Number of leading network bits
    pub fn network_bits(&self) -> u8 {
        self.network_bits
    }

    /// The prefix exactly as it was given
    pub fn text(&self) -> &SmolStr {
        &self.text
    }

    /// Address bit `index`, MSB-first, not counting the discriminator
    pub(crate) fn bit(&self, index: u8) -> u8 {
        bit_at(&self.octets[..self.octet_len], index as usize)
    }
}

/// Build the lookup key bytes for a textual IP address
///
/// IPv4 yields 5 bytes (`0x00` + address), IPv6 yields 17 (`0xFF` +
/// address), both network byte order.
pub fn ip_key(text: &str) -> Result<Vec<u8>> {
    let (octets, octet_len) = parse_addr(text).ok_or_else(|| DbError::invalid_address(text))?;
    let mut key = Vec::with_capacity(1 + octet_len);
    key.push(if octet_len == 16 { 0xFF } else { 0x00 });
    key.extend_from_slice(&octets[..octet_len]);
    Ok(key)
}

/// Bit `index` of `bytes`, MSB-first across bytes
pub(crate) fn bit_at(bytes: &[u8], index: usize) -> u8 {
    (bytes[index / 8] >> (7 - index % 8)) & 1
}

fn parse_addr(text: &str) -> Option<([u8; 16], usize)> {
    let mut octets = [0u8; 16];
    if text.contains(':') {
        let addr: Ipv6Addr = text.parse().ok()?;
        octets.copy_from_slice(&addr.octets());
        Some((octets, 16))
    } else {
        let addr: Ipv4Addr = text.parse().ok()?;
        octets[..4].copy_from_slice(&addr.octets());
        Some((octets, 4))
    }
}
