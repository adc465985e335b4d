//! Minimal RRSet types the cache core operates on.
//!
//! Wire parsing and signature validation live upstream of this crate (the
//! resolver's packet codec and DNSSEC validator); by the time a record
//! reaches `stash`, its rdata is already-validated opaque bytes and its
//! RRSIG metadata (signer name, label count) has already been extracted by
//! the validator. This module only holds the shapes the cache needs to
//! dematerialize and rematerialize records.

use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::Name;

/// A single resource record's variable part: rdata plus its own TTL.
///
/// Wire RRsets may carry slightly different TTLs per RR even though they
/// share an owner/type/class; the entry TTL is the minimum across the set.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rdata {
    pub rdata: Vec<u8>,
    pub ttl: u32,
}

/// A validated RRSet: one owner, one type, one class, one or more RRs.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RRSet {
    pub owner: Name,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub records: Vec<Rdata>,
}

impl RRSet {
    pub fn new(owner: Name, rtype: DNSResourceType, rclass: DNSResourceClass) -> Self {
        Self {
            owner,
            rtype,
            rclass,
            records: Vec::new(),
        }
    }

    pub fn min_ttl(&self) -> Option<u32> {
        self.records.iter().map(|r| r.ttl).min()
    }
}

/// A single RRSIG, with the fields the stash/NSEC pipelines need already
/// pulled out by the validator: which RRset it covers, how many labels were
/// signed (RFC 4034 "Labels" field — distinct from `owner`'s label count
/// whenever the signature covers a wildcard expansion), and the signer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RrSig {
    pub type_covered: DNSResourceType,
    pub labels: u8,
    pub signer_name: Name,
    pub rdata: Vec<u8>,
    pub ttl: u32,
}

/// The RRSIG set covering one owner/type, paired 1:1 with an [`RRSet`] on
/// the stash path.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RrSigSet {
    pub owner: Name,
    pub sigs: Vec<RrSig>,
}

impl RrSigSet {
    pub fn min_ttl(&self) -> Option<u32> {
        self.sigs.iter().map(|s| s.ttl).min()
    }

    /// All sigs in a set are assumed to share the same `labels`/signer, per
    /// RFC 4035 §2.2 — only the first is consulted.
    pub fn representative(&self) -> Option<&RrSig> {
        self.sigs.first()
    }
}
