//! Stash Pipeline (spec §4.5): given a validated RRSet and its optional
//! RRSIG set, selects which key variant to write under and dematerializes
//! the record.

use crate::backend::Backend;
use crate::config::CacheOpts;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name::Name;
use crate::dns::rr::{RRSet, RrSigSet};
use crate::entry::{self, EntryHeader, FLAG_HAS_CNAME, FLAG_HAS_DNAME, FLAG_HAS_NS, FLAG_HAS_NSEC};
use crate::error::{CacheError, Result};
use crate::key;
use crate::rank::{self, Rank};
use crate::stats::CacheStats;
use tracing::{debug, trace};

/// Why a record didn't make it into the store. All of these are
/// "processing continues" outcomes (spec §4.5 step 7, §7) — stash never
/// hard-fails, it just doesn't persist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StashOutcome {
    Stashed,
    SkippedMalformedSignatureCoverage,
    SkippedPrecondition,
    SkippedLowerRank,
    SkippedBackendError,
}

fn precondition_ok(rrset: &RRSet) -> bool {
    rrset.rclass == DNSResourceClass::IN
        && !rrset.rtype.is_meta_type()
        && rrset.rtype != DNSResourceType::RRSIG
        && !rrset.owner.has_zero_byte_label()
}

fn min_ttl(rrset: &RRSet, sigs: Option<&RrSigSet>) -> Option<u32> {
    let rr_min = rrset.min_ttl();
    let sig_min = sigs.and_then(|s| s.min_ttl());
    match (rr_min, sig_min) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Persists one RRSet (spec §4.5). `now` is the stash timestamp.
pub fn stash_rrset(
    backend: &dyn Backend,
    opts: &CacheOpts,
    stats: &mut CacheStats,
    rrset: &RRSet,
    sigs: Option<&RrSigSet>,
    rank: Rank,
    now: u32,
) -> Result<StashOutcome> {
    if !precondition_ok(rrset) {
        trace!("skipping stash of {} {:?}: precondition failed", rrset.owner, rrset.rtype);
        return Ok(StashOutcome::SkippedPrecondition);
    }

    let owner_labels = rrset.owner.label_count() as i64;
    let sig_labels = sigs
        .and_then(|s| s.representative())
        .map(|sig| sig.labels as i64)
        .unwrap_or(0);
    let wild_labels = owner_labels - sig_labels;
    if wild_labels < 0 {
        debug!("dropping {} {:?}: signature covers fewer labels than the owner", rrset.owner, rrset.rtype);
        return Ok(StashOutcome::SkippedMalformedSignatureCoverage);
    }
    let encloser = rrset.owner.strip_leading(wild_labels as usize);

    let (key_bytes, value, flags_type) = if rrset.rtype == DNSResourceType::NSEC {
        let Some(sigs) = sigs else {
            return Ok(StashOutcome::SkippedPrecondition);
        };
        if sigs.sigs.is_empty() || !rank::satisfies(rank, rank::SECURE) {
            return Ok(StashOutcome::SkippedPrecondition);
        }
        let signer = &sigs.sigs[0].signer_name;
        let zone_lf_len = key::zlf_len(signer)? as u16;
        let ttl = min_ttl(rrset, Some(sigs)).map(|t| opts.clamp(t)).unwrap_or(opts.ttl_min);
        let header = EntryHeader {
            time: now,
            ttl,
            rank,
            flags: FLAG_HAS_NSEC,
        };
        let key_bytes = key::key_nsec1(&encloser)?;
        let value = entry::encode_nsec1_entry(header, zone_lf_len, rrset, sigs);
        (key_bytes, value, DNSResourceType::NSEC)
    } else {
        let key_bytes = key::key_exact_stash(&encloser, rrset.rtype)?;
        let mut flags = 0u8;
        match rrset.rtype {
            DNSResourceType::NS => flags |= FLAG_HAS_NS,
            DNSResourceType::CNAME => flags |= FLAG_HAS_CNAME,
            DNSResourceType::DNAME => flags |= FLAG_HAS_DNAME,
            _ => {}
        }
        let ttl = min_ttl(rrset, sigs).map(|t| opts.clamp(t)).unwrap_or(opts.ttl_min);
        let header = EntryHeader {
            time: now,
            ttl,
            rank,
            flags,
        };
        let value = entry::encode_rrset_entry(header, rrset, sigs);
        (key_bytes, value, rrset.rtype)
    };
    let _ = flags_type;

    if let Some(existing) = backend.read(&key_bytes)? {
        if let Ok(view) = entry::consistent(&existing, rrset.rtype) {
            if !rank::overwrite_allowed(view.header.rank, rank) {
                trace!("not overwriting {} {:?}: incumbent rank is higher", rrset.owner, rrset.rtype);
                return Ok(StashOutcome::SkippedLowerRank);
            }
        }
    }

    match backend.write(&key_bytes, &value) {
        Ok(()) => {
            stats.record_insert();
            Ok(StashOutcome::Stashed)
        }
        Err(CacheError::Backend(e)) => {
            debug!("backend write failed for {} {:?}: {}", rrset.owner, rrset.rtype, e);
            Ok(StashOutcome::SkippedBackendError)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mem_backend::MemBackend;
    use crate::dns::rr::{Rdata, RrSig};

    fn a_rrset(owner: &str) -> RRSet {
        let mut rrset = RRSet::new(Name::parse(owner), DNSResourceType::A, DNSResourceClass::IN);
        rrset.records.push(Rdata {
            rdata: vec![192, 0, 2, 1],
            ttl: 300,
        });
        rrset
    }

    #[test]
    fn stashes_a_record_under_exact_key() {
        let backend = MemBackend::new();
        let opts = CacheOpts::default();
        let mut stats = CacheStats::new();
        let rrset = a_rrset("example.com.");
        let outcome = stash_rrset(
            &backend,
            &opts,
            &mut stats,
            &rrset,
            None,
            rank::SECURE | rank::AUTH,
            1000,
        )
        .unwrap();
        assert_eq!(outcome, StashOutcome::Stashed);
        let key_bytes = key::key_exact(&Name::parse("example.com."), DNSResourceType::A).unwrap();
        assert!(backend.read(&key_bytes).unwrap().is_some());
    }

    #[test]
    fn cname_stashes_under_ns_key() {
        let backend = MemBackend::new();
        let opts = CacheOpts::default();
        let mut stats = CacheStats::new();
        let mut rrset = RRSet::new(
            Name::parse("alias.example.com."),
            DNSResourceType::CNAME,
            DNSResourceClass::IN,
        );
        rrset.records.push(Rdata {
            rdata: b"target.example.com.".to_vec(),
            ttl: 300,
        });
        stash_rrset(&backend, &opts, &mut stats, &rrset, None, rank::SECURE | rank::AUTH, 1000).unwrap();
        let key_bytes =
            key::key_exact(&Name::parse("alias.example.com."), DNSResourceType::NS).unwrap();
        let stored = backend.read(&key_bytes).unwrap().unwrap();
        let view = entry::consistent(&stored, DNSResourceType::NS).unwrap();
        assert!(view.header.has_cname());
    }

    #[test]
    fn lower_rank_does_not_overwrite_higher() {
        let backend = MemBackend::new();
        let opts = CacheOpts::default();
        let mut stats = CacheStats::new();
        let rrset = a_rrset("example.com.");
        stash_rrset(&backend, &opts, &mut stats, &rrset, None, rank::SECURE | rank::AUTH, 1000).unwrap();
        let outcome = stash_rrset(&backend, &opts, &mut stats, &rrset, None, rank::INSECURE, 1001).unwrap();
        assert_eq!(outcome, StashOutcome::SkippedLowerRank);
    }

    #[test]
    fn nsec_without_sigs_is_skipped() {
        let backend = MemBackend::new();
        let opts = CacheOpts::default();
        let mut stats = CacheStats::new();
        let rrset = RRSet::new(Name::parse("a.example."), DNSResourceType::NSEC, DNSResourceClass::IN);
        let outcome = stash_rrset(&backend, &opts, &mut stats, &rrset, None, rank::SECURE, 1000).unwrap();
        assert_eq!(outcome, StashOutcome::SkippedPrecondition);
    }

    #[test]
    fn negative_wild_labels_drops_record() {
        let backend = MemBackend::new();
        let opts = CacheOpts::default();
        let mut stats = CacheStats::new();
        let rrset = a_rrset("a.example.com.");
        let sigs = RrSigSet {
            owner: rrset.owner.clone(),
            sigs: vec![RrSig {
                type_covered: DNSResourceType::A,
                labels: 10,
                signer_name: Name::parse("example.com."),
                rdata: vec![],
                ttl: 300,
            }],
        };
        let outcome = stash_rrset(
            &backend,
            &opts,
            &mut stats,
            &rrset,
            Some(&sigs),
            rank::SECURE | rank::AUTH,
            1000,
        )
        .unwrap();
        assert_eq!(outcome, StashOutcome::SkippedMalformedSignatureCoverage);
    }
}
