//! The cache handle: the programmatic surface consumed by the resolver core
//! (spec §6), gluing together the backend, the rank/freshness policy, and
//! the stash/peek pipelines. One handle per resolver instance — no
//! process-global state (spec §9).

use crate::backend::mem_backend::MemBackend;
use crate::backend::sled_backend::SledBackend;
use crate::backend::Backend;
use crate::config::CacheOpts;
use crate::dns::enums::DNSResourceType;
use crate::dns::name::Name;
use crate::dns::rr::{RRSet, RrSigSet};
use crate::entry::{self, EntryHeader};
use crate::error::{CacheError, Result};
use crate::lifecycle;
use crate::peek::{self, PeekOutcome, PeekRequest};
use crate::rank::{Rank, StaleCallback, TrustAnchorStore};
use crate::stash::{self, StashOutcome};
use crate::stats::CacheStats;
use tracing::info;

pub struct CacheHandle {
    backend: Box<dyn Backend>,
    opts: CacheOpts,
    stats: CacheStats,
    pub trust_anchors: TrustAnchorStore,
}

/// A diagnostic view of a raw entry header, returned by [`CacheHandle::peek_exact`].
#[derive(Debug)]
pub struct ExactPeek {
    pub header: EntryHeader,
}

impl CacheHandle {
    /// `cache_open(opts) -> status`, using the default embedded backend.
    pub fn open(opts: CacheOpts) -> Result<Self> {
        info!("opening cache at {}", opts.path.display());
        let backend = Box::new(SledBackend::open(&opts)?);
        Self::open_with_backend(backend, opts)
    }

    /// Opens against an arbitrary backend — the in-process `MemBackend` for
    /// tests, or any other `Backend` implementation.
    pub fn open_with_backend(backend: Box<dyn Backend>, opts: CacheOpts) -> Result<Self> {
        lifecycle::check_and_migrate(backend.as_ref())?;
        Ok(Self {
            backend,
            opts,
            stats: CacheStats::new(),
            trust_anchors: TrustAnchorStore::with_root(),
        })
    }

    /// A temporary, disk-backed handle for tests that want real `sled`
    /// semantics without the `MemBackend` shortcut.
    pub fn open_temporary() -> Result<Self> {
        let backend = Box::new(SledBackend::open_temporary()?);
        Self::open_with_backend(backend, CacheOpts::default())
    }

    /// An in-process handle with no disk I/O at all.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_backend(Box::new(MemBackend::new()), CacheOpts::default())
    }

    pub fn close(self) -> Result<()> {
        self.backend.sync()
    }

    /// `cache_sync(handle) -> status`.
    pub fn sync(&self) -> Result<()> {
        self.backend.sync()
    }

    /// `cache_clear(handle) -> status` — purge and re-sentinel.
    pub fn clear(&mut self) -> Result<()> {
        self.backend.clear()?;
        lifecycle::check_and_migrate(self.backend.as_ref())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// `cache_insert_rr(handle, rr, rrsig?, rank, now) -> status` — the
    /// single-RRSet convenience wrapper around the stash pipeline.
    pub fn insert_rr(
        &mut self,
        rrset: &RRSet,
        sigs: Option<&RrSigSet>,
        rank: Rank,
        now: u32,
    ) -> Result<StashOutcome> {
        stash::stash_rrset(self.backend.as_ref(), &self.opts, &mut self.stats, rrset, sigs, rank, now)
    }

    /// `cache_stash(layer_ctx, pkt) -> layer_state`: stashes every
    /// `(rrset, rrsig)` pair the resolver's validator handed over after a
    /// query resolved upstream. Packet-section iteration and RRSIG pairing
    /// by `(owner, covered_type)` happen upstream of this crate (spec §1);
    /// callers pass already-paired records.
    pub fn stash_all(
        &mut self,
        records: &[(RRSet, Option<RrSigSet>, Rank)],
        now: u32,
    ) -> Result<Vec<StashOutcome>> {
        records
            .iter()
            .map(|(rrset, sigs, rank)| self.insert_rr(rrset, sigs.as_ref(), *rank, now))
            .collect()
    }

    /// `cache_peek_exact(handle, name, type, out_peek) -> status` —
    /// diagnostic surface, refuses packet-form entries.
    pub fn peek_exact(&self, name: &Name, rtype: DNSResourceType) -> Result<ExactPeek> {
        let key = crate::key::key_exact(name, rtype)?;
        let Some(value) = self.backend.read(&key)? else {
            return Err(CacheError::Miss);
        };
        let view = entry::consistent(&value, rtype)?;
        if view.header.is_packet() {
            return Err(CacheError::NotSupported(
                "peek_exact does not replay packet-form entries".into(),
            ));
        }
        Ok(ExactPeek { header: view.header })
    }

    /// `cache_peek(layer_ctx, pkt) -> layer_state`: the stateful peek
    /// described in spec §4.6.
    pub fn peek(&mut self, req: &PeekRequest, stale: Option<&dyn StaleCallback>) -> Result<PeekOutcome> {
        let outcome = peek::peek(
            self.backend.as_ref(),
            &self.opts,
            &mut self.stats,
            &self.trust_anchors,
            req,
            stale,
        )?;
        self.backend.sync()?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::DNSResourceClass;
    use crate::dns::rr::Rdata;
    use crate::rank;

    #[test]
    fn open_then_insert_then_peek_exact() {
        let mut handle = CacheHandle::open_in_memory().unwrap();
        let mut rrset = RRSet::new(Name::parse("example.com."), DNSResourceType::A, DNSResourceClass::IN);
        rrset.records.push(Rdata {
            rdata: vec![192, 0, 2, 1],
            ttl: 300,
        });
        handle
            .insert_rr(&rrset, None, rank::SECURE | rank::AUTH, 1000)
            .unwrap();
        let exact = handle.peek_exact(&rrset.owner, DNSResourceType::A).unwrap();
        assert_eq!(exact.header.rank, rank::SECURE | rank::AUTH);
    }

    #[test]
    fn clear_then_miss() {
        let mut handle = CacheHandle::open_in_memory().unwrap();
        let mut rrset = RRSet::new(Name::parse("example.com."), DNSResourceType::A, DNSResourceClass::IN);
        rrset.records.push(Rdata { rdata: vec![1, 2, 3, 4], ttl: 300 });
        handle.insert_rr(&rrset, None, rank::SECURE | rank::AUTH, 1000).unwrap();
        handle.clear().unwrap();
        assert!(handle.peek_exact(&rrset.owner, DNSResourceType::A).is_err());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut handle = CacheHandle::open_in_memory().unwrap();
        handle.clear().unwrap();
        handle.clear().unwrap();
    }
}
