//! Freshness and rank policy (spec §4.4): TTL decay and the validation-rank
//! lattice that gates whether a cached entry may be materialized into an
//! answer.
//!
//! Ranks are a single byte split into two independent axes, the way
//! `entry_h.flags` packs unrelated booleans into one byte (see
//! [`crate::entry`]): a security ordinal (`INITIAL < INSECURE < SECURE`) and
//! an authority bit (`NONAUTH < AUTH`). `BOGUS` sits outside the security
//! ordinal entirely — it marks a validation failure and only ever appears on
//! packet-form (negative) entries, never contributing to `>=` comparisons
//! against a security floor.

use crate::dns::{DNSResourceType, Name};

pub type Rank = u8;

pub const INITIAL: Rank = 0b0000_0000;
pub const INSECURE: Rank = 0b0000_0001;
pub const SECURE: Rank = 0b0000_0010;
pub const BOGUS: Rank = 0b0000_0100;
pub const NONAUTH: Rank = 0b0000_0000;
pub const AUTH: Rank = 0b0000_1000;

fn security_ordinal(rank: Rank) -> u8 {
    if rank & SECURE != 0 {
        2
    } else if rank & INSECURE != 0 {
        1
    } else {
        0
    }
}

pub fn has_auth(rank: Rank) -> bool {
    rank & AUTH != 0
}

pub fn is_bogus(rank: Rank) -> bool {
    rank & BOGUS != 0
}

/// Does `entry_rank` satisfy the floor `lowest`, under lattice comparison?
///
/// `entry_rank >= lowest` iff its security ordinal is at least as high and,
/// if `lowest` requires `AUTH`, `entry_rank` carries it too.
pub fn satisfies(entry_rank: Rank, lowest: Rank) -> bool {
    security_ordinal(entry_rank) >= security_ordinal(lowest) && (!has_auth(lowest) || has_auth(entry_rank))
}

/// `new_ttl(entry, now) = max(0, entry.ttl - max(0, now - entry.time))`.
///
/// Returns `None` when decayed to nothing and no stale override applies;
/// callers holding a stale-serving callback should call [`apply_stale_override`]
/// on a `None` before giving up.
pub fn new_ttl(entry_time: u32, entry_ttl: u32, now: u32) -> Option<u32> {
    let elapsed = now.saturating_sub(entry_time);
    let remaining = (entry_ttl as i64) - (elapsed as i64);
    if remaining >= 0 { Some(remaining as u32) } else { None }
}

/// A stale-serving callback may override a negative `new_ttl` with any
/// non-negative value, including one exceeding the original TTL (spec §9 —
/// no cap is imposed by this layer).
pub trait StaleCallback {
    fn override_ttl(&self, entry_time: u32, entry_ttl: u32, now: u32) -> Option<u32>;
}

/// Request-derived parameters driving the `lowest_rank` table in spec §4.4.
#[derive(Clone, Copy, Debug, Default)]
pub struct RankRequest {
    pub nonauth: bool,
    pub stub_or_cd: bool,
}

/// `lowest_rank` per spec §4.4's table, evaluated top-to-bottom as a
/// priority list (not independent conditions).
pub fn lowest_rank(req: RankRequest, ta_covers: bool) -> Rank {
    if req.nonauth {
        INITIAL
    } else if req.stub_or_cd {
        INITIAL | AUTH
    } else if ta_covers {
        INSECURE | AUTH
    } else {
        INITIAL | AUTH
    }
}

/// Minimal trust-anchor coverage predicate. The cache does not validate
/// DNSSEC itself (that's an external collaborator — spec §1) but the rank
/// gate needs to know whether `(sname, stype)` falls under a configured
/// trust anchor, so callers hand the cache the covered zone set directly.
///
/// Grounded in the heimdall trust-anchor store's domain -> suffix lookup,
/// minus the key-material bookkeeping this cache has no use for.
#[derive(Clone, Debug, Default)]
pub struct TrustAnchorStore {
    zones: std::collections::HashSet<Name>,
}

impl TrustAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root() -> Self {
        let mut s = Self::new();
        s.add(Name::root());
        s
    }

    pub fn add(&mut self, zone: Name) {
        self.zones.insert(zone);
    }

    pub fn remove(&mut self, zone: &Name) {
        self.zones.remove(zone);
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    /// Does any trust anchor zone cover `qname`? Walks ancestors root-ward,
    /// same traversal shape as the closest-NS walk in [`crate::peek`].
    pub fn covers(&self, qname: &Name) -> bool {
        qname.ancestors().any(|ancestor| self.zones.contains(&ancestor))
    }
}

/// Total order used only for overwrite decisions on the stash path (spec §9:
/// "implementers should define and document an explicit policy" — this
/// crate's policy is keep-the-higher-rank, and on a tie keep the newer,
/// i.e. let the incoming write win).
fn overwrite_score(rank: Rank) -> i8 {
    if is_bogus(rank) {
        -1
    } else {
        (security_ordinal(rank) as i8) * 2 + if has_auth(rank) { 1 } else { 0 }
    }
}

pub fn overwrite_allowed(old_rank: Rank, new_rank: Rank) -> bool {
    overwrite_score(new_rank) >= overwrite_score(old_rank)
}

/// `stype` used only on the wire, or bare RRSIG — never a cacheable answer
/// type, consulted by both the peek entry condition and the stash
/// precondition (spec §4.5, §4.6).
pub fn is_cacheable_qtype(qtype: DNSResourceType) -> bool {
    !qtype.is_meta_type() && qtype != DNSResourceType::RRSIG
}
