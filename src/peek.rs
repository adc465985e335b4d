//! Peek Pipeline (spec §4.6): the query-time state machine S0-S6 — exact
//! hit, closest NS/xNAME walk, NSEC encloser search, source-of-synthesis
//! check, wildcard expansion, SOA attachment, packet assembly.

use crate::backend::Backend;
use crate::config::CacheOpts;
use crate::dns::enums::{DNSResourceClass, DNSResourceType, ResponseCode};
use crate::dns::name::Name;
use crate::dns::rr::RRSet;
use crate::entry::{self};
use crate::error::Result;
use crate::key;
use crate::nsec_data::NsecData;
use crate::rank::{self, Rank, RankRequest, StaleCallback, TrustAnchorStore};
use crate::stats::CacheStats;
use tracing::trace;

/// TTLs at or below this are reported as `expiring` (spec §4.6 S6).
pub const EXPIRY_THRESHOLD: u32 = 1;

#[derive(Clone, Debug)]
pub struct PeekRequest {
    pub sname: Name,
    pub stype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub now: u32,
    pub rank_req: RankRequest,
    pub dnssec_want: bool,
    pub no_cache: bool,
    pub cache_tried: bool,
}

#[derive(Clone, Debug)]
pub struct PeekResult {
    pub rcode: ResponseCode,
    pub answer: Vec<RRSet>,
    pub authority: Vec<RRSet>,
    pub cached: bool,
    pub no_minimize: bool,
    pub dnssec_insecure: bool,
    pub dnssec_want: bool,
    pub expiring: bool,
}

#[derive(Debug)]
pub enum PeekOutcome {
    /// A stored packet-form entry, returned verbatim.
    Packet(Vec<u8>),
    /// A synthesized answer, built from dematerialized RRSets.
    Answer(PeekResult),
    /// Cache miss — the resolver must iterate upstream.
    Miss,
}

fn soft_read(backend: &dyn Backend, key: &[u8]) -> Option<Vec<u8>> {
    backend.read(key).ok().flatten()
}

fn soft_read_leq(backend: &dyn Backend, probe: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    backend.read_leq(probe).ok().flatten()
}

fn effective_ttl(
    time: u32,
    ttl: u32,
    now: u32,
    stale: Option<&dyn StaleCallback>,
) -> Option<u32> {
    rank::new_ttl(time, ttl, now).or_else(|| stale.and_then(|cb| cb.override_ttl(time, ttl, now)))
}

/// Standard NSEC coverage test on canonical (LF-byte) names, with
/// wraparound for the last NSEC in a zone (whose `next` is the apex).
fn name_in_range(owner_lf: &[u8], next_lf: &[u8], probe_lf: &[u8]) -> bool {
    if owner_lf < next_lf {
        owner_lf <= probe_lf && probe_lf < next_lf
    } else {
        probe_lf >= owner_lf || probe_lf < next_lf
    }
}

/// S0: exact-hit probe. Returns `Some` to short-circuit the pipeline.
fn s0_exact_hit(
    backend: &dyn Backend,
    req: &PeekRequest,
    lowest: Rank,
    stale: Option<&dyn StaleCallback>,
) -> Option<PeekOutcome> {
    let key_bytes = key::key_exact(&req.sname, req.stype).ok()?;
    let value = soft_read(backend, &key_bytes)?;
    let view = entry::consistent(&value, req.stype).ok()?;
    if !rank::satisfies(view.header.rank, lowest) {
        return None;
    }
    let new_ttl = effective_ttl(view.header.time, view.header.ttl, req.now, stale)?;

    if view.header.is_packet() {
        return Some(PeekOutcome::Packet(entry::decode_packet(&view).ok()?.to_vec()));
    }

    let (rrset, _sigs) =
        entry::rematerialize(&view, req.sname.clone(), req.stype, req.rclass, new_ttl).ok()?;
    Some(PeekOutcome::Answer(PeekResult {
        rcode: ResponseCode::NoError,
        answer: vec![rrset],
        authority: Vec::new(),
        cached: true,
        no_minimize: true,
        dnssec_insecure: view.header.rank & rank::INSECURE != 0,
        dnssec_want: req.dnssec_want,
        expiring: new_ttl <= EXPIRY_THRESHOLD,
    }))
}

enum NsWalkOutcome {
    Cname(RRSet),
    Dname,
    Zone(Name),
    NotFound,
}

/// S1: closest-NS/xNAME walk, shortening `sname` one label at a time.
fn s1_closest_ns_walk(
    backend: &dyn Backend,
    req: &PeekRequest,
    stale: Option<&dyn StaleCallback>,
) -> NsWalkOutcome {
    for (i, candidate) in req.sname.ancestors().enumerate() {
        let is_exact = i == 0;
        let Ok(key_bytes) = key::key_exact(&candidate, DNSResourceType::NS) else {
            continue;
        };
        let Some(value) = soft_read(backend, &key_bytes) else {
            continue;
        };
        let Ok(view) = entry::consistent(&value, DNSResourceType::NS) else {
            continue;
        };
        if view.header.is_packet() {
            continue;
        }
        let Some(new_ttl) = effective_ttl(view.header.time, view.header.ttl, req.now, stale) else {
            continue;
        };

        if view.header.has_cname() && is_exact {
            if let Ok((rrset, _)) = entry::rematerialize(
                &view,
                candidate.clone(),
                DNSResourceType::CNAME,
                req.rclass,
                new_ttl,
            ) {
                return NsWalkOutcome::Cname(rrset);
            }
            continue;
        }
        if view.header.has_dname() && !is_exact {
            return NsWalkOutcome::Dname;
        }
        if view.header.has_ns() {
            // DS lives in the parent zone: an exact-name NS hit does not
            // satisfy a DS query (spec §4.6 S1 special rule).
            if req.stype == DNSResourceType::DS && is_exact {
                continue;
            }
            // NS may be accepted at any rank — delegation progress is
            // allowed even from insecure/nonauth sources (spec §9).
            return NsWalkOutcome::Zone(candidate);
        }
    }
    NsWalkOutcome::NotFound
}

struct NsecHit {
    owner: Name,
    nsec: NsecData,
    rrset: RRSet,
    zlf_len: u16,
}

/// The closest encloser of `sname` given a covering NSEC's owner: the
/// longest ancestor shared by both names, read from the root inward. This
/// sources the `clencl_labels` spec §4.6 S3 derives `clencl_name` from,
/// without needing a second NSEC-chain walk for the common single-level
/// case this cache handles.
fn closest_encloser(nsec_owner: &Name, sname: &Name) -> Name {
    let a: Vec<&String> = nsec_owner.labels().iter().rev().collect();
    let b: Vec<&String> = sname.labels().iter().rev().collect();
    let common = a
        .iter()
        .zip(b.iter())
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count();
    let labels: Vec<String> = b.iter().take(common).rev().map(|s| s.to_string()).collect();
    Name::from_labels(labels)
}

/// Probes `read_leq` for the NSEC1 record covering `probe_name`. NSEC
/// entries always require at least `SECURE` rank (spec §4.5 step 3) —
/// independent of the query's `lowest_rank` floor, since an aggressive
/// denial proof is only meaningful if actually validated.
fn find_nsec1(
    backend: &dyn Backend,
    req: &PeekRequest,
    probe_name: &Name,
    stale: Option<&dyn StaleCallback>,
) -> Option<NsecHit> {
    let probe = key::key_nsec1_probe(probe_name).ok()?;
    let (key_bytes, value) = soft_read_leq(backend, &probe)?;
    let view = entry::consistent(&value, DNSResourceType::NSEC).ok()?;
    if !view.header.has_nsec() || !rank::satisfies(view.header.rank, rank::SECURE) {
        return None;
    }
    let new_ttl = effective_ttl(view.header.time, view.header.ttl, req.now, stale)?;
    let owner = key::owner_from_nsec1_key(&key_bytes).ok()?;
    let zlf_len = entry::nsec1_zlf_len(&view).ok()?;
    let (rrset, sigs) = entry::rematerialize_nsec1(&view, owner.clone(), req.rclass, new_ttl).ok()?;
    let nsec = NsecData::decode(&rrset.records.first()?.rdata).ok()?;
    let _ = sigs; // presence already required by the rank/has_nsec gate above
    Some(NsecHit { owner, nsec, rrset, zlf_len })
}

/// S4: probe the wildcard source of synthesis for `stype`, falling back to
/// `CNAME` if `stype` itself misses (and isn't `CNAME` already).
fn s4_wildcard_expand(
    backend: &dyn Backend,
    req: &PeekRequest,
    lowest: Rank,
    clencl_name: &Name,
    stale: Option<&dyn StaleCallback>,
) -> Option<RRSet> {
    let wildcard = clencl_name.wildcard();
    for candidate_type in [req.stype, DNSResourceType::CNAME] {
        if candidate_type == DNSResourceType::CNAME && req.stype == DNSResourceType::CNAME {
            break;
        }
        let Ok(key_bytes) = key::key_exact(&wildcard, candidate_type) else {
            continue;
        };
        let Some(value) = soft_read(backend, &key_bytes) else {
            continue;
        };
        let Ok(view) = entry::consistent(&value, candidate_type) else {
            continue;
        };
        if view.header.is_packet() || !rank::satisfies(view.header.rank, lowest) {
            continue;
        }
        let Some(new_ttl) = effective_ttl(view.header.time, view.header.ttl, req.now, stale) else {
            continue;
        };
        if let Ok((mut rrset, _)) =
            entry::rematerialize(&view, wildcard.clone(), candidate_type, req.rclass, new_ttl)
        {
            // The expanded answer is presented under the original qname,
            // not the wildcard owner (spec §4.6 S4).
            rrset.owner = req.sname.clone();
            return Some(rrset);
        }
    }
    None
}

/// S5: SOA attachment, required whenever the answer is NODATA or NXDOMAIN.
fn s5_soa(
    backend: &dyn Backend,
    req: &PeekRequest,
    lowest: Rank,
    zone: &Name,
    stale: Option<&dyn StaleCallback>,
) -> Option<RRSet> {
    let key_bytes = key::key_exact(zone, DNSResourceType::SOA).ok()?;
    let value = soft_read(backend, &key_bytes)?;
    let view = entry::consistent(&value, DNSResourceType::SOA).ok()?;
    if view.header.is_packet() || !rank::satisfies(view.header.rank, lowest) {
        return None;
    }
    let new_ttl = effective_ttl(view.header.time, view.header.ttl, req.now, stale)?;
    entry::rematerialize(&view, zone.clone(), DNSResourceType::SOA, req.rclass, new_ttl)
        .ok()
        .map(|(rrset, _)| rrset)
}

fn assemble(
    rcode: ResponseCode,
    answer: Vec<RRSet>,
    authority: Vec<RRSet>,
    req: &PeekRequest,
    dnssec_insecure: bool,
) -> PeekOutcome {
    let expiring = answer
        .iter()
        .chain(authority.iter())
        .flat_map(|rrset| rrset.records.iter())
        .any(|rr| rr.ttl <= EXPIRY_THRESHOLD);
    PeekOutcome::Answer(PeekResult {
        rcode,
        answer,
        authority,
        cached: true,
        no_minimize: true,
        dnssec_insecure,
        dnssec_want: req.dnssec_want,
        expiring,
    })
}

/// The full peek pipeline (spec §4.6). `ta` supplies trust-anchor coverage
/// for the rank gate; `stale` is the optional stale-serving override.
pub fn peek(
    backend: &dyn Backend,
    _opts: &CacheOpts,
    stats: &mut CacheStats,
    ta: &TrustAnchorStore,
    req: &PeekRequest,
    stale: Option<&dyn StaleCallback>,
) -> Result<PeekOutcome> {
    if req.no_cache || !rank::is_cacheable_qtype(req.stype) || req.rclass != DNSResourceClass::IN {
        stats.record_miss();
        return Ok(PeekOutcome::Miss);
    }
    if req.cache_tried && stale.is_none() {
        stats.record_miss();
        return Ok(PeekOutcome::Miss);
    }

    let lowest = rank::lowest_rank(req.rank_req, ta.covers(&req.sname));

    if let Some(outcome) = s0_exact_hit(backend, req, lowest, stale) {
        trace!("exact hit for {} {:?}", req.sname, req.stype);
        stats.record_hit();
        return Ok(outcome);
    }

    match s1_closest_ns_walk(backend, req, stale) {
        NsWalkOutcome::Cname(rrset) => {
            stats.record_hit();
            return Ok(assemble(ResponseCode::NoError, vec![rrset], Vec::new(), req, false));
        }
        NsWalkOutcome::Dname => {
            stats.record_miss();
            return Ok(PeekOutcome::Miss); // reserved, per spec §4.6 S1
        }
        NsWalkOutcome::Zone(_) | NsWalkOutcome::NotFound => {}
    }

    let Some(hit) = find_nsec1(backend, req, &req.sname, stale) else {
        stats.record_miss();
        return Ok(PeekOutcome::Miss);
    };

    // The SOA apex comes from the covering NSEC's own `zlf_len`, not the S1
    // NS walk — a zone can be proven by NSEC without any NS cached for it.
    let Some(zone) = key::apex_from_owner(&hit.owner, hit.zlf_len).ok() else {
        stats.record_miss();
        return Ok(PeekOutcome::Miss);
    };

    if hit.owner == req.sname {
        if hit.nsec.covers(req.stype) {
            // Contradicts the S0 miss; treat as unresolved.
            stats.record_miss();
            return Ok(PeekOutcome::Miss);
        }
        let mut authority = vec![hit.rrset];
        if let Some(soa) = s5_soa(backend, req, lowest, &zone, stale) {
            authority.push(soa);
        } else {
            stats.record_miss();
            return Ok(PeekOutcome::Miss);
        }
        stats.record_hit();
        return Ok(assemble(ResponseCode::NoError, Vec::new(), authority, req, true));
    }

    let owner_lf = key::name_to_lf(&hit.owner)?;
    let next_lf = key::name_to_lf(&hit.nsec.next_owner)?;
    let probe_lf = key::name_to_lf(&req.sname)?;
    if !name_in_range(&owner_lf, &next_lf, &probe_lf) {
        stats.record_miss();
        return Ok(PeekOutcome::Miss);
    }

    // S3: source-of-synthesis check.
    let clencl_name = closest_encloser(&hit.owner, &req.sname);
    let ss_name = clencl_name.wildcard();
    let ss_lf = key::name_to_lf(&ss_name)?;

    let mut authority = vec![hit.rrset.clone()];
    let mut ss_match: Option<NsecHit> = None;
    let proof_ok;

    if hit.owner == ss_name {
        proof_ok = true;
        ss_match = Some(hit);
    } else if name_in_range(&owner_lf, &next_lf, &ss_lf) {
        proof_ok = true;
    } else {
        match find_nsec1(backend, req, &ss_name, stale) {
            Some(second) => {
                if second.owner == ss_name {
                    authority.push(second.rrset.clone());
                    proof_ok = true;
                    ss_match = Some(second);
                } else {
                    let s_owner_lf = key::name_to_lf(&second.owner)?;
                    let s_next_lf = key::name_to_lf(&second.nsec.next_owner)?;
                    if name_in_range(&s_owner_lf, &s_next_lf, &ss_lf) {
                        authority.push(second.rrset.clone());
                        proof_ok = true;
                    } else {
                        proof_ok = false;
                    }
                }
            }
            None => proof_ok = false,
        }
    }

    if !proof_ok {
        // S3 failure: fall back to SOA-only, emit NODATA (spec §4.6 S3).
        if let Some(soa) = s5_soa(backend, req, lowest, &zone, stale) {
            authority.push(soa);
            stats.record_hit();
            return Ok(assemble(ResponseCode::NoError, Vec::new(), authority, req, true));
        }
        stats.record_miss();
        return Ok(PeekOutcome::Miss);
    }

    if let Some(ss_hit) = ss_match {
        let wants_cname_fallback = req.stype != DNSResourceType::CNAME && ss_hit.nsec.covers(DNSResourceType::CNAME);
        if ss_hit.nsec.covers(req.stype) || wants_cname_fallback {
            if let Some(answer) = s4_wildcard_expand(backend, req, lowest, &clencl_name, stale) {
                stats.record_hit();
                return Ok(assemble(ResponseCode::NoError, vec![answer], authority, req, true));
            }
        }
        if let Some(soa) = s5_soa(backend, req, lowest, &zone, stale) {
            authority.push(soa);
            stats.record_hit();
            return Ok(assemble(ResponseCode::NoError, Vec::new(), authority, req, true));
        }
        stats.record_miss();
        return Ok(PeekOutcome::Miss);
    }

    if let Some(soa) = s5_soa(backend, req, lowest, &zone, stale) {
        authority.push(soa);
        stats.record_hit();
        return Ok(assemble(ResponseCode::NameError, Vec::new(), authority, req, true));
    }
    stats.record_miss();
    Ok(PeekOutcome::Miss)
}
