//! Entry Codec (spec §4.3): the byte-packed `entry_h` header plus its
//! variable tail, and dematerialization/rematerialization of [`RRSet`]s and
//! their [`RrSigSet`]s.
//!
//! Mirrors the cyclic/self-referential layout note in spec §9: a stashed
//! entry is one owned byte buffer with offsets computed on read, never
//! exposed as independent owned sub-objects until rematerialized.

use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name::Name;
use crate::dns::rr::{Rdata, RRSet, RrSig, RrSigSet};
use crate::error::{CacheError, Result};
use crate::rank::Rank;

pub const FLAG_IS_PACKET: u8 = 0b0000_0001;
pub const FLAG_HAS_OPTOUT: u8 = 0b0000_0010;
pub const FLAG_HAS_NS: u8 = 0b0000_0100;
pub const FLAG_HAS_CNAME: u8 = 0b0000_1000;
pub const FLAG_HAS_DNAME: u8 = 0b0001_0000;
pub const FLAG_HAS_NSEC: u8 = 0b0010_0000;

/// Fixed prefix: `time:u32 || ttl:u32 || rank:u8 || flags:u8`.
pub const HEADER_LEN: usize = 4 + 4 + 1 + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryHeader {
    pub time: u32,
    pub ttl: u32,
    pub rank: Rank,
    pub flags: u8,
}

impl EntryHeader {
    pub fn is_packet(&self) -> bool {
        self.flags & FLAG_IS_PACKET != 0
    }
    pub fn has_optout(&self) -> bool {
        self.flags & FLAG_HAS_OPTOUT != 0
    }
    pub fn has_ns(&self) -> bool {
        self.flags & FLAG_HAS_NS != 0
    }
    pub fn has_cname(&self) -> bool {
        self.flags & FLAG_HAS_CNAME != 0
    }
    pub fn has_dname(&self) -> bool {
        self.flags & FLAG_HAS_DNAME != 0
    }
    pub fn has_nsec(&self) -> bool {
        self.flags & FLAG_HAS_NSEC != 0
    }

    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.time.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.ttl.to_ne_bytes());
        buf[8] = self.rank;
        buf[9] = self.flags;
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CacheError::Malformed);
        }
        Ok(Self {
            time: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            ttl: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            rank: buf[8],
            flags: buf[9],
        })
    }
}

/// A decoded, still-borrowed view over a stored entry's bytes: the header
/// plus the byte ranges of its tail, produced by [`consistent`] without
/// copying the tail payload.
#[derive(Debug)]
pub struct EntryView<'a> {
    pub header: EntryHeader,
    pub tail: &'a [u8],
}

/// `consistent(bytes, type) -> header | null`: length and flag-coherence
/// checks, returning a typed view without copying.
pub fn consistent<'a>(bytes: &'a [u8], _rtype: DNSResourceType) -> Result<EntryView<'a>> {
    if bytes.len() < HEADER_LEN {
        return Err(CacheError::Malformed);
    }
    let header = EntryHeader::decode(bytes)?;
    let tail = &bytes[HEADER_LEN..];

    if header.rank & crate::rank::BOGUS != 0 && !header.is_packet() {
        return Err(CacheError::Malformed);
    }
    if header.has_optout() && !header.is_packet() {
        return Err(CacheError::Malformed);
    }
    if header.is_packet() {
        if tail.len() < 2 {
            return Err(CacheError::Malformed);
        }
        let declared = u16::from_ne_bytes(tail[0..2].try_into().unwrap()) as usize;
        if tail.len() < 2 + declared {
            return Err(CacheError::Malformed);
        }
    }

    Ok(EntryView { header, tail })
}

/// Builds a packet-form entry (the tail is an opaque wire-format DNS
/// message, prefixed with its declared length).
pub fn encode_packet(header: EntryHeader, packet: &[u8]) -> Vec<u8> {
    debug_assert!(header.is_packet());
    let mut out = Vec::with_capacity(HEADER_LEN + 2 + packet.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&(packet.len() as u16).to_ne_bytes());
    out.extend_from_slice(packet);
    out
}

pub fn decode_packet(view: &EntryView<'_>) -> Result<&[u8]> {
    if !view.header.is_packet() {
        return Err(CacheError::Malformed);
    }
    let declared = u16::from_ne_bytes(view.tail[0..2].try_into().unwrap()) as usize;
    Ok(&view.tail[2..2 + declared])
}

/// `dematerialize(rrset) -> bytes`: `rr_count:u16 || { rdlen:u16, rdata:bytes, ttl:u32 }^rr_count`.
fn dematerialize_rrset(rrset: &RRSet) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(rrset.records.len() as u16).to_ne_bytes());
    for rr in &rrset.records {
        out.extend_from_slice(&(rr.rdata.len() as u16).to_ne_bytes());
        out.extend_from_slice(&rr.rdata);
        out.extend_from_slice(&rr.ttl.to_ne_bytes());
    }
    out
}

fn rematerialize_rrset(
    buf: &[u8],
    owner: Name,
    rtype: DNSResourceType,
    rclass: DNSResourceClass,
    new_ttl: u32,
) -> Result<(RRSet, usize)> {
    if buf.len() < 2 {
        return Err(CacheError::Malformed);
    }
    let count = u16::from_ne_bytes(buf[0..2].try_into().unwrap()) as usize;
    let mut offset = 2;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        if buf.len() < offset + 2 {
            return Err(CacheError::Malformed);
        }
        let rdlen = u16::from_ne_bytes(buf[offset..offset + 2].try_into().unwrap()) as usize;
        offset += 2;
        if buf.len() < offset + rdlen + 4 {
            return Err(CacheError::Malformed);
        }
        let rdata = buf[offset..offset + rdlen].to_vec();
        offset += rdlen;
        let _stored_ttl = u32::from_ne_bytes(buf[offset..offset + 4].try_into().unwrap());
        offset += 4;
        // Stored per-RR TTL is ignored on the read path (spec §4.3): the
        // freshness policy's computed `new_ttl` replaces it uniformly.
        records.push(Rdata { rdata, ttl: new_ttl });
    }
    Ok((
        RRSet {
            owner,
            rtype,
            rclass,
            records,
        },
        offset,
    ))
}

fn dematerialize_name(name: &Name) -> Vec<u8> {
    let rendered = name.to_string();
    let mut out = Vec::with_capacity(2 + rendered.len());
    out.extend_from_slice(&(rendered.len() as u16).to_ne_bytes());
    out.extend_from_slice(rendered.as_bytes());
    out
}

fn rematerialize_name(buf: &[u8]) -> Result<(Name, usize)> {
    if buf.len() < 2 {
        return Err(CacheError::Malformed);
    }
    let len = u16::from_ne_bytes(buf[0..2].try_into().unwrap()) as usize;
    if buf.len() < 2 + len {
        return Err(CacheError::Malformed);
    }
    let s = std::str::from_utf8(&buf[2..2 + len]).map_err(|_| CacheError::Malformed)?;
    Ok((Name::parse(s), 2 + len))
}

/// Dematerializes an RRSIG set: `sig_count:u16 || { type_covered:u16, labels:u8, signer_name, rdlen:u16, rdata:bytes, ttl:u32 }^sig_count`.
fn dematerialize_rrsigs(sigs: &RrSigSet) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(sigs.sigs.len() as u16).to_ne_bytes());
    for sig in &sigs.sigs {
        out.extend_from_slice(&u16::from(sig.type_covered).to_ne_bytes());
        out.push(sig.labels);
        out.extend_from_slice(&dematerialize_name(&sig.signer_name));
        out.extend_from_slice(&(sig.rdata.len() as u16).to_ne_bytes());
        out.extend_from_slice(&sig.rdata);
        out.extend_from_slice(&sig.ttl.to_ne_bytes());
    }
    out
}

fn rematerialize_rrsigs(buf: &[u8], owner: Name, new_ttl: u32) -> Result<(RrSigSet, usize)> {
    if buf.len() < 2 {
        return Err(CacheError::Malformed);
    }
    let count = u16::from_ne_bytes(buf[0..2].try_into().unwrap()) as usize;
    let mut offset = 2;
    let mut out_sigs = Vec::with_capacity(count);
    for _ in 0..count {
        if buf.len() < offset + 3 {
            return Err(CacheError::Malformed);
        }
        let type_covered = DNSResourceType::from(u16::from_ne_bytes(
            buf[offset..offset + 2].try_into().unwrap(),
        ));
        offset += 2;
        let labels = buf[offset];
        offset += 1;
        let (signer_name, consumed) = rematerialize_name(&buf[offset..])?;
        offset += consumed;
        if buf.len() < offset + 2 {
            return Err(CacheError::Malformed);
        }
        let rdlen = u16::from_ne_bytes(buf[offset..offset + 2].try_into().unwrap()) as usize;
        offset += 2;
        if buf.len() < offset + rdlen + 4 {
            return Err(CacheError::Malformed);
        }
        let rdata = buf[offset..offset + rdlen].to_vec();
        offset += rdlen;
        let _stored_ttl = u32::from_ne_bytes(buf[offset..offset + 4].try_into().unwrap());
        offset += 4;
        out_sigs.push(RrSig {
            type_covered,
            labels,
            signer_name,
            rdata,
            ttl: new_ttl,
        });
    }
    Ok((
        RrSigSet {
            owner,
            sigs: out_sigs,
        },
        offset,
    ))
}

/// `dematerialize(rrset, sigs) -> bytes`: header-less tail, the dematerialized
/// RRSet followed optionally by the dematerialized RRSIG set. Callers
/// prepend an [`EntryHeader`] to get a storable value.
pub fn dematerialize(rrset: &RRSet, sigs: Option<&RrSigSet>) -> Vec<u8> {
    let mut out = dematerialize_rrset(rrset);
    if let Some(sigs) = sigs {
        out.extend_from_slice(&dematerialize_rrsigs(sigs));
    }
    out
}

pub fn encode_rrset_entry(header: EntryHeader, rrset: &RRSet, sigs: Option<&RrSigSet>) -> Vec<u8> {
    debug_assert!(!header.is_packet());
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&dematerialize(rrset, sigs));
    out
}

/// `rematerialize(bytes, owner, new_ttl) -> rrset`, optionally also
/// returning the paired RRSIG set if the tail carries one.
pub fn rematerialize(
    view: &EntryView<'_>,
    owner: Name,
    rtype: DNSResourceType,
    rclass: DNSResourceClass,
    new_ttl: u32,
) -> Result<(RRSet, Option<RrSigSet>)> {
    if view.header.is_packet() {
        return Err(CacheError::Malformed);
    }
    let (rrset, consumed) = rematerialize_rrset(view.tail, owner.clone(), rtype, rclass, new_ttl)?;
    let sigs = if consumed < view.tail.len() {
        Some(rematerialize_rrsigs(&view.tail[consumed..], owner, new_ttl)?.0)
    } else {
        None
    };
    Ok((rrset, sigs))
}

/// NSEC1 entries prepend `zlf_len:u16` to the tail ahead of the
/// dematerialized RRSet, recording the zone apex's LF byte length so the
/// peek pipeline can split zone-suffix from own-label suffix on read
/// (spec §4.2, §4.5 step 3).
pub fn encode_nsec1_entry(
    header: EntryHeader,
    zlf_len: u16,
    rrset: &RRSet,
    sigs: &RrSigSet,
) -> Vec<u8> {
    debug_assert!(!header.is_packet());
    debug_assert!(header.has_nsec());
    let mut out = Vec::with_capacity(HEADER_LEN + 2);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&zlf_len.to_ne_bytes());
    out.extend_from_slice(&dematerialize(rrset, Some(sigs)));
    out
}

pub fn nsec1_zlf_len(view: &EntryView<'_>) -> Result<u16> {
    if view.tail.len() < 2 {
        return Err(CacheError::Malformed);
    }
    Ok(u16::from_ne_bytes(view.tail[0..2].try_into().unwrap()))
}

/// Rematerializes an NSEC1 entry's RRSet (and RRSIG set, always present —
/// the stash precondition requires at least one signature).
pub fn rematerialize_nsec1(
    view: &EntryView<'_>,
    owner: Name,
    rclass: DNSResourceClass,
    new_ttl: u32,
) -> Result<(RRSet, RrSigSet)> {
    if view.tail.len() < 2 {
        return Err(CacheError::Malformed);
    }
    let body = &view.tail[2..];
    let (rrset, consumed) =
        rematerialize_rrset(body, owner.clone(), DNSResourceType::NSEC, rclass, new_ttl)?;
    if consumed >= body.len() {
        return Err(CacheError::Malformed);
    }
    let (sigs, _) = rematerialize_rrsigs(&body[consumed..], owner, new_ttl)?;
    Ok((rrset, sigs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::DNSResourceClass;

    fn sample_rrset() -> RRSet {
        let mut rrset = RRSet::new(Name::parse("example.com."), DNSResourceType::A, DNSResourceClass::IN);
        rrset.records.push(Rdata {
            rdata: vec![192, 0, 2, 1],
            ttl: 300,
        });
        rrset
    }

    #[test]
    fn rrset_round_trips_with_new_ttl_substitution() {
        let rrset = sample_rrset();
        let header = EntryHeader {
            time: 1000,
            ttl: 300,
            rank: crate::rank::SECURE | crate::rank::AUTH,
            flags: 0,
        };
        let bytes = encode_rrset_entry(header, &rrset, None);
        let view = consistent(&bytes, DNSResourceType::A).unwrap();
        let (out, sigs) = rematerialize(&view, rrset.owner.clone(), DNSResourceType::A, DNSResourceClass::IN, 200).unwrap();
        assert!(sigs.is_none());
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].rdata, vec![192, 0, 2, 1]);
        assert_eq!(out.records[0].ttl, 200);
    }

    #[test]
    fn rrset_with_rrsigs_round_trips() {
        let rrset = sample_rrset();
        let sigs = RrSigSet {
            owner: rrset.owner.clone(),
            sigs: vec![RrSig {
                type_covered: DNSResourceType::A,
                labels: 2,
                signer_name: Name::parse("example.com."),
                rdata: vec![1, 2, 3],
                ttl: 300,
            }],
        };
        let header = EntryHeader {
            time: 1000,
            ttl: 300,
            rank: crate::rank::SECURE | crate::rank::AUTH,
            flags: 0,
        };
        let bytes = encode_rrset_entry(header, &rrset, Some(&sigs));
        let view = consistent(&bytes, DNSResourceType::A).unwrap();
        let (out, out_sigs) = rematerialize(&view, rrset.owner.clone(), DNSResourceType::A, DNSResourceClass::IN, 200).unwrap();
        assert_eq!(out.records.len(), 1);
        let out_sigs = out_sigs.unwrap();
        assert_eq!(out_sigs.sigs.len(), 1);
        assert_eq!(out_sigs.sigs[0].labels, 2);
        assert_eq!(out_sigs.sigs[0].signer_name, Name::parse("example.com."));
    }

    #[test]
    fn packet_entry_round_trips() {
        let header = EntryHeader {
            time: 1000,
            ttl: 300,
            rank: crate::rank::BOGUS | crate::rank::AUTH,
            flags: FLAG_IS_PACKET,
        };
        let packet = vec![0u8; 12];
        let bytes = encode_packet(header, &packet);
        let view = consistent(&bytes, DNSResourceType::A).unwrap();
        assert!(view.header.is_packet());
        assert_eq!(decode_packet(&view).unwrap(), packet.as_slice());
    }

    #[test]
    fn bogus_rank_requires_packet_flag() {
        let header = EntryHeader {
            time: 0,
            ttl: 0,
            rank: crate::rank::BOGUS,
            flags: 0,
        };
        let bytes = encode_rrset_entry(header, &sample_rrset(), None);
        assert!(consistent(&bytes, DNSResourceType::A).is_err());
    }

    #[test]
    fn nsec1_entry_round_trips_with_zlf_len() {
        let owner = Name::parse("a.example.");
        let mut rrset = RRSet::new(owner.clone(), DNSResourceType::NSEC, DNSResourceClass::IN);
        rrset.records.push(Rdata {
            rdata: b"c.example.\0\x00\x06\x40\x01".to_vec(),
            ttl: 3600,
        });
        let sigs = RrSigSet {
            owner: owner.clone(),
            sigs: vec![RrSig {
                type_covered: DNSResourceType::NSEC,
                labels: 2,
                signer_name: Name::parse("example."),
                rdata: vec![9, 9, 9],
                ttl: 3600,
            }],
        };
        let header = EntryHeader {
            time: 1000,
            ttl: 3600,
            rank: crate::rank::SECURE | crate::rank::AUTH,
            flags: FLAG_HAS_NSEC,
        };
        let zone_lf_len = crate::key::zlf_len(&Name::parse("example.")).unwrap() as u16;
        let bytes = encode_nsec1_entry(header, zone_lf_len, &rrset, &sigs);
        let view = consistent(&bytes, DNSResourceType::NSEC).unwrap();
        assert_eq!(nsec1_zlf_len(&view).unwrap(), zone_lf_len);
        let (out_rrset, out_sigs) =
            rematerialize_nsec1(&view, owner, DNSResourceClass::IN, 3000).unwrap();
        assert_eq!(out_rrset.records.len(), 1);
        assert_eq!(out_sigs.sigs.len(), 1);
        assert_eq!(out_sigs.sigs[0].signer_name, Name::parse("example."));
    }

    #[test]
    fn truncated_entry_is_malformed() {
        assert!(consistent(&[0u8; 4], DNSResourceType::A).is_err());
    }
}
