//! Key Codec (spec §4.2): canonical DNS-name "lookup format" plus a one-byte
//! tag and 2-byte type suffix, chosen so lexicographic byte order equals DNS
//! canonical name order — the property `read_leq`-based closest-encloser
//! search depends on.

use crate::dns::{DNSResourceType, Name};
use crate::error::{CacheError, Result};

pub const TAG_EXACT: u8 = b'E';
pub const TAG_NSEC1: u8 = b'1';
pub const TAG_NSEC3: u8 = b'3';

pub const VERSION_KEY: &[u8] = b"\x00\x00V";

/// Lookup format: labels reversed (root-most first), each label's raw bytes
/// with no length prefix, joined by `0x00` — no trailing terminator.
/// `www.example.com.` -> `b"com\0example\0www"`. `LF(a) || 0x00` is a
/// byte-prefix of `LF(b)` iff `a` is an ancestor of `b` (spec §8's
/// key-ordering invariant); that terminator is added by callers building a
/// full key (`key_exact`, `key_nsec1`), not by this function, since `LF`
/// alone is also used as a bare ordering key for comparisons.
pub fn name_to_lf(name: &Name) -> Result<Vec<u8>> {
    if name.has_zero_byte_label() {
        return Err(CacheError::InvalidArgument(
            "name label contains a literal zero byte".into(),
        ));
    }
    let mut out = Vec::new();
    for (i, label) in name.labels().iter().rev().enumerate() {
        if i > 0 {
            out.push(0);
        }
        out.extend_from_slice(label.to_ascii_lowercase().as_bytes());
    }
    Ok(out)
}

/// Inverse of [`name_to_lf`]: splits on `0x00` and reverses segment order.
/// Used by the peek pipeline to recover an owner name from a `read_leq`
/// result's on-disk key bytes.
pub fn lf_to_name(lf: &[u8]) -> Result<Name> {
    if lf.is_empty() {
        return Ok(Name::root());
    }
    let mut labels: Vec<String> = lf
        .split(|&b| b == 0)
        .map(|seg| String::from_utf8(seg.to_vec()).map_err(|_| CacheError::Malformed))
        .collect::<Result<_>>()?;
    labels.reverse();
    Ok(Name::from_labels(labels))
}

pub fn zlf_len(zone: &Name) -> Result<usize> {
    Ok(name_to_lf(zone)?.len())
}

/// Recovers the zone apex from an NSEC1 entry's owner and its stored
/// `zlf_len`: since the zone is an ancestor of the owner, `LF(zone)` is a
/// byte-prefix of `LF(owner)` of exactly that length (spec §4.6 S5 derives
/// the SOA apex this way rather than from the S1 NS walk, which may have
/// found no cached NS for the zone at all).
pub fn apex_from_owner(owner: &Name, zlf_len: u16) -> Result<Name> {
    let owner_lf = name_to_lf(owner)?;
    let zlf_len = zlf_len as usize;
    if zlf_len > owner_lf.len() {
        return Err(CacheError::Malformed);
    }
    lf_to_name(&owner_lf[..zlf_len])
}

/// Types that colocate under the NS tag at their owner to reduce per-name
/// probes on the closest-NS walk (spec §4.2, §4.5 step 4).
fn stash_type(rtype: DNSResourceType) -> DNSResourceType {
    match rtype {
        DNSResourceType::CNAME | DNSResourceType::DNAME => DNSResourceType::NS,
        other => other,
    }
}

/// `key_exact(name, type, tag='E')`: `LF(name) || 0x00 || tag || type_be`.
/// RRSIG and NSEC/NSEC3 are never stored under this tag.
pub fn key_exact(name: &Name, rtype: DNSResourceType) -> Result<Vec<u8>> {
    if matches!(rtype, DNSResourceType::RRSIG | DNSResourceType::NSEC | DNSResourceType::NSEC3) {
        return Err(CacheError::InvalidArgument(format!(
            "{rtype:?} is never stored under the exact tag"
        )));
    }
    let mut key = name_to_lf(name)?;
    key.push(0);
    key.push(TAG_EXACT);
    key.extend_from_slice(&u16::from(rtype).to_be_bytes());
    Ok(key)
}

/// Builds the exact key actually used on disk for a stashed RR, applying
/// the CNAME/DNAME -> NS colocation rewrite.
pub fn key_exact_stash(name: &Name, rtype: DNSResourceType) -> Result<Vec<u8>> {
    key_exact(name, stash_type(rtype))
}

/// `key_nsec1(encloser, wild_labels)`: the NSEC1 key is keyed purely by
/// `encloser`'s LF under the `'1'` tag — `wild_labels` only matters upstream
/// for deriving `encloser` from the signed owner, not for the key bytes
/// themselves.
pub fn key_nsec1(encloser: &Name) -> Result<Vec<u8>> {
    let mut key = name_to_lf(encloser)?;
    key.push(0);
    key.push(TAG_NSEC1);
    Ok(key)
}

/// Recovers the owner name from an on-disk NSEC1 key (`LF || 0x00 || '1'`),
/// used by the peek pipeline after a `read_leq` hit.
pub fn owner_from_nsec1_key(key: &[u8]) -> Result<Name> {
    if key.len() < 2 || key[key.len() - 1] != TAG_NSEC1 || key[key.len() - 2] != 0 {
        return Err(CacheError::Malformed);
    }
    lf_to_name(&key[..key.len() - 2])
}

/// Recovers the owner name from an on-disk exact key
/// (`LF || 0x00 || 'E' || type(2B)`).
pub fn owner_from_exact_key(key: &[u8]) -> Result<Name> {
    if key.len() < 4 || key[key.len() - 4] != 0 || key[key.len() - 3] != TAG_EXACT {
        return Err(CacheError::Malformed);
    }
    lf_to_name(&key[..key.len() - 4])
}

/// Builds an NSEC1 *probe* key for `read_leq`: same LF bytes as an exact
/// NSEC1 key at `sname`, used to find the greatest NSEC1 owner <= `sname`.
pub fn key_nsec1_probe(sname: &Name) -> Result<Vec<u8>> {
    key_nsec1(sname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lf_reverses_labels() {
        let lf = name_to_lf(&Name::parse("www.example.com.")).unwrap();
        assert_eq!(lf, b"com\0example\0www");
    }

    #[test]
    fn lf_round_trips_through_lf_to_name() {
        let name = Name::parse("www.example.com.");
        let lf = name_to_lf(&name).unwrap();
        assert_eq!(lf_to_name(&lf).unwrap(), name);
    }

    #[test]
    fn ancestor_lf_plus_terminator_is_prefix_of_descendant() {
        let mut parent = name_to_lf(&Name::parse("example.com.")).unwrap();
        let child = name_to_lf(&Name::parse("www.example.com.")).unwrap();
        parent.push(0);
        assert!(child.starts_with(&parent));
    }

    #[test]
    fn owner_recovered_from_exact_and_nsec1_keys() {
        let name = Name::parse("a.example.");
        let exact = key_exact(&name, DNSResourceType::A).unwrap();
        assert_eq!(owner_from_exact_key(&exact).unwrap(), name);
        let nsec1 = key_nsec1(&name).unwrap();
        assert_eq!(owner_from_nsec1_key(&nsec1).unwrap(), name);
    }

    #[test]
    fn lf_root_is_empty() {
        assert_eq!(name_to_lf(&Name::root()).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn ancestor_lf_is_prefix_of_descendant_lf() {
        let parent = name_to_lf(&Name::parse("example.com.")).unwrap();
        let child = name_to_lf(&Name::parse("www.example.com.")).unwrap();
        assert!(child.starts_with(&parent));
    }

    #[test]
    fn rejects_zero_byte_label() {
        let name = Name::from_labels(vec!["a\0b".to_string()]);
        assert!(name_to_lf(&name).is_err());
    }

    #[test]
    fn key_ordering_matches_canonical_name_order() {
        let mut names: Vec<Name> = vec![
            Name::parse("b.example.com."),
            Name::parse("a.example.com."),
            Name::parse("example.com."),
            Name::parse("zzz.example.com."),
        ];
        names.sort_by_key(|n| name_to_lf(n).unwrap());
        let rendered: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "example.com.".to_string(),
                "a.example.com.".to_string(),
                "b.example.com.".to_string(),
                "zzz.example.com.".to_string(),
            ]
        );
    }

    #[test]
    fn cname_and_dname_colocate_under_ns() {
        let name = Name::parse("alias.example.com.");
        let cname_key = key_exact_stash(&name, DNSResourceType::CNAME).unwrap();
        let ns_key = key_exact(&name, DNSResourceType::NS).unwrap();
        assert_eq!(cname_key, ns_key);
    }

    #[test]
    fn rrsig_and_nsec_refuse_exact_tag() {
        let name = Name::parse("example.com.");
        assert!(key_exact(&name, DNSResourceType::RRSIG).is_err());
        assert!(key_exact(&name, DNSResourceType::NSEC).is_err());
    }
}
