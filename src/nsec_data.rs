//! Typed access to an NSEC record's rdata (next owner name + type bitmap).
//!
//! Every other RR type is treated as opaque rdata bytes (spec §1 places
//! wire/RRset primitives out of scope), but the peek pipeline's coverage
//! test (spec §4.6 S2/S3) needs the next-owner name and the type bitmap in
//! structured form, not as an opaque blob — that's cache-core logic, not
//! wire parsing. This module's encoding is this crate's own, written by the
//! stash caller and read back here; it does not attempt to match RFC 4034's
//! wire bitmap format.

use crate::dns::enums::DNSResourceType;
use crate::dns::name::Name;
use crate::error::{CacheError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NsecData {
    pub next_owner: Name,
    pub types: Vec<DNSResourceType>,
}

impl NsecData {
    pub fn covers(&self, qtype: DNSResourceType) -> bool {
        self.types.contains(&qtype)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let next = self.next_owner.to_string();
        out.extend_from_slice(&(next.len() as u16).to_ne_bytes());
        out.extend_from_slice(next.as_bytes());
        out.extend_from_slice(&(self.types.len() as u16).to_ne_bytes());
        for t in &self.types {
            out.extend_from_slice(&u16::from(*t).to_ne_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(CacheError::Malformed);
        }
        let name_len = u16::from_ne_bytes(bytes[0..2].try_into().unwrap()) as usize;
        if bytes.len() < 2 + name_len + 2 {
            return Err(CacheError::Malformed);
        }
        let name_str = std::str::from_utf8(&bytes[2..2 + name_len]).map_err(|_| CacheError::Malformed)?;
        let next_owner = Name::parse(name_str);
        let mut offset = 2 + name_len;
        let type_count = u16::from_ne_bytes(bytes[offset..offset + 2].try_into().unwrap()) as usize;
        offset += 2;
        if bytes.len() < offset + type_count * 2 {
            return Err(CacheError::Malformed);
        }
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(DNSResourceType::from(u16::from_ne_bytes(
                bytes[offset..offset + 2].try_into().unwrap(),
            )));
            offset += 2;
        }
        Ok(Self { next_owner, types })
    }
}
