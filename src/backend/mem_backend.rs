//! In-process `BTreeMap` backend. Not the default (spec §9 calls for an
//! embedded memory-mapped B-tree store), but useful for unit tests that
//! shouldn't pay disk I/O, the way heimdall's `LocalCache` sits alongside
//! its Redis-backed one for the same reason.

use super::Backend;
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemBackend {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemBackend {
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().unwrap().clear();
        Ok(())
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn read_leq(&self, probe: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let map = self.entries.read().unwrap();
        Ok(map
            .range(..=probe.to_vec())
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().unwrap().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    fn match_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_leq_finds_greatest_key_at_or_below_probe() {
        let backend = MemBackend::new();
        backend.write(b"a", b"1").unwrap();
        backend.write(b"c", b"3").unwrap();
        assert_eq!(
            backend.read_leq(b"b").unwrap(),
            Some((b"a".to_vec(), b"1".to_vec()))
        );
        assert_eq!(
            backend.read_leq(b"c").unwrap(),
            Some((b"c".to_vec(), b"3".to_vec()))
        );
        assert_eq!(backend.read_leq(b"").unwrap(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let backend = MemBackend::new();
        backend.write(b"a", b"1").unwrap();
        backend.clear().unwrap();
        backend.clear().unwrap();
        assert_eq!(backend.count().unwrap(), 0);
    }

    #[test]
    fn match_prefix_returns_only_matching_keys() {
        let backend = MemBackend::new();
        backend.write(b"com\0example\0", b"1").unwrap();
        backend.write(b"com\0example\0www\0", b"2").unwrap();
        backend.write(b"net\0other\0", b"3").unwrap();
        let matches = backend.match_prefix(b"com\0example\0").unwrap();
        assert_eq!(matches.len(), 2);
    }
}
