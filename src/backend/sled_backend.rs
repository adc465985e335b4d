//! Default backend: an embedded, memory-mapped, ordered B-tree store
//! (spec §9), backed by `sled`. `sled::Tree` already keeps keys in
//! lexicographic byte order and exposes range queries, so `read_leq` is a
//! direct `get_lt` fallback after an exact-match probe.

use super::Backend;
use crate::config::CacheOpts;
use crate::error::Result;

pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(opts: &CacheOpts) -> Result<Self> {
        let db = sled::Config::new()
            .path(&opts.path)
            .cache_capacity(opts.max_size_bytes)
            .open()?;
        Ok(Self { db })
    }

    /// A temporary, non-persistent store — used by integration tests so
    /// they don't leave files behind.
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Backend for SledBackend {
    fn sync(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.db.len())
    }

    fn clear(&self) -> Result<()> {
        self.db.clear()?;
        Ok(())
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn read_leq(&self, probe: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        if let Some(value) = self.db.get(probe)? {
            return Ok(Some((probe.to_vec(), value.to_vec())));
        }
        Ok(self
            .db
            .get_lt(probe)?
            .map(|(k, v)| (k.to_vec(), v.to_vec())))
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    fn match_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.db
            .scan_prefix(prefix)
            .map(|entry| entry.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(Into::into))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_leq_on_real_backend() {
        let backend = SledBackend::open_temporary().unwrap();
        backend.write(b"a", b"1").unwrap();
        backend.write(b"c", b"3").unwrap();
        assert_eq!(
            backend.read_leq(b"b").unwrap(),
            Some((b"a".to_vec(), b"1".to_vec()))
        );
    }

    #[test]
    fn clear_empties_store() {
        let backend = SledBackend::open_temporary().unwrap();
        backend.write(b"k", b"v").unwrap();
        backend.clear().unwrap();
        assert_eq!(backend.count().unwrap(), 0);
    }
}
