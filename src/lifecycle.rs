//! Lifecycle & Versioning (spec §4.7): the version sentinel key and
//! purge-and-recreate on format mismatch.

use crate::backend::Backend;
use crate::config::CACHE_VERSION;
use crate::error::Result;
use crate::key::VERSION_KEY;
use tracing::{debug, warn};

/// Probes the sentinel key on `open`. If absent or mismatched, purges the
/// store (only if non-empty) and rewrites the current version. Always
/// succeeds if the backend itself opened — a version mismatch is handled
/// internally and never surfaced (spec §4.7, §7).
pub fn check_and_migrate(backend: &dyn Backend) -> Result<()> {
    let current = backend.read(VERSION_KEY)?;
    let up_to_date = current
        .as_deref()
        .map(|bytes| bytes == CACHE_VERSION.to_ne_bytes())
        .unwrap_or(false);

    if up_to_date {
        debug!("cache version up to date");
        return Ok(());
    }

    let count = backend.count()?;
    if count > 0 {
        warn!("cache version mismatch, purging {} entries", count);
        backend.clear()?;
    }
    backend.write(VERSION_KEY, &CACHE_VERSION.to_ne_bytes())?;
    Ok(())
}
