//! Unified error type for the cache core, following the same
//! `thiserror`-enum-plus-conversions shape heimdall's error module uses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// `EINVAL` — caller bug: null handle, bad argument, malformed name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `ENOENT` — ordinary cache miss; not logged at info level.
    #[error("cache miss")]
    Miss,

    /// `ESTALE` — entry exists but failed the freshness or rank gate.
    #[error("entry present but stale or under-ranked")]
    Stale,

    /// `ENOTSUP` — disallowed type on the diagnostic peek surface.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// An entry's header failed the `consistent()` coherence check.
    /// Treated as a miss upward; the offending key is currently left in
    /// place rather than deleted.
    #[error("malformed cache entry for key")]
    Malformed,

    /// Backend I/O error, logged verbosely and treated as a miss upward —
    /// the cache never escalates a backend failure into a hard failure.
    #[error("backend error: {0}")]
    Backend(#[from] sled::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Every non-`open`/`clear` caller treats every error as "not cached" or
    /// "not persisted" (spec §7). This is the single place that embodies
    /// that policy so `peek`/`stash` don't need a `match` at every call site.
    pub fn is_soft(&self) -> bool {
        !matches!(self, CacheError::InvalidArgument(_))
    }
}
