//! Cache configuration, following the `from_env()` convention heimdall's
//! `CacheConfig` uses: every field has a hardcoded default and an optional
//! environment override, parsed leniently (a bad value falls back to the
//! default rather than erroring).

use std::env;
use std::path::PathBuf;

/// `ttl_min` default: 5 seconds.
pub const DEFAULT_TTL_MIN: u32 = 5;
/// `ttl_max` default: 6 days, matching common resolver practice.
pub const DEFAULT_TTL_MAX: u32 = 6 * 24 * 60 * 60;
/// Current on-disk format version; bumping this purges old stores on open.
pub const CACHE_VERSION: u16 = 3;

#[derive(Clone, Debug)]
pub struct CacheOpts {
    pub path: PathBuf,
    pub max_size_bytes: u64,
    pub ttl_min: u32,
    pub ttl_max: u32,
}

impl Default for CacheOpts {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/cache/resolver"),
            max_size_bytes: 100 * 1024 * 1024,
            ttl_min: DEFAULT_TTL_MIN,
            ttl_max: DEFAULT_TTL_MAX,
        }
    }
}

impl CacheOpts {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: env::var("CACHE_PATH").ok().map(PathBuf::from).unwrap_or(defaults.path),
            max_size_bytes: env::var("CACHE_MAX_SIZE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size_bytes),
            ttl_min: env::var("CACHE_TTL_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl_min),
            ttl_max: env::var("CACHE_TTL_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl_max),
        }
    }

    pub fn clamp(&self, ttl: u32) -> u32 {
        ttl.clamp(self.ttl_min, self.ttl_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_bounds() {
        let opts = CacheOpts {
            ttl_min: 5,
            ttl_max: 100,
            ..CacheOpts::default()
        };
        assert_eq!(opts.clamp(1), 5);
        assert_eq!(opts.clamp(1000), 100);
        assert_eq!(opts.clamp(50), 50);
    }
}
