pub mod backend;
pub mod config;
pub mod dns;
pub mod entry;
pub mod error;
pub mod handle;
pub mod key;
pub mod lifecycle;
pub mod nsec_data;
pub mod peek;
pub mod rank;
pub mod stash;
pub mod stats;

pub use backend::{mem_backend::MemBackend, sled_backend::SledBackend, Backend};
pub use config::CacheOpts;
pub use error::{CacheError, Result};
pub use handle::CacheHandle;
pub use peek::{PeekOutcome, PeekRequest, PeekResult};
pub use rank::Rank;
