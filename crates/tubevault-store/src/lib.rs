//! Record stores for the TubeVault job core.
//!
//! The orchestrators only see the `VideoStore`/`DownloadJobStore`/
//! `ScanJobStore` traits; a `put` writes the whole record in one operation
//! so pollers never observe a partially-updated job.
//!
//! Two implementations are provided:
//! - `RedisStore` — JSON documents in Redis with per-video job indexes
//! - `MemoryStore` — in-process store for tests and single-process use

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redis_store::{RedisStore, RedisStoreConfig};
pub use traits::{DownloadJobStore, ScanJobStore, VideoStore};
