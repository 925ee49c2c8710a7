//! Skillbridge cache coordination layer.
//!
//! Sits between the HTTP handlers and the relational sources, backed by a
//! shared key-value store (Redis in production, an in-memory store for tests
//! and single-process runs). Provides:
//!
//! - **Facade**: typed JSON get/set/del with per-entry expiry
//! - **Stable keys**: canonical tokens for unordered selection lists
//! - **Single flight**: at most one participant across the whole fleet
//!   recomputes an expired entry; concurrent callers wait briefly for the
//!   published result and recompute themselves only after a bounded wait
//! - **Administration**: pattern-scoped purge and full wipe
//!
//! ## Configuration
//!
//! Tuning lives in `skillbridge.toml`:
//!
//! ```toml
//! [cache]
//! follower_poll_attempts = 20
//! follower_poll_interval_ms = 100
//! lock_ttl_seconds = 10
//! purge_batch = 1000
//! ```

mod admin;
mod config;
mod facade;
pub mod keys;
mod lock;
mod memory;
mod single_flight;
mod store;

pub use admin::CacheAdmin;
pub use config::CacheTuning;
pub use facade::{Cache, CacheError};
pub use memory::InMemoryStore;
pub use single_flight::{SingleFlight, SingleFlightError};
pub use store::{ScanPage, SharedStore, StoreError};
