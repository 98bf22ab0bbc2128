//! Caching subsystem.
//!
//! - [`ResultCache`]: fingerprint-keyed TTL cache of generated content,
//!   one per governor. In-process moka tier plus an optional persistent
//!   tier. See [`result`] module docs for expiry and failure policy.
//!
//! - [`LocalStore`]: the persistent tier's string key-value interface, with
//!   [`MemoryStore`] and [`FileStore`] implementations.

pub mod result;
pub mod store;

pub use result::{CacheConfig, CacheEntry, ResultCache};
pub use store::{FileStore, LocalStore, MemoryStore, default_store_path};
