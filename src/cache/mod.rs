//! Cache module for storing API responses
//!
//! This module provides a response cache keyed by series, date range and
//! sampling frequency. Entries expire after a frequency-dependent TTL, and the
//! whole store is written through to a persistent key-value backend so it
//! survives restarts. Expired entries remain readable through `peek_stale`,
//! letting the fetch client serve old data when the API is unavailable.

mod clock;
mod key;
mod manager;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;
pub use manager::{CacheEntry, CacheStats, Lookup, ResponseCache, STORE_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistenceError};
