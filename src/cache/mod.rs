//! Cache core: state classification, cacheability rules, TTL derivation and
//! the shared store adapter.

pub mod policy;
pub mod state;
pub mod store;
pub mod ttl;

pub use state::CacheState;
pub use store::{RedisStore, Storage, StoreConnection, EXPIRY_INDEX_KEY, REVALIDATE_CHANNEL};
pub use ttl::Freshness;
