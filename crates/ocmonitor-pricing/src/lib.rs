//! Model pricing resolved from three tiers.
//!
//! - `user` and `project` tiers are local `models.json` files
//! - the `remote` tier comes from a models.dev snapshot cached on disk and
//!   shared by every ocmonitor process on the machine
//!
//! Tiers merge field by field and fill only: a field set by a higher tier is
//! never replaced by a lower one.

pub mod config;
pub mod error;
pub mod remote;
pub mod resolver;
pub mod tiers;

pub use config::PricingConfig;
pub use error::{Error, FetchError, LockError, Result};
pub use remote::{
    CacheEntry, CacheLock, CacheStore, HttpPriceSource, PriceSource, RemoteFetcher, RemoteOutcome,
    RemoteStatus,
};
pub use resolver::PriceResolver;
pub use tiers::{PriceTable, load_price_file};
