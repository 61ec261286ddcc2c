mod cache;
mod lock;
mod source;

pub use cache::{CacheEntry, CacheStore};
pub use lock::CacheLock;
pub use source::{HttpPriceSource, PriceSource, parse_models_dev};

use chrono::{DateTime, Utc};
use ocmonitor_types::ModelRef;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::PricingConfig;
use crate::error::{Error, FetchError, LockError};
use crate::tiers::PriceTable;

/// How the remote tier was obtained for this invocation
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteStatus {
    /// Remote fallback turned off; nothing was read or fetched
    Disabled,
    /// No cache location could be determined
    NoCachePath,
    /// Served from a fresh cache entry without touching the network
    CacheHit { fetched_at: DateTime<Utc> },
    /// Fetched from the network. `cache_written` is false when the lock or the
    /// write failed, or when another process stored a newer entry during the
    /// fetch; the fetched data is still used.
    Fetched { cache_written: bool },
    /// Fetch failed; an expired cache entry was used instead
    StaleFallback {
        fetched_at: DateTime<Utc>,
        error: FetchError,
    },
    /// Fetch failed and no usable cache exists; the remote tier is empty
    Unavailable { error: FetchError },
}

impl RemoteStatus {
    pub fn is_stale(&self) -> bool {
        matches!(self, RemoteStatus::StaleFallback { .. })
    }

    /// Text for a non-fatal warning, if this status deserves one
    pub fn warning(&self) -> Option<String> {
        match self {
            RemoteStatus::StaleFallback { fetched_at, error } => Some(format!(
                "remote pricing unavailable ({}); using cached prices from {}",
                error,
                fetched_at.format("%Y-%m-%d %H:%M UTC")
            )),
            RemoteStatus::Unavailable { error } => {
                Some(format!("remote pricing unavailable ({})", error))
            }
            RemoteStatus::NoCachePath => {
                Some("remote pricing disabled: no cache directory available".to_string())
            }
            _ => None,
        }
    }
}

/// Remote tier plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOutcome {
    pub prices: PriceTable,
    pub status: RemoteStatus,
}

impl RemoteOutcome {
    fn empty(status: RemoteStatus) -> Self {
        Self {
            prices: PriceTable::new(),
            status,
        }
    }

    /// Keep only the entries any of `models` would look up
    pub fn restricted_to(mut self, models: &[ModelRef]) -> Self {
        let wanted: std::collections::BTreeSet<String> =
            models.iter().flat_map(|m| m.lookup_keys()).collect();
        self.prices.retain(|key, _| wanted.contains(key));
        self
    }
}

/// Remote tier with a shared on-disk cache.
///
/// Responsibilities:
/// - Disabled: return empty without network or lock
/// - Fresh cache: return it without network
/// - Otherwise fetch; on success write the cache under the lock (best effort),
///   unless another process stored a newer entry while this one was fetching
/// - On fetch failure: expired cache if allowed, else empty plus a warning
pub struct RemoteFetcher<S: PriceSource> {
    source: S,
    cache: Option<CacheStore>,
    enabled: bool,
    ttl_seconds: u64,
    allow_stale: bool,
    lock_timeout: Duration,
}

impl RemoteFetcher<HttpPriceSource> {
    /// Fetcher for the configured URL. `no_remote` overrides the config.
    pub fn from_config(config: &PricingConfig, no_remote: bool) -> Self {
        let source = HttpPriceSource::new(
            config.remote_url.clone(),
            Duration::from_secs(config.remote_timeout_seconds),
        );
        Self::with_source(source, config.cache_path(), config).enabled(config.remote_fallback && !no_remote)
    }
}

impl<S: PriceSource> RemoteFetcher<S> {
    pub fn with_source(source: S, cache_path: Option<PathBuf>, config: &PricingConfig) -> Self {
        Self {
            source,
            cache: cache_path.map(CacheStore::new),
            enabled: config.remote_fallback,
            ttl_seconds: config.ttl_seconds(),
            allow_stale: config.allow_stale_cache_on_error,
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// Remote prices relevant to `models`
    pub fn resolve(&self, models: &[ModelRef]) -> RemoteOutcome {
        self.resolve_all().restricted_to(models)
    }

    /// The whole remote table
    pub fn resolve_all(&self) -> RemoteOutcome {
        if !self.enabled {
            return RemoteOutcome::empty(RemoteStatus::Disabled);
        }
        let Some(cache) = &self.cache else {
            tracing::warn!("no cache directory available, skipping remote pricing");
            return RemoteOutcome::empty(RemoteStatus::NoCachePath);
        };

        let cached = cache.read();
        let now = Utc::now();
        if let Some(entry) = &cached
            && !entry.is_stale(now)
        {
            tracing::debug!(path = %cache.path().display(), "using fresh price cache");
            return RemoteOutcome {
                prices: entry.models.clone(),
                status: RemoteStatus::CacheHit {
                    fetched_at: entry.fetched_at,
                },
            };
        }

        match self.source.fetch() {
            Ok(prices) => {
                let entry = CacheEntry::new(prices, self.source.url(), self.ttl_seconds);
                let cache_written = match self.store(cache, &entry, now) {
                    Ok(written) => written,
                    Err(Error::Lock(LockError::Timeout { path, waited_ms })) => {
                        tracing::warn!(
                            lock = %path.display(),
                            waited_ms,
                            "price cache is locked by another process, skipping write"
                        );
                        false
                    }
                    Err(e) => {
                        tracing::warn!(path = %cache.path().display(), error = %e, "failed to write price cache");
                        false
                    }
                };
                RemoteOutcome {
                    prices: entry.models,
                    status: RemoteStatus::Fetched { cache_written },
                }
            }
            Err(error) => self.fallback(cached, error),
        }
    }

    /// Write `entry` under the lock. Returns false when the cache already
    /// holds an entry fetched after `fetch_started`.
    fn store(
        &self,
        cache: &CacheStore,
        entry: &CacheEntry,
        fetch_started: DateTime<Utc>,
    ) -> crate::Result<bool> {
        let _lock = CacheLock::acquire(cache.path(), self.lock_timeout)?;
        if let Some(current) = cache.read()
            && current.fetched_at >= fetch_started
        {
            tracing::debug!(
                path = %cache.path().display(),
                fetched_at = %current.fetched_at,
                "newer price cache written by another process, keeping it"
            );
            return Ok(false);
        }
        cache.write(entry)?;
        Ok(true)
    }

    fn fallback(&self, cached: Option<CacheEntry>, error: FetchError) -> RemoteOutcome {
        match cached {
            Some(entry) if self.allow_stale => {
                tracing::warn!(error = %error, fetched_at = %entry.fetched_at, "remote pricing fetch failed, using stale cache");
                RemoteOutcome {
                    prices: entry.models,
                    status: RemoteStatus::StaleFallback {
                        fetched_at: entry.fetched_at,
                        error,
                    },
                }
            }
            _ => {
                tracing::warn!(error = %error, "remote pricing fetch failed, no remote prices available");
                RemoteOutcome::empty(RemoteStatus::Unavailable { error })
            }
        }
    }
}
