// Logging setup and lookup counters
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directives` is used.
/// Returns an error if a subscriber is already installed.
pub fn init_tracing(default_directives: &str) -> crate::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| crate::PecsError::ConfigError(format!("tracing init failed: {}", e)))?;

    info!(target: "telemetry", "Tracing initialized");
    Ok(())
}

/// Counters kept by the pictogram provider
#[derive(Debug, Default)]
pub struct ProviderStats {
    search_hits: AtomicU64,
    search_misses: AtomicU64,
    network_queries: AtomicU64,
    image_hits: AtomicU64,
    downloads: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`ProviderStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatsSnapshot {
    pub search_hits: u64,
    pub search_misses: u64,
    pub network_queries: u64,
    pub image_hits: u64,
    pub downloads: u64,
    pub failures: u64,
}

impl ProviderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_search_hit(&self) {
        self.search_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_search_miss(&self) {
        self.search_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_network_query(&self) {
        self.network_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_image_hit(&self) {
        self.image_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProviderStatsSnapshot {
        ProviderStatsSnapshot {
            search_hits: self.search_hits.load(Ordering::Relaxed),
            search_misses: self.search_misses.load(Ordering::Relaxed),
            network_queries: self.network_queries.load(Ordering::Relaxed),
            image_hits: self.image_hits.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
