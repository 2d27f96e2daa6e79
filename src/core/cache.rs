use crate::core::config::TableNames;
use crate::core::table::{Table, TableSource};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Pre-normalized copy of both configuration tables.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub countries: Table,
    pub accounts: Table,
    pub loaded_at: Option<Instant>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty() || self.accounts.is_empty()
    }
}

struct CacheValue {
    snapshot: Arc<Snapshot>,
    expires_at: Instant,
}

/// Holds the configuration tables for a fixed time-to-live.
///
/// The lock is held across the fetch, so callers arriving while a refresh
/// is running wait for it and then share its snapshot.
pub struct ConfigCache {
    source: Arc<dyn TableSource>,
    tables: TableNames,
    ttl: Duration,
    inner: Mutex<Option<CacheValue>>,
}

impl ConfigCache {
    pub fn new(source: Arc<dyn TableSource>, tables: TableNames, ttl: Duration) -> Self {
        Self {
            source,
            tables,
            ttl,
            inner: Mutex::new(None),
        }
    }

    /// Returns the cached snapshot, refreshing it once expired.
    ///
    /// A failed fetch yields an empty snapshot, which is not kept.
    pub async fn load(&self) -> Arc<Snapshot> {
        let mut cache = self.inner.lock().await;
        if let Some(entry) = cache.as_ref() {
            if Instant::now() < entry.expires_at {
                debug!("Cache HIT for configuration snapshot");
                return Arc::clone(&entry.snapshot);
            }
            debug!("Cache entry expired for configuration snapshot");
        } else {
            debug!("Cache MISS for configuration snapshot");
        }

        match self.fetch().await {
            Ok(snapshot) if !snapshot.is_empty() => {
                let snapshot = Arc::new(snapshot);
                *cache = Some(CacheValue {
                    snapshot: Arc::clone(&snapshot),
                    expires_at: Instant::now() + self.ttl,
                });
                snapshot
            }
            Ok(snapshot) => {
                warn!(
                    countries = snapshot.countries.rows.len(),
                    accounts = snapshot.accounts.rows.len(),
                    "Configuration tables are empty"
                );
                *cache = None;
                Arc::new(Snapshot::empty())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load configuration tables");
                *cache = None;
                Arc::new(Snapshot::empty())
            }
        }
    }

    pub async fn invalidate(&self) {
        let mut cache = self.inner.lock().await;
        cache.take();
        debug!("Cache CLEAR for configuration snapshot");
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let (countries, accounts) = futures::try_join!(
            async {
                self.source
                    .fetch_all(&self.tables.countries)
                    .await
                    .with_context(|| format!("Failed to fetch table {}", self.tables.countries))
            },
            async {
                self.source
                    .fetch_all(&self.tables.accounts)
                    .await
                    .with_context(|| format!("Failed to fetch table {}", self.tables.accounts))
            },
        )?;

        let snapshot = Snapshot {
            countries: Table::from_records(&self.tables.countries, countries).normalized(),
            accounts: Table::from_records(&self.tables.accounts, accounts).normalized(),
            loaded_at: Some(Instant::now()),
        };
        info!(
            countries = snapshot.countries.rows.len(),
            accounts = snapshot.accounts.rows.len(),
            "Loaded configuration tables"
        );
        Ok(snapshot)
    }
}
