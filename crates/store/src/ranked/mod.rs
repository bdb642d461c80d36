use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::info;

use cobuy_core::config::{StoreBackend, StoreConfig};
use cobuy_core::ports::{RankedStore, StoreError};

pub mod memory;
pub mod redis;

pub use memory::InMemoryRankedStore;
pub use self::redis::{redact_url, RedisRankedStore};

/// Builds the ranked store selected by `config.backend`.
pub async fn open_ranked_store(config: &StoreConfig) -> Result<Arc<dyn RankedStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!(
                event_name = "store.ranked.opened",
                backend = "memory",
                "using process-local ranked store"
            );
            Ok(Arc::new(InMemoryRankedStore::default()))
        }
        StoreBackend::Redis => {
            let store = RedisRankedStore::connect(
                config.url.expose_secret(),
                Duration::from_millis(config.connect_timeout_ms),
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
