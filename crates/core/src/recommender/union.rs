use std::sync::Arc;

use tracing::warn;

use crate::ports::{RankedStore, StoreError};

/// A per-query union key that is deleted when the query is done with it.
///
/// `release` is the normal exit path. If the guard is dropped unreleased
/// (the owning future was cancelled, or the delete itself failed) a
/// best-effort delete is spawned on the current tokio runtime.
pub(crate) struct TempUnion {
    store: Arc<dyn RankedStore>,
    key: String,
    released: bool,
}

impl TempUnion {
    pub(crate) fn new(store: Arc<dyn RankedStore>, key: String) -> Self {
        Self { store, key, released: false }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) async fn release(mut self) -> Result<(), StoreError> {
        self.store.delete(&self.key).await?;
        self.released = true;
        Ok(())
    }
}

impl Drop for TempUnion {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let key = std::mem::take(&mut self.key);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                event_name = "recommender.union.orphaned",
                union_key = %key,
                "no runtime available to delete temporary union key"
            );
            return;
        };

        let store = Arc::clone(&self.store);
        handle.spawn(async move {
            if let Err(error) = store.delete(&key).await {
                warn!(
                    event_name = "recommender.union.orphaned",
                    union_key = %key,
                    error = %error,
                    "deferred delete of temporary union key failed"
                );
            }
        });
    }
}
