//! Co-purchase recommender
//!
//! Keeps one association list per product in a ranked store: related product
//! id as member, number of orders both appeared in as score. Suggestions for a
//! single product are a descending read of its list; suggestions for several
//! products are a descending read of the score-summed union of their lists,
//! with the seed products removed.

mod keys;
mod rank;
mod union;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::domain::order::Order;
use crate::domain::product::{Product, ProductId};
use crate::errors::{ApplicationError, DomainError};
use crate::ports::{
    CatalogError, ProductCatalog, RankedStore, ScoreIncrement, ScoredMember, StoreError,
};

pub use keys::{AssociationKeys, DEFAULT_KEY_PREFIX, DEFAULT_TEMP_KEY_PREFIX};
pub use rank::{co_purchase_pairs, distinct, order_by_rank, weight_from_score};

use union::TempUnion;

/// Suggestions returned when the caller does not ask for a specific count.
pub const DEFAULT_MAX_RESULTS: usize = 6;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecommenderError {
    #[error("at least one seed product is required")]
    EmptySeed,
    #[error("max_results must be greater than zero")]
    InvalidMaxResults,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("`{operation}` did not complete within {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },
    #[error("temporary union key `{0}` is already in use")]
    UnionKeyCollision(String),
}

impl RecommenderError {
    /// Infrastructure failures a caller may retry; the recommender itself never does.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable(_))
                | Self::Catalog(CatalogError::Unavailable(_))
                | Self::Timeout { .. }
                | Self::UnionKeyCollision(_)
        )
    }
}

impl From<RecommenderError> for ApplicationError {
    fn from(value: RecommenderError) -> Self {
        match value {
            RecommenderError::EmptySeed | RecommenderError::InvalidMaxResults => {
                Self::Domain(DomainError::InvalidQuery(value.to_string()))
            }
            RecommenderError::Store(error) => Self::RankedStore(error),
            RecommenderError::Catalog(error) => Self::Catalog(error),
            RecommenderError::Timeout { .. } | RecommenderError::UnionKeyCollision(_) => {
                Self::Transient(value.to_string())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommenderSettings {
    pub keys: AssociationKeys,
    /// Deadline applied to every collaborator call. `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self { keys: AssociationKeys::default(), operation_timeout: None }
    }
}

impl RecommenderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            keys: AssociationKeys::new(&config.store.key_prefix, &config.store.temp_key_prefix),
            operation_timeout: Some(Duration::from_millis(config.store.operation_timeout_ms)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestionQuery {
    pub products: Vec<ProductId>,
    pub max_results: usize,
}

impl SuggestionQuery {
    pub fn new(products: impl IntoIterator<Item = ProductId>) -> Self {
        Self { products: products.into_iter().collect(), max_results: DEFAULT_MAX_RESULTS }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

pub struct Recommender {
    store: Arc<dyn RankedStore>,
    catalog: Arc<dyn ProductCatalog>,
    settings: RecommenderSettings,
}

impl Recommender {
    pub fn new(
        store: Arc<dyn RankedStore>,
        catalog: Arc<dyn ProductCatalog>,
        settings: RecommenderSettings,
    ) -> Self {
        Self { store, catalog, settings }
    }

    /// Counts one co-purchase for every pair of distinct `products`.
    ///
    /// Both directions of a pair are written as one atomic batch, so the two
    /// association lists always agree on the pair's weight.
    pub async fn record_co_purchases(
        &self,
        products: &[ProductId],
    ) -> Result<(), RecommenderError> {
        let products = distinct(products);
        let pairs = co_purchase_pairs(&products);
        if pairs.is_empty() {
            debug!(
                event_name = "recommender.record.skipped",
                products = products.len(),
                "fewer than two distinct products, nothing to record"
            );
            return Ok(());
        }

        for (first, second) in &pairs {
            let increments = [
                ScoreIncrement {
                    key: self.settings.keys.association(*first),
                    member: second.to_string(),
                    delta: 1.0,
                },
                ScoreIncrement {
                    key: self.settings.keys.association(*second),
                    member: first.to_string(),
                    delta: 1.0,
                },
            ];
            self.within("increment_batch", self.store.increment_batch(&increments)).await?;
        }

        info!(
            event_name = "recommender.record.completed",
            products = products.len(),
            pairs = pairs.len(),
            "recorded co-purchases"
        );
        Ok(())
    }

    pub async fn record_order(&self, order: &Order) -> Result<(), RecommenderError> {
        debug!(
            event_name = "recommender.record.order",
            order_id = %order.id.0,
            lines = order.lines.len(),
            "recording co-purchases for completed order"
        );
        self.record_co_purchases(&order.product_ids()).await
    }

    /// Products most often bought together with the query's products, best first.
    ///
    /// Seed products are never suggested. Ranked ids missing from the catalog
    /// are dropped, so fewer than `max_results` products may come back.
    pub async fn suggest(
        &self,
        query: &SuggestionQuery,
    ) -> Result<Vec<Product>, RecommenderError> {
        if query.max_results == 0 {
            return Err(RecommenderError::InvalidMaxResults);
        }
        let seeds = distinct(&query.products);

        let ranked = match seeds.as_slice() {
            [] => return Err(RecommenderError::EmptySeed),
            [single] => self.ranked_for_single(*single, query.max_results).await?,
            _ => self.ranked_for_union(&seeds, query.max_results).await?,
        };

        let ids = decode_ranked(ranked, &seeds, query.max_results);
        let products = self.resolve(&ids).await?;

        info!(
            event_name = "recommender.suggest.completed",
            seeds = seeds.len(),
            ranked = ids.len(),
            returned = products.len(),
            "computed suggestions"
        );
        Ok(products)
    }

    /// Deletes the association list of every product in the catalog.
    ///
    /// Not transactional: a failure part way leaves earlier lists cleared.
    pub async fn clear_all(&self) -> Result<(), RecommenderError> {
        let ids = self.within("list_all_product_ids", self.catalog.list_all_product_ids()).await?;

        let mut cleared = 0usize;
        for id in &ids {
            let key = self.settings.keys.association(*id);
            if self.within("delete", self.store.delete(&key)).await? {
                cleared += 1;
            }
        }

        info!(
            event_name = "recommender.clear.completed",
            products = ids.len(),
            cleared,
            "cleared association lists"
        );
        Ok(())
    }

    /// Number of recorded orders containing both `product` and `other`.
    pub async fn association_weight(
        &self,
        product: ProductId,
        other: ProductId,
    ) -> Result<u64, RecommenderError> {
        let key = self.settings.keys.association(product);
        let score = self.within("score", self.store.score(&key, &other.to_string())).await?;
        Ok(score.map(weight_from_score).unwrap_or(0))
    }

    /// The full association list of `product`, heaviest first.
    pub async fn associations(
        &self,
        product: ProductId,
    ) -> Result<Vec<(ProductId, u64)>, RecommenderError> {
        let key = self.settings.keys.association(product);
        let ranked =
            self.within("range_by_score_desc", self.store.range_by_score_desc(&key, 0, -1)).await?;

        Ok(ranked
            .into_iter()
            .filter_map(|entry| match entry.member.parse::<ProductId>() {
                Ok(id) => Some((id, weight_from_score(entry.score))),
                Err(error) => {
                    warn!(
                        event_name = "recommender.member.invalid",
                        key = %key,
                        error = %error,
                        "skipping association member that is not a product id"
                    );
                    None
                }
            })
            .collect())
    }

    async fn ranked_for_single(
        &self,
        product: ProductId,
        max_results: usize,
    ) -> Result<Vec<ScoredMember>, RecommenderError> {
        let key = self.settings.keys.association(product);
        let stop = last_rank(max_results);
        self.within("range_by_score_desc", self.store.range_by_score_desc(&key, 0, stop)).await
    }

    async fn ranked_for_union(
        &self,
        seeds: &[ProductId],
        max_results: usize,
    ) -> Result<Vec<ScoredMember>, RecommenderError> {
        let union_key = self.settings.keys.temporary_union(seeds);
        if self.within("exists", self.store.exists(&union_key)).await? {
            return Err(RecommenderError::UnionKeyCollision(union_key));
        }

        let union = TempUnion::new(Arc::clone(&self.store), union_key.clone());
        let ranked = self.read_union(&union, seeds, max_results).await;

        if let Err(error) = self.within("delete", union.release()).await {
            warn!(
                event_name = "recommender.union.cleanup_failed",
                union_key = %union_key,
                error = %error,
                "could not delete temporary union key"
            );
        }

        ranked
    }

    async fn read_union(
        &self,
        union: &TempUnion,
        seeds: &[ProductId],
        max_results: usize,
    ) -> Result<Vec<ScoredMember>, RecommenderError> {
        let sources =
            seeds.iter().map(|id| self.settings.keys.association(*id)).collect::<Vec<_>>();
        let size =
            self.within("union_store", self.store.union_store(union.key(), &sources)).await?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let members = seeds.iter().map(ProductId::to_string).collect::<Vec<_>>();
        self.within("remove_members", self.store.remove_members(union.key(), &members)).await?;

        self.within(
            "range_by_score_desc",
            self.store.range_by_score_desc(union.key(), 0, last_rank(max_results)),
        )
        .await
    }

    async fn resolve(&self, ids: &[ProductId]) -> Result<Vec<Product>, RecommenderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetched =
            self.within("get_products_by_ids", self.catalog.get_products_by_ids(ids)).await?;
        let products = order_by_rank(ids, fetched, |product| &product.id);
        if products.len() < ids.len() {
            debug!(
                event_name = "recommender.suggest.catalog_miss",
                missing = ids.len() - products.len(),
                "ranked products no longer in catalog"
            );
        }
        Ok(products)
    }

    async fn within<T, E, F>(
        &self,
        operation: &'static str,
        future: F,
    ) -> Result<T, RecommenderError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<RecommenderError>,
    {
        let Some(limit) = self.settings.operation_timeout else {
            return future.await.map_err(Into::into);
        };

        match tokio::time::timeout(limit, future).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(RecommenderError::Timeout {
                operation,
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

fn decode_ranked(
    ranked: Vec<ScoredMember>,
    seeds: &[ProductId],
    max_results: usize,
) -> Vec<ProductId> {
    ranked
        .into_iter()
        .filter_map(|entry| match entry.member.parse::<ProductId>() {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(
                    event_name = "recommender.member.invalid",
                    error = %error,
                    "skipping ranked member that is not a product id"
                );
                None
            }
        })
        .filter(|id| !seeds.contains(id))
        .take(max_results)
        .collect()
}

fn last_rank(max_results: usize) -> isize {
    isize::try_from(max_results).map(|count| count - 1).unwrap_or(isize::MAX)
}

#[cfg(test)]
mod tests {
    use super::{last_rank, RecommenderError, SuggestionQuery, DEFAULT_MAX_RESULTS};
    use crate::domain::product::ProductId;
    use crate::errors::{ApplicationError, DomainError};
    use crate::ports::{CatalogError, StoreError};

    #[test]
    fn query_defaults_to_six_results() {
        let query = SuggestionQuery::new([ProductId(1)]);
        assert_eq!(query.max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(query.with_max_results(2).max_results, 2);
    }

    #[test]
    fn last_rank_is_inclusive_stop_index() {
        assert_eq!(last_rank(1), 0);
        assert_eq!(last_rank(6), 5);
    }

    #[test]
    fn infrastructure_failures_are_retryable() {
        assert!(RecommenderError::Store(StoreError::Unavailable("down".into())).is_retryable());
        assert!(RecommenderError::Catalog(CatalogError::Unavailable("down".into())).is_retryable());
        assert!(RecommenderError::Timeout { operation: "delete", timeout_ms: 5 }.is_retryable());
        assert!(!RecommenderError::EmptySeed.is_retryable());
        assert!(!RecommenderError::Store(StoreError::Decode("bad".into())).is_retryable());
    }

    #[test]
    fn input_errors_map_to_domain_failures() {
        let mapped = ApplicationError::from(RecommenderError::EmptySeed);
        assert_eq!(
            mapped,
            ApplicationError::Domain(DomainError::InvalidQuery(
                "at least one seed product is required".to_string()
            ))
        );

        let mapped = ApplicationError::from(RecommenderError::Timeout {
            operation: "union_store",
            timeout_ms: 250,
        });
        assert!(matches!(
            mapped,
            ApplicationError::Transient(ref message) if message.contains("union_store")
        ));
    }
}
