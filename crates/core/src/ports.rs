//! Collaborator contracts the recommender is built against.
//!
//! The ranked store is modelled on sorted-set semantics: every key holds a set
//! of `(member, score)` pairs that can be read in score order and unioned
//! across keys. The product catalog only has to answer bulk id lookups.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::product::{Product, ProductId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("ranked store unavailable: {0}")]
    Unavailable(String),
    #[error("ranked store command failed: {0}")]
    Command(String),
    #[error("ranked store returned undecodable data: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("product catalog unavailable: {0}")]
    Unavailable(String),
    #[error("product catalog decode error: {0}")]
    Decode(String),
}

/// One member of a ranked set with its score.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self { member: member.into(), score }
    }
}

/// A single score increment inside an atomic batch.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreIncrement {
    pub key: String,
    pub member: String,
    pub delta: f64,
}

#[async_trait]
pub trait RankedStore: Send + Sync {
    /// Adds `delta` to the score of `member` under `key`, creating both as needed.
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError>;

    /// Applies every increment or none of them.
    async fn increment_batch(&self, increments: &[ScoreIncrement]) -> Result<(), StoreError>;

    /// Members of `key` from highest to lowest score, `start..=stop` by rank.
    ///
    /// Negative indices count from the end, so `(0, -1)` reads the whole set.
    async fn range_by_score_desc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<ScoredMember>, StoreError>;

    /// Replaces `dest` with the score-summed union of `sources` and returns its size.
    async fn union_store(&self, dest: &str, sources: &[String]) -> Result<usize, StoreError>;

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<usize, StoreError>;

    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products for the given ids. Order is unspecified and unknown ids are skipped.
    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError>;

    async fn list_all_product_ids(&self) -> Result<Vec<ProductId>, CatalogError>;

    async fn save(&self, product: Product) -> Result<(), CatalogError>;
}
