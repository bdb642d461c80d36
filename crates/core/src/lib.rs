pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod recommender;

pub use domain::order::{Order, OrderId, OrderLine};
pub use domain::product::{Product, ProductId};
pub use errors::{ApplicationError, DomainError, FailureKind, InterfaceError};
pub use ports::{
    CatalogError, ProductCatalog, RankedStore, ScoreIncrement, ScoredMember, StoreError,
};
pub use recommender::{
    Recommender, RecommenderError, RecommenderSettings, SuggestionQuery, DEFAULT_MAX_RESULTS,
};
