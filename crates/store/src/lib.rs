pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod ranked;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoCatalog, SeedResult};
pub use ranked::{open_ranked_store, redact_url, InMemoryRankedStore, RedisRankedStore};
pub use repositories::{InMemoryProductCatalog, RepositoryError, SqlProductCatalog};
