use uuid::Uuid;

use crate::domain::product::ProductId;

pub const DEFAULT_KEY_PREFIX: &str = "product";
pub const DEFAULT_TEMP_KEY_PREFIX: &str = "tmp";

const ASSOCIATION_SUFFIX: &str = "purchased_with";

/// Naming scheme for association lists and per-query union keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationKeys {
    key_prefix: String,
    temp_key_prefix: String,
}

impl Default for AssociationKeys {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX, DEFAULT_TEMP_KEY_PREFIX)
    }
}

impl AssociationKeys {
    pub fn new(key_prefix: impl Into<String>, temp_key_prefix: impl Into<String>) -> Self {
        Self { key_prefix: key_prefix.into(), temp_key_prefix: temp_key_prefix.into() }
    }

    pub fn association(&self, product_id: ProductId) -> String {
        format!("{}:{product_id}:{ASSOCIATION_SUFFIX}", self.key_prefix)
    }

    /// A fresh key for one union query.
    ///
    /// Seeds are joined with `.` so `[1, 23]` and `[12, 3]` stay distinct, and
    /// the random suffix separates concurrent queries over the same seeds.
    pub fn temporary_union(&self, seeds: &[ProductId]) -> String {
        let flat_ids = seeds.iter().map(ProductId::to_string).collect::<Vec<_>>().join(".");
        format!("{}:union:{flat_ids}:{}", self.temp_key_prefix, Uuid::new_v4().simple())
    }

    pub fn is_temporary(&self, key: &str) -> bool {
        key.strip_prefix(&self.temp_key_prefix)
            .is_some_and(|rest| rest.starts_with(":union:"))
    }
}
