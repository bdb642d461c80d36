use std::collections::BTreeMap;

use tokio::sync::RwLock;

use cobuy_core::domain::product::{Product, ProductId};
use cobuy_core::ports::{CatalogError, ProductCatalog};

#[derive(Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: RwLock::new(
                products.into_iter().map(|product| (product.id, product)).collect(),
            ),
        }
    }

    pub async fn remove(&self, id: ProductId) -> bool {
        self.products.write().await.remove(&id).is_some()
    }
}

#[async_trait::async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError> {
        let products = self.products.read().await;
        // Key order, not request order, like a SQL `IN` lookup.
        Ok(products.values().filter(|product| ids.contains(&product.id)).cloned().collect())
    }

    async fn list_all_product_ids(&self) -> Result<Vec<ProductId>, CatalogError> {
        Ok(self.products.read().await.keys().copied().collect())
    }

    async fn save(&self, product: Product) -> Result<(), CatalogError> {
        self.products.write().await.insert(product.id, product);
        Ok(())
    }
}
