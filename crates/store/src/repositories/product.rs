use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Row, Sqlite};

use cobuy_core::domain::product::{Product, ProductId};
use cobuy_core::ports::{CatalogError, ProductCatalog};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlProductCatalog {
    pool: DbPool,
}

impl SqlProductCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn remove(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let slug: String = row.try_get("slug").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let available: bool =
        row.try_get("available").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = Decimal::from_str(&price_str).map_err(|e| {
        RepositoryError::Decode(format!("product {id} has invalid price `{price_str}`: {e}"))
    })?;

    Ok(Product { id: ProductId(id), name, slug, price, available })
}

#[async_trait::async_trait]
impl ProductCatalog for SqlProductCatalog {
    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, slug, price, available FROM product WHERE id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.0);
        }
        separated.push_unseparated(")");

        let rows =
            builder.build().fetch_all(&self.pool).await.map_err(RepositoryError::Database)?;
        let products = rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    async fn list_all_product_ids(&self) -> Result<Vec<ProductId>, CatalogError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM product ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::Database)?;
        Ok(ids.into_iter().map(ProductId).collect())
    }

    async fn save(&self, product: Product) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO product (id, name, slug, price, available)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug,
                price = excluded.price,
                available = excluded.available,
                updated_at = datetime('now')",
        )
        .bind(product.id.0)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(product.price.to_string())
        .bind(product.available)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::Database)?;
        Ok(())
    }
}
