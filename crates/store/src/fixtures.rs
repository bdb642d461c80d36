use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use cobuy_core::domain::order::{Order, OrderId, OrderLine};
use cobuy_core::domain::product::{Product, ProductId};
use cobuy_core::ports::ProductCatalog;
use cobuy_core::recommender::{Recommender, RecommenderError};

struct DemoProduct {
    id: i64,
    name: &'static str,
    slug: &'static str,
    price_cents: i64,
}

const DEMO_PRODUCTS: &[DemoProduct] = &[
    DemoProduct { id: 1, name: "Green Tea", slug: "green-tea", price_cents: 3050 },
    DemoProduct { id: 2, name: "Red Tea", slug: "red-tea", price_cents: 4520 },
    DemoProduct { id: 3, name: "Tea Powder", slug: "tea-powder", price_cents: 2110 },
    DemoProduct { id: 4, name: "Black Tea", slug: "black-tea", price_cents: 3340 },
    DemoProduct { id: 5, name: "Oolong Tea", slug: "oolong-tea", price_cents: 3980 },
    DemoProduct { id: 6, name: "Clay Teapot", slug: "clay-teapot", price_cents: 6400 },
];

/// Demo orders as `(order id, product ids)`; one line per product.
const DEMO_ORDERS: &[(&str, &[i64])] = &[
    ("demo-order-001", &[1, 2, 3]),
    ("demo-order-002", &[1, 2]),
    ("demo-order-003", &[1, 6]),
    ("demo-order-004", &[4, 5, 6]),
    ("demo-order-005", &[2, 3, 4]),
];

/// Deterministic tea-shop catalog plus a handful of completed orders.
pub struct DemoCatalog;

impl DemoCatalog {
    pub fn products() -> Vec<Product> {
        DEMO_PRODUCTS
            .iter()
            .map(|demo| Product {
                id: ProductId(demo.id),
                name: demo.name.to_string(),
                slug: demo.slug.to_string(),
                price: Decimal::new(demo.price_cents, 2),
                available: true,
            })
            .collect()
    }

    pub fn orders() -> Vec<Order> {
        let products = Self::products();
        DEMO_ORDERS
            .iter()
            .enumerate()
            .map(|(index, (order_id, ids))| Order {
                id: OrderId((*order_id).to_string()),
                lines: ids
                    .iter()
                    .filter_map(|id| products.iter().find(|product| product.id.0 == *id))
                    .map(|product| OrderLine {
                        product_id: product.id,
                        quantity: 1,
                        unit_price: product.price,
                    })
                    .collect(),
                placed_at: Utc
                    .with_ymd_and_hms(2024, 1, 1 + u32::try_from(index).unwrap_or(0), 12, 0, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            })
            .collect()
    }

    /// Saves the demo products and records every demo order.
    ///
    /// Products are upserted, so loading twice leaves one copy of the catalog,
    /// but each load counts the demo orders again.
    pub async fn load(
        catalog: &dyn ProductCatalog,
        recommender: &Recommender,
    ) -> Result<SeedResult, RecommenderError> {
        let products = Self::products();
        let products_seeded = products.len();
        for product in products {
            catalog.save(product).await?;
        }

        let orders = Self::orders();
        for order in &orders {
            recommender.record_order(order).await?;
        }

        Ok(SeedResult {
            products_seeded,
            orders_recorded: orders.iter().map(|order| order.id.0.clone()).collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub products_seeded: usize,
    pub orders_recorded: Vec<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cobuy_core::domain::product::ProductId;
    use cobuy_core::ports::ProductCatalog;
    use cobuy_core::recommender::{Recommender, RecommenderSettings, SuggestionQuery};

    use super::DemoCatalog;
    use crate::{InMemoryProductCatalog, InMemoryRankedStore};

    #[test]
    fn demo_orders_only_reference_demo_products() {
        let products = DemoCatalog::products();
        for order in DemoCatalog::orders() {
            assert!(order.lines.len() >= 2, "order {} should pair products", order.id.0);
            for line in &order.lines {
                assert!(products.iter().any(|product| product.id == line.product_id));
            }
        }
    }

    #[tokio::test]
    async fn loading_demo_data_makes_green_tea_suggest_red_tea_first() {
        let catalog = Arc::new(InMemoryProductCatalog::default());
        let recommender = Recommender::new(
            Arc::new(InMemoryRankedStore::default()),
            catalog.clone(),
            RecommenderSettings::default(),
        );

        let seeded = DemoCatalog::load(catalog.as_ref(), &recommender).await.expect("seed");
        assert_eq!(seeded.products_seeded, 6);
        assert_eq!(seeded.orders_recorded.len(), 5);
        assert_eq!(catalog.list_all_product_ids().await.expect("list").len(), 6);

        let suggestions =
            recommender.suggest(&SuggestionQuery::new([ProductId(1)])).await.expect("suggest");
        let names = suggestions.iter().map(|product| product.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Red Tea", "Clay Teapot", "Tea Powder"]);
    }
}
