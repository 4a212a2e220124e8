//! Domain records shared by the store, the cache and the catalog client.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single observed price for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: Uuid,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl Price {
    /// A price observed right now.
    pub fn observed_now(value: f64) -> Self {
        Self { id: Uuid::new_v4(), value, observed_at: Utc::now() }
    }
}

/// A product resolved by its scan code, with its price history newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub barcode: String,
    pub description: String,
    pub sequence_code: i64,
    pub prices: Vec<Price>,
}

impl Product {
    /// Most recent price, if any was recorded.
    pub fn latest_price(&self) -> Option<&Price> {
        self.prices.first()
    }

    /// Copy of this product keeping only the `limit` newest prices (`0` keeps all).
    pub fn with_price_limit(&self, limit: usize) -> Self {
        let mut product = self.clone();
        if limit > 0 {
            product.prices.truncate(limit);
        }
        product
    }

    /// Canonical ordering used by the product cache: by description only.
    pub fn by_description(a: &Product, b: &Product) -> Ordering {
        a.description.cmp(&b.description)
    }

    /// Key extraction used by the product cache.
    pub fn key(product: &Product) -> Uuid {
        product.id
    }
}

/// One persisted price row joined with the product it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub product_id: Uuid,
    pub barcode: String,
    pub description: String,
    pub sequence_code: i64,
    pub price: Price,
}

impl Product {
    /// Fold price rows of a single product (newest first) into one product.
    ///
    /// Returns `None` when there are no rows.
    pub fn assemble(records: Vec<PriceRecord>) -> Option<Product> {
        let mut records = records.into_iter();
        let first = records.next()?;
        let mut prices = vec![first.price];
        prices.extend(records.map(|r| r.price));

        Some(Product {
            id: first.product_id,
            barcode: first.barcode,
            description: first.description,
            sequence_code: first.sequence_code,
            prices,
        })
    }

    /// Group price rows by product, keeping the first-seen order of products
    /// and the row order of prices within each product.
    pub fn group(records: Vec<PriceRecord>) -> Vec<Product> {
        let mut products: Vec<Product> = Vec::new();
        for record in records {
            match products.iter_mut().find(|p| p.id == record.product_id) {
                Some(product) => product.prices.push(record.price),
                None => products.push(Product {
                    id: record.product_id,
                    barcode: record.barcode,
                    description: record.description,
                    sequence_code: record.sequence_code,
                    prices: vec![record.price],
                }),
            }
        }
        products
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(product_id: Uuid, description: &str, value: f64) -> PriceRecord {
        PriceRecord {
            product_id,
            barcode: "7897534852624".into(),
            description: description.into(),
            sequence_code: 137513,
            price: Price::observed_now(value),
        }
    }

    #[test]
    fn test_assemble_keeps_row_order() {
        let id = Uuid::new_v4();
        let product = Product::assemble(vec![
            record(id, "ALCOOL HIG AZULIM 50", 5.65),
            record(id, "ALCOOL HIG AZULIM 50", 9.90),
        ])
        .unwrap();

        assert_eq!(product.id, id);
        assert_eq!(product.sequence_code, 137513);
        assert_eq!(product.prices.iter().map(|p| p.value).collect::<Vec<_>>(), vec![5.65, 9.90]);
        assert!(Product::assemble(Vec::new()).is_none());
    }

    #[test]
    fn test_group_by_product() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let products = Product::group(vec![record(a, "A", 1.0), record(b, "B", 2.0), record(a, "A", 3.0)]);

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, a);
        assert_eq!(products[0].prices.len(), 2);
        assert_eq!(products[1].prices.len(), 1);
    }

    fn product(prices: Vec<f64>) -> Product {
        Product {
            id: Uuid::new_v4(),
            barcode: "7891000055120".into(),
            description: "ACHOC PO NESCAU 800G".into(),
            sequence_code: 29250,
            prices: prices.into_iter().map(Price::observed_now).collect(),
        }
    }

    #[test]
    fn test_latest_price_is_first() {
        let p = product(vec![13.35, 5.5]);
        assert_eq!(p.latest_price().map(|p| p.value), Some(13.35));
        assert!(product(vec![]).latest_price().is_none());
    }

    #[test]
    fn test_price_limit() {
        let p = product(vec![1.0, 2.0, 3.0]);
        assert_eq!(p.with_price_limit(2).prices.len(), 2);
        assert_eq!(p.with_price_limit(0).prices.len(), 3);
        assert_eq!(p.with_price_limit(10).prices.len(), 3);
    }

    #[test]
    fn test_ordering_ignores_identity() {
        let a = product(vec![1.0]);
        let b = product(vec![2.0]);
        assert_ne!(a.id, b.id);
        assert_eq!(Product::by_description(&a, &b), Ordering::Equal);
    }
}
