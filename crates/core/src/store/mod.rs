//! SQLite-backed persistent store for products and their price history.
//!
//! - Async access via tokio-rusqlite
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Find-or-create writes keyed by barcode

pub mod connection;
pub mod migrations;
pub mod products;

use async_trait::async_trait;

use uuid::Uuid;

use crate::Error;
use crate::model::{Price, PriceRecord, Product};
use crate::page::{Page, PageRequest, ProductSort};

pub use connection::ProductDb;

/// Persistent store contract consumed by the resolver and the browse routes.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Up to `limit` price rows for `code`, newest first. `0` means no bound.
    async fn find_records_by_code(&self, code: &str, limit: usize) -> Result<Vec<PriceRecord>, Error>;

    /// Every persisted price row, grouped-friendly (by product, newest price first).
    async fn find_all(&self) -> Result<Vec<PriceRecord>, Error>;

    /// Persist a product and its prices, reusing an existing product with the same barcode.
    async fn save(&self, product: &Product) -> Result<(), Error>;

    /// Every product with its full price history, in `sort` order.
    async fn find_sorted(&self, sort: ProductSort) -> Result<Vec<Product>, Error>;

    /// One page of products with their full price history.
    async fn find_page(&self, request: &PageRequest) -> Result<Page<Product>, Error>;

    /// Every product carrying only its newest price, ordered by description.
    async fn find_all_with_latest_price(&self) -> Result<Vec<Product>, Error>;

    /// Products whose description contains `query`, ignoring case. An empty
    /// query matches nothing.
    async fn search_by_description(&self, query: &str, request: &PageRequest) -> Result<Page<Product>, Error>;

    /// A single price row by its id.
    async fn find_price_by_id(&self, id: Uuid) -> Result<Option<Price>, Error>;
}
