//! Core types and shared functionality for pricetag.
//!
//! This crate provides:
//! - Domain records (products and prices)
//! - Paging and sorting for browse queries
//! - The fingerprint-indexed product cache
//! - SQLite persistent store
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod page;
pub mod source;
pub mod store;

pub use cache::{Generation, IndexedCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{Price, PriceRecord, Product};
pub use page::{Page, PageRequest, ProductSort, SortDirection, SortField};
pub use source::ProductSource;
pub use store::{ProductDb, ProductStore};

/// The product cache as used by the resolver: keyed by product id, ordered by description.
pub type ProductCache = IndexedCache<Product, uuid::Uuid>;

/// Build an empty product cache with the canonical ordering and key.
pub fn product_cache() -> ProductCache {
    IndexedCache::new(Product::by_description, Product::key)
}
