//! Tiered product resolution.
//!
//! A code is looked up in the persistent store first, then in the product
//! cache, whose supplier is the external catalog. Whatever the cache yields
//! is written back to the store. Resolution of one code is serialized so
//! concurrent requests for an unseen code persist a single product.

use std::sync::Arc;

use dashmap::DashMap;
use pricetag_core::{Error, Product, ProductCache, ProductSource, ProductStore};
use tokio::sync::Mutex;

/// Which tier answered a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Store,
    Cache,
    /// Fetched from the external catalog and persisted by this call.
    External,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub product: Product,
    pub origin: Origin,
}

pub struct Resolver {
    store: Arc<dyn ProductStore>,
    source: Arc<dyn ProductSource>,
    cache: Arc<ProductCache>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl Resolver {
    pub fn new(store: Arc<dyn ProductStore>, source: Arc<dyn ProductSource>, cache: Arc<ProductCache>) -> Self {
        Self { store, source, cache, in_flight: DashMap::new() }
    }

    pub fn cache(&self) -> &Arc<ProductCache> {
        &self.cache
    }

    /// The persistent tier, for read-only browse queries.
    pub fn store(&self) -> &Arc<dyn ProductStore> {
        &self.store
    }

    /// Resolve a product by scan code with at most `limit` prices (`0` for all).
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when no tier knows the code; catalog and store
    /// failures are passed through unchanged.
    pub async fn resolve_by_code(&self, code: &str, limit: usize) -> Result<Resolution, Error> {
        if let Some(product) = self.from_store(code, limit).await? {
            return Ok(Resolution { product, origin: Origin::Store });
        }

        let lock = Arc::clone(self.in_flight.entry(code.to_string()).or_default().value());
        let resolution = {
            let _guard = lock.lock().await;
            self.resolve_exclusive(code, limit).await
        };
        drop(lock);
        self.in_flight.remove_if(code, |_, lock| Arc::strong_count(lock) == 1);

        resolution
    }

    /// Every persisted product with its full price history, ordered by description.
    pub async fn find_all(&self) -> Result<Vec<Product>, Error> {
        Ok(Product::group(self.store.find_all().await?))
    }

    async fn resolve_exclusive(&self, code: &str, limit: usize) -> Result<Resolution, Error> {
        // another task may have persisted it while we waited
        if let Some(product) = self.from_store(code, limit).await? {
            return Ok(Resolution { product, origin: Origin::Store });
        }

        let mut fetched = false;
        let source = Arc::clone(&self.source);
        let products = self
            .cache
            .sync_or_fetch(code, || {
                fetched = true;
                async move { Ok::<_, Error>(source.fetch_by_code(code).await?.map(|product| vec![product])) }
            })
            .await?;

        let Some(product) = products.and_then(|products| products.into_iter().next()) else {
            tracing::info!(code, "code not found in any tier");
            return Err(Error::NotFound(code.to_string()));
        };

        self.store.save(&product).await?;

        let origin = if fetched { Origin::External } else { Origin::Cache };
        tracing::info!(code, ?origin, description = %product.description, "product resolved");

        Ok(Resolution { product: product.with_price_limit(limit), origin })
    }

    async fn from_store(&self, code: &str, limit: usize) -> Result<Option<Product>, Error> {
        let records = self.store.find_records_by_code(code, limit).await?;
        let product = Product::assemble(records);
        if product.is_some() {
            tracing::debug!(code, "resolved from store");
        }
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pricetag_core::{ProductDb, product_cache};

    use crate::testing::{FakeCatalog, Reply};

    const CODE: &str = "7891000055120";

    async fn resolver_with(catalog: Arc<FakeCatalog>) -> (Resolver, Arc<ProductDb>) {
        let db = Arc::new(ProductDb::open_in_memory().await.unwrap());
        let resolver = Resolver::new(db.clone(), catalog, Arc::new(product_cache()));
        (resolver, db)
    }

    #[tokio::test]
    async fn test_unseen_code_is_fetched_and_persisted() {
        let catalog = FakeCatalog::new(Reply::Found);
        let (resolver, db) = resolver_with(catalog.clone()).await;

        let resolution = resolver.resolve_by_code(CODE, 1).await.unwrap();

        assert_eq!(resolution.origin, Origin::External);
        assert_eq!(resolution.product.latest_price().unwrap().value, 13.35);
        assert_eq!(db.count_products().await.unwrap(), 1);
        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn test_store_hit_skips_catalog() {
        let catalog = FakeCatalog::new(Reply::Found);
        let (resolver, _db) = resolver_with(catalog.clone()).await;

        resolver.resolve_by_code(CODE, 1).await.unwrap();
        let second = resolver.resolve_by_code(CODE, 1).await.unwrap();

        assert_eq!(second.origin, Origin::Store);
        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_answers_when_store_misses() {
        let catalog = FakeCatalog::new(Reply::Found);
        let db = Arc::new(ProductDb::open_in_memory().await.unwrap());
        let cache = Arc::new(product_cache());
        let first = Resolver::new(db, catalog.clone(), Arc::clone(&cache));
        first.resolve_by_code(CODE, 1).await.unwrap();

        // a fresh store sharing the warm cache
        let empty = Arc::new(ProductDb::open_in_memory().await.unwrap());
        let second = Resolver::new(empty.clone(), catalog.clone(), cache);
        let resolution = second.resolve_by_code(CODE, 1).await.unwrap();

        assert_eq!(resolution.origin, Origin::Cache);
        assert_eq!(catalog.calls(), 1);
        assert_eq!(empty.count_products().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let catalog = FakeCatalog::new(Reply::Missing);
        let (resolver, db) = resolver_with(catalog).await;

        let result = resolver.resolve_by_code("134810923434", 1).await;

        assert!(matches!(result, Err(Error::NotFound(code)) if code == "134810923434"));
        assert_eq!(db.count_products().await.unwrap(), 0);
        assert!(!resolver.cache().contains_key("134810923434"));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_distinct_from_not_found() {
        let catalog = FakeCatalog::new(Reply::Failing);
        let (resolver, _db) = resolver_with(catalog).await;

        let result = resolver.resolve_by_code(CODE, 1).await;

        assert!(matches!(result, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_concurrent_resolution_persists_once() {
        let catalog = FakeCatalog::slow(Reply::Found, Duration::from_millis(50));
        let (resolver, db) = resolver_with(catalog.clone()).await;
        let resolver = Arc::new(resolver);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let resolver = Arc::clone(&resolver);
            handles.push(tokio::spawn(async move { resolver.resolve_by_code(CODE, 1).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(catalog.calls(), 1);
        assert_eq!(db.count_products().await.unwrap(), 1);
        assert_eq!(db.count_prices().await.unwrap(), 1);
        assert!(resolver.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_find_all_reads_store_only() {
        let catalog = FakeCatalog::new(Reply::Found);
        let (resolver, _db) = resolver_with(catalog.clone()).await;
        resolver.resolve_by_code(CODE, 1).await.unwrap();

        let products = resolver.find_all().await.unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].barcode, CODE);
        assert_eq!(catalog.calls(), 1);
    }
}
