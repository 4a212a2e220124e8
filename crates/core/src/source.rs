//! Seam between the resolver and the external catalog.

use async_trait::async_trait;

use crate::Error;
use crate::model::Product;

/// Something that can look a product up by its scan code outside the local store.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// `Ok(None)` when the source answers that no such product exists.
    async fn fetch_by_code(&self, code: &str) -> Result<Option<Product>, Error>;
}
