//! Shared application state.

use std::sync::Arc;

use crate::resolver::Resolver;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    /// Whether `DELETE /api/cache` also forgets indexed fingerprints.
    pub evict_clears_index: bool,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, evict_clears_index: bool) -> Self {
        Self { resolver, evict_clears_index }
    }
}
