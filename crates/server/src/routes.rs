//! HTTP routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get},
};
use pricetag_core::{Error, Page, PageRequest, Price, Product, ProductSort, page::DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;
use crate::freshness::{FreshnessGate, freshness_middleware};
use crate::resolver::{Origin, Resolution};
use crate::state::AppState;

const MIN_CODE_LEN: usize = 8;
const MAX_CODE_LEN: usize = 14;

/// Build the application router.
///
/// The freshness gate wraps the read-only `/api` routes. Cache eviction and
/// the health check sit outside it.
pub fn router(state: AppState, gate: FreshnessGate) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/page", get(page_products))
        .route("/api/products/latest", get(latest_products))
        .route("/api/products/search", get(search_products))
        .route("/api/products/:code", get(get_product))
        .route("/api/prices/:code", get(get_prices))
        .route("/api/price-records/:id", get(get_price_record))
        .route_layer(middleware::from_fn_with_state(gate, freshness_middleware))
        .route("/api/cache", delete(evict_cache))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct PriceQuery {
    #[serde(default)]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrowseQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: usize,
    size: Option<usize>,
    sort: Option<String>,
}

impl BrowseQuery {
    fn page_request(&self) -> Result<PageRequest, Error> {
        let sort = self.sort.as_deref().map(ProductSort::parse).transpose()?.unwrap_or_default();
        PageRequest::new(self.page, self.size.unwrap_or(DEFAULT_PAGE_SIZE), sort)
    }
}

fn validate_code(code: &str) -> Result<(), ApiError> {
    let len_ok = (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len());
    if !len_ok || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::invalid_input(format!(
            "code must be {MIN_CODE_LEN} to {MAX_CODE_LEN} digits, got {code:?}"
        )));
    }
    Ok(())
}

fn respond(resolution: Resolution) -> (StatusCode, Json<Product>) {
    let status = match resolution.origin {
        Origin::External => StatusCode::CREATED,
        Origin::Store | Origin::Cache => StatusCode::OK,
    };
    (status, Json(resolution.product))
}

async fn list_products(
    State(state): State<AppState>, Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = match query.sort.as_deref() {
        Some(sort) => state.resolver.store().find_sorted(ProductSort::parse(sort)?).await?,
        None => state.resolver.find_all().await?,
    };
    Ok(Json(products))
}

async fn page_products(
    State(state): State<AppState>, Query(query): Query<BrowseQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    let request = query.page_request()?;
    Ok(Json(state.resolver.store().find_page(&request).await?))
}

async fn latest_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.resolver.store().find_all_with_latest_price().await?))
}

async fn search_products(
    State(state): State<AppState>, Query(query): Query<BrowseQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    let request = query.page_request()?;
    Ok(Json(state.resolver.store().search_by_description(&query.q, &request).await?))
}

async fn get_price_record(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Price>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::invalid_input(format!("price id must be a UUID, got {id:?}")))?;
    let price = state.resolver.store().find_price_by_id(id).await?;
    price.map(Json).ok_or_else(|| Error::NotFound("Price not found".to_string()).into())
}

async fn get_product(
    State(state): State<AppState>, Path(code): Path<String>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validate_code(&code)?;
    Ok(respond(state.resolver.resolve_by_code(&code, 1).await?))
}

async fn get_prices(
    State(state): State<AppState>, Path(code): Path<String>, Query(query): Query<PriceQuery>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validate_code(&code)?;
    Ok(respond(state.resolver.resolve_by_code(&code, query.limit).await?))
}

async fn evict_cache(State(state): State<AppState>) -> StatusCode {
    let cache = state.resolver.cache();
    if state.evict_clears_index {
        cache.evict_all_including_index().await;
    } else {
        cache.evict_all().await;
    }
    StatusCode::NO_CONTENT
}

async fn health() -> impl IntoResponse {
    "ok"
}
