//! Conditional caching for the product API.
//!
//! Before a `GET` or `HEAD` reaches its handler, an `If-None-Match` that names
//! the product cache's current generation short-circuits to `304 Not Modified`.
//! Other methods always reach their handler.
//! After the handler, successful responses are annotated:
//!
//! - volatile paths (price data) get `Cache-Control: max-age=<n>` where `n` is
//!   the number of seconds until the next daily price cutover, and no ETag;
//! - everything else must revalidate and carries the generation as its ETag.
//!
//! Error responses pass through untouched.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderValue, Method, StatusCode,
        header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Days, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use pricetag_core::{Generation, ProductCache};

const REVALIDATE: &str = "no-cache, max-age=0, must-revalidate";

/// Shared state for [`freshness_middleware`].
#[derive(Clone)]
pub struct FreshnessGate {
    cache: Arc<ProductCache>,
    tz: Tz,
    cutover: NaiveTime,
    volatile_path: Arc<str>,
}

impl FreshnessGate {
    pub fn new(cache: Arc<ProductCache>, tz: Tz, cutover: NaiveTime, volatile_path: &str) -> Self {
        Self { cache, tz, cutover, volatile_path: Arc::from(volatile_path) }
    }

    fn is_volatile(&self, path: &str) -> bool {
        path.contains(&*self.volatile_path)
    }

    fn max_age(&self) -> i64 {
        seconds_until_cutover(Utc::now().with_timezone(&self.tz), self.cutover)
    }
}

/// Seconds from `now` until the next occurrence of `cutover` in `now`'s zone.
///
/// A cutover that falls in a DST gap happens at the first valid instant an
/// hour later; an ambiguous one at its earlier instant.
pub fn seconds_until_cutover(now: DateTime<Tz>, cutover: NaiveTime) -> i64 {
    let tz = now.timezone();
    let day = if now.time() < cutover { now.date_naive() } else { now.date_naive() + Days::new(1) };
    let local = day.and_time(cutover);

    let next = tz
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + TimeDelta::hours(1))).earliest());

    next.map_or(0, |next| (next - now).num_seconds().max(0))
}

/// Axum middleware applying the conditional caching rules.
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/products/:code", get(get_product))
///     .route_layer(middleware::from_fn_with_state(gate, freshness_middleware));
/// ```
pub async fn freshness_middleware(State(gate): State<FreshnessGate>, request: Request, next: Next) -> Response {
    let current = gate.cache.generation();
    let safe = matches!(*request.method(), Method::GET | Method::HEAD);
    if safe
        && let Some(validator) = request.headers().get(IF_NONE_MATCH).and_then(|v| v.to_str().ok())
        && current.matches(validator)
    {
        tracing::debug!(path = %request.uri().path(), generation = %current, "validator matches, not modified");
        return not_modified(current);
    }

    let volatile = gate.is_volatile(request.uri().path());
    let mut response = next.run(request).await;

    if !response.status().is_success() {
        return response;
    }

    let headers = response.headers_mut();
    if volatile {
        if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", gate.max_age())) {
            headers.insert(CACHE_CONTROL, value);
        }
    } else {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(REVALIDATE));
        if let Ok(value) = HeaderValue::from_str(&gate.cache.generation().etag()) {
            headers.insert(ETAG, value);
        }
    }

    response
}

fn not_modified(generation: Generation) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    if let Ok(value) = HeaderValue::from_str(&generation.etag()) {
        response.headers_mut().insert(ETAG, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, body::Body, middleware, routing::get};
    use chrono_tz::America::{New_York, Sao_Paulo};
    use pricetag_core::product_cache;
    use tower::ServiceExt;

    fn at(tz: Tz, y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn five() -> NaiveTime {
        NaiveTime::from_hms_opt(5, 0, 0).unwrap()
    }

    #[test]
    fn test_one_second_before_cutover() {
        assert_eq!(seconds_until_cutover(at(Sao_Paulo, 2022, 1, 8, 4, 59, 59), five()), 1);
    }

    #[test]
    fn test_midnight() {
        assert_eq!(seconds_until_cutover(at(Sao_Paulo, 2022, 1, 8, 0, 0, 0), five()), 18_000);
    }

    #[test]
    fn test_at_and_after_cutover_waits_for_tomorrow() {
        assert_eq!(seconds_until_cutover(at(Sao_Paulo, 2022, 1, 8, 5, 0, 0), five()), 86_400);
        assert_eq!(seconds_until_cutover(at(Sao_Paulo, 2022, 1, 8, 23, 0, 0), five()), 6 * 3600);
    }

    #[test]
    fn test_cutover_in_dst_gap() {
        // 02:00 does not exist on 2024-03-10 in New York; clocks jump to 03:00 EDT
        let two = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        assert_eq!(seconds_until_cutover(at(New_York, 2024, 3, 10, 1, 30, 0), two), 1800);
    }

    struct Harness {
        app: Router,
        cache: Arc<ProductCache>,
        calls: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        let cache = Arc::new(product_cache());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = FreshnessGate::new(Arc::clone(&cache), Sao_Paulo, five(), "/api/prices");

        let counted = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "product"
                }
            }
        };

        let app = Router::new()
            .route("/api/products/:code", get(counted.clone()).delete(counted))
            .route("/api/prices/:code", get(|| async { "prices" }))
            .route("/api/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/api/invalid", get(|| async { StatusCode::BAD_REQUEST }))
            .route_layer(middleware::from_fn_with_state(gate, freshness_middleware));

        Harness { app, cache, calls }
    }

    fn get_request(uri: &str, validator: Option<&str>) -> Request {
        request(Method::GET, uri, validator)
    }

    fn request(method: Method, uri: &str, validator: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(validator) = validator {
            builder = builder.header(IF_NONE_MATCH, validator);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_success_carries_generation_etag() {
        let h = harness();

        let response = h.app.oneshot(get_request("/api/products/7891000055120", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_CONTROL], REVALIDATE);
        assert_eq!(response.headers()[ETAG], h.cache.generation().etag().as_str());
    }

    #[tokio::test]
    async fn test_matching_validator_skips_handler() {
        let h = harness();
        let validator = h.cache.generation().etag();

        let response = h.app.oneshot(get_request("/api/products/7891000055120", Some(&validator))).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[ETAG], validator.as_str());
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_matching_validator_on_head_skips_handler() {
        let h = harness();
        let validator = h.cache.generation().etag();

        let response =
            h.app.oneshot(request(Method::HEAD, "/api/products/7891000055120", Some(&validator))).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_matching_validator_does_not_short_circuit_delete() {
        let h = harness();
        let validator = h.cache.generation().etag();

        let response =
            h.app.oneshot(request(Method::DELETE, "/api/products/7891000055120", Some(&validator))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hyphenated_validator_matches() {
        let h = harness();
        let token = h.cache.generation().token();
        let hyphenated = format!(
            "\"{}-{}-{}-{}-{}\"",
            &token[0..8],
            &token[8..12],
            &token[12..16],
            &token[16..20],
            &token[20..32]
        );

        let response = h.app.oneshot(get_request("/api/products/1", Some(&hyphenated))).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_stale_validator_runs_handler() {
        let h = harness();
        let stale = h.cache.generation().etag();
        h.cache.evict_all().await;

        let response = h.app.oneshot(get_request("/api/products/1", Some(&stale))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(response.headers()[ETAG], stale.as_str());
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_volatile_path_gets_max_age_without_etag() {
        let h = harness();

        let response = h.app.oneshot(get_request("/api/prices/7891000055120", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cache_control = response.headers()[CACHE_CONTROL].to_str().unwrap();
        let max_age: i64 = cache_control.strip_prefix("max-age=").unwrap().parse().unwrap();
        assert!((0..=86_400).contains(&max_age));
        assert!(response.headers().get(ETAG).is_none());
    }

    #[tokio::test]
    async fn test_error_responses_are_not_annotated() {
        for uri in ["/api/missing", "/api/invalid"] {
            let h = harness();
            let response = h.app.oneshot(get_request(uri, None)).await.unwrap();

            assert!(response.status().is_client_error());
            assert!(response.headers().get(CACHE_CONTROL).is_none());
            assert!(response.headers().get(ETAG).is_none());
        }
    }
}
