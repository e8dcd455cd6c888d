//! Request rate limiting middleware.
//!
//! Fixed-window limiting keyed by client address, applied to the login
//! endpoint. Denied requests get `429` with `Retry-After` plus both the
//! draft-standard `RateLimit-*` headers and the legacy `X-RateLimit-*`
//! aliases; allowed requests carry the same quota headers so clients can
//! pace themselves.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use authgate_cache::RateLimitDecision;

use crate::state::AppState;

/// Axum middleware limiting login attempts per client address.
///
/// Wire with `axum::middleware::from_fn_with_state` on the routes that take
/// credentials. The limiter itself fails open, so a store outage never locks
/// anyone out.
pub async fn login_rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.rate_limit.enabled {
        return next.run(request).await;
    }

    let identifier = client_identifier(&request);
    let decision = state
        .rate_limiter
        .check(
            &identifier,
            state.rate_limit.login_window,
            state.rate_limit.login_max_requests,
        )
        .await;

    if !decision.allowed {
        tracing::warn!(client = %identifier, "login rate limit exceeded");
        return rate_limited_response(&decision);
    }

    let mut response = next.run(request).await;
    apply_quota_headers(response.headers_mut(), &decision);
    response
}

/// Client identity for the rate limit key: the first `X-Forwarded-For` hop
/// when present (proxy deployments), otherwise the peer address.
fn client_identifier(request: &Request<Body>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty())
    {
        return format!("ip:{forwarded}");
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

fn rate_limited_response(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.reset_after.as_secs().max(1);
    let body = json!({
        "error": "rate_limited",
        "message": "Too many requests, slow down",
        "retry_after": retry_after,
    });

    let mut response =
        (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, header_value(retry_after));
    apply_quota_headers(headers, decision);
    response
}

fn apply_quota_headers(headers: &mut axum::http::HeaderMap, decision: &RateLimitDecision) {
    let reset = decision.reset_after.as_secs();
    headers.insert("RateLimit-Limit", header_value(u64::from(decision.limit)));
    headers.insert(
        "RateLimit-Remaining",
        header_value(u64::from(decision.remaining)),
    );
    headers.insert("RateLimit-Reset", header_value(reset));
    headers.insert(
        "X-RateLimit-Limit",
        header_value(u64::from(decision.limit)),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        header_value(u64::from(decision.remaining)),
    );
    headers.insert("X-RateLimit-Reset", header_value(reset));
}

fn header_value(value: u64) -> HeaderValue {
    // Formatting an integer always yields a valid header value.
    HeaderValue::from_str(&value.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}
