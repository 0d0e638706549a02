//! HTTP caching middleware

use axum::http::header;
use axum::{body::Body, extract::State, http::Request, middleware::Next, response::IntoResponse};

pub async fn http_cache(
    State(max_age_sec): State<usize>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let response = next.run(request).await.into_response();

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = format!("max-age={}", max_age_sec).parse() {
        parts.headers.insert(header::CACHE_CONTROL, value);
    }

    axum::http::Response::from_parts(parts, body)
}
