//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all photo-cache-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /cache/summary
    pub async fn get_summary(&self) -> Response {
        self.client
            .get(format!("{}/cache/summary", self.base_url))
            .send()
            .await
            .expect("Summary request failed")
    }

    /// POST /cache/images
    ///
    /// `order` is 1 for oldest first, -1 for newest first.
    pub async fn post_images(&self, order: i64, from: usize, max_images: usize) -> Response {
        self.post_images_body(json!({
            "order": order,
            "from": from,
            "maxImages": max_images,
        }))
        .await
    }

    /// POST /cache/images with a tag filter
    pub async fn post_images_with_tags(
        &self,
        order: i64,
        from: usize,
        max_images: usize,
        tags: &[&str],
    ) -> Response {
        self.post_images_body(json!({
            "order": order,
            "from": from,
            "maxImages": max_images,
            "tags": tags,
        }))
        .await
    }

    /// POST /cache/images with an arbitrary body
    pub async fn post_images_body(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/cache/images", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Images request failed")
    }

    /// GET /cache/{id}
    pub async fn get_thumbnail(&self, id: i64) -> Response {
        self.client
            .get(format!("{}/cache/{}", self.base_url, id))
            .send()
            .await
            .expect("Thumbnail request failed")
    }

    /// GET /raw/{id}.jpg
    pub async fn get_raw(&self, id: i64) -> Response {
        self.get_raw_file(&format!("{}.jpg", id)).await
    }

    /// GET /raw/{file}
    pub async fn get_raw_file(&self, file: &str) -> Response {
        self.client
            .get(format!("{}/raw/{}", self.base_url, file))
            .send()
            .await
            .expect("Raw request failed")
    }
}
