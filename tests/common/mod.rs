//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_summary() {
//!     let server = TestServer::spawn().await;
//!     server.ingest().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.get_summary().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

// Not every test binary uses every helper.
#![allow(dead_code)]

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
