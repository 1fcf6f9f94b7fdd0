//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use wiremock::MockServer;

use deviantart_favorites::api::{DeviantArtApi, RateLimiter, RetryPolicy};
use deviantart_favorites::auth::{Credential, MemoryTokenStore, TokenManager};
use deviantart_favorites::config::{Config, EndpointsConfig, OAuthConfig};

pub const COLLECTION_PATH: &str = "/api/v1/oauth2/collections/all";
pub const TOKEN_PATH: &str = "/oauth2/token";
pub const WHOAMI_PATH: &str = "/api/v1/oauth2/user/whoami";

pub fn oauth() -> OAuthConfig {
    OAuthConfig {
        client_id: "1234".into(),
        client_secret: "0123456789abcdef0123".into(),
        redirect_uri: "http://localhost:8080/callback".into(),
        scopes: vec!["user".into(), "browse".into()],
    }
}

pub fn endpoints(server: &MockServer) -> EndpointsConfig {
    EndpointsConfig {
        auth_base: format!("{}/oauth2", server.uri()),
        api_base: format!("{}/api/v1/oauth2", server.uri()),
    }
}

pub fn api(server: &MockServer) -> DeviantArtApi {
    DeviantArtApi::new(&endpoints(server), RateLimiter::disabled()).unwrap()
}

/// Retries without waiting.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        std::time::Duration::ZERO,
        std::time::Duration::ZERO,
    )
}

/// Configuration pointing at the mock server, with no pacing or backoff.
pub fn config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.oauth = oauth();
    config.endpoints = endpoints(server);
    config.options.username = Some("collector".into());
    config.options.request_interval_ms = 0;
    config.options.request_jitter_ms = 0;
    config.options.backoff_base_ms = 0;
    config.options.backoff_max_ms = 0;
    config.options.show_progress = false;
    config
}

pub fn credential(access: &str, expires_in_secs: i64) -> Credential {
    Credential {
        access_token: access.into(),
        refresh_token: Some("refresh-old".into()),
        expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        scopes: vec!["user".into(), "browse".into()],
    }
}

pub fn tokens(access: &str) -> TokenManager<MemoryTokenStore> {
    TokenManager::new(
        MemoryTokenStore::with_credential(credential(access, 3600)),
        oauth(),
    )
}

/// A deviation whose full-resolution content lives at `src`.
pub fn deviation(id: &str, title: &str, src: &str) -> Value {
    json!({
        "deviationid": id,
        "title": title,
        "author": {"userid": "U1", "username": "artist"},
        "content": {"src": src, "width": 1920, "height": 1080},
        "preview": {"src": format!("{}-preview.jpg", src), "width": 800, "height": 450}
    })
}

/// A deviation with no downloadable representation (a literature piece).
pub fn text_deviation(id: &str, title: &str) -> Value {
    json!({
        "deviationid": id,
        "title": title,
        "author": {"userid": "U1", "username": "writer"},
        "excerpt": "Once upon a time"
    })
}

pub fn page(results: Vec<Value>, has_more: bool, next_offset: Option<u32>) -> Value {
    json!({
        "has_more": has_more,
        "next_offset": next_offset,
        "results": results
    })
}
