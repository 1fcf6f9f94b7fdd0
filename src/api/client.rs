//! DeviantArt API HTTP client.

use std::time::Duration;

use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::throttle::RateLimiter;
use crate::api::types::*;
use crate::config::{EndpointsConfig, OAuthConfig};
use crate::error::{Error, Result};

/// User agent sent with every request.
const USER_AGENT: &str = "DeviantArt-Favorites-Downloader/1.0";

/// Time allowed to establish a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default longest wait for the next piece of a response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of response body characters kept in error messages.
const BODY_EXCERPT_LEN: usize = 500;

/// DeviantArt API client.
///
/// Owns the single outbound HTTP connection pool together with the rate
/// limiter that paces it: every token, API and media request waits for a
/// slot before it is sent.
pub struct DeviantArtApi {
    client: Client,
    auth_base: String,
    api_base: String,
    limiter: RateLimiter,
}

impl DeviantArtApi {
    /// Create a new API client with the default read timeout.
    pub fn new(endpoints: &EndpointsConfig, limiter: RateLimiter) -> Result<Self> {
        Self::with_read_timeout(endpoints, limiter, DEFAULT_READ_TIMEOUT)
    }

    /// Create a new API client.
    ///
    /// `read_timeout` bounds every wait for response data, so a host that
    /// stops sending fails the request instead of stalling the run. It is
    /// not a limit on the total transfer time.
    pub fn with_read_timeout(
        endpoints: &EndpointsConfig,
        limiter: RateLimiter,
        read_timeout: Duration,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth_base: endpoints.auth_base.trim_end_matches('/').to_string(),
            api_base: endpoints.api_base.trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// Base URL of the authorization server.
    pub fn auth_base(&self) -> &str {
        &self.auth_base
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(
        &self,
        oauth: &OAuthConfig,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse> {
        self.post_token(&[
            ("grant_type", "authorization_code"),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_token(
        &self,
        oauth: &OAuthConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        self.post_token(&[
            ("grant_type", "refresh_token"),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// POST to the token endpoint.
    ///
    /// Every failure is reported as an authorization error: the caller
    /// decides whether it means a denied grant or an expired session.
    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = format!("{}/token", self.auth_base);
        self.limiter.acquire().await;

        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::AuthProtocolError(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::AuthProtocolError(format!("Failed to read token response: {}", e)))?;
        tracing::debug!("Token endpoint status: {}", status);

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<OAuthErrorResponse>(&text) {
                if err.error == "access_denied" {
                    return Err(Error::AuthDenied(err.describe()));
                }
                return Err(Error::AuthProtocolError(format!(
                    "Token endpoint returned HTTP {}: {}",
                    status,
                    err.describe()
                )));
            }
            return Err(Error::AuthProtocolError(format!(
                "Token endpoint returned HTTP {}: {}",
                status,
                excerpt(&text)
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            Error::AuthProtocolError(format!(
                "Failed to parse token response: {} - Response: {}",
                e,
                excerpt(&text)
            ))
        })?;

        if token.access_token.as_deref().map_or(true, str::is_empty) {
            return Err(Error::AuthProtocolError(
                "Token response did not contain an access token".into(),
            ));
        }

        Ok(token)
    }

    /// Make an authenticated GET request against the API.
    async fn get(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<Response> {
        let url = format!("{}{}", self.api_base, path);
        self.limiter.acquire().await;

        tracing::debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AuthExpired(format!(
                "HTTP 401: {}",
                if body.is_empty() {
                    "access token rejected".to_string()
                } else {
                    excerpt(&body)
                }
            )));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(Error::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::fetch(Some(status.as_u16()), excerpt(&body)));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.get(path, access_token, query).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            Error::fetch(
                None,
                format!(
                    "Failed to parse {} response: {} - Response: {}",
                    path,
                    e,
                    excerpt(&text)
                ),
            )
        })
    }

    /// Get the authenticated user (validates the token).
    pub async fn whoami(&self, access_token: &str) -> Result<UserInfo> {
        self.get_json("/user/whoami", access_token, &[]).await
    }

    /// Get one page of a user's favourites.
    pub async fn get_collection_page(
        &self,
        access_token: &str,
        username: &str,
        offset: u32,
        limit: u32,
        mature_content: bool,
    ) -> Result<CollectionPage> {
        let query = [
            ("username", username.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
            ("mature_content", mature_content.to_string()),
        ];

        let page: CollectionPage = self
            .get_json("/collections/all", access_token, &query)
            .await?;
        tracing::debug!(
            "Collection page at offset {}: {} results, has_more={}",
            offset,
            page.results.len(),
            page.has_more
        );

        Ok(page)
    }

    /// Start downloading a media file.
    ///
    /// Media hosts do not take the bearer token, so none is sent.
    pub async fn download_file(&self, url: &str) -> Result<Response> {
        self.limiter.acquire().await;

        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT_LEN).collect()
}
