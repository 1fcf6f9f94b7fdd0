//! Token lifecycle: load, acquire, persist, refresh.

use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::api::retry::into_fetch_error;
use crate::api::{is_transient, retry_after, DeviantArtApi, RetryPolicy};
use crate::auth::credential::Credential;
use crate::auth::flow::AuthorizationFlow;
use crate::auth::receiver::CodeReceiver;
use crate::auth::store::TokenStore;
use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// Default remaining lifetime below which the access token is refreshed.
const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

/// Default wait for the user to complete authorization.
const DEFAULT_AUTHORIZATION_TIMEOUT: StdDuration = StdDuration::from_secs(300);

/// Owns the credential for a run and keeps it valid.
pub struct TokenManager<S: TokenStore> {
    store: S,
    oauth: OAuthConfig,
    refresh_margin: Duration,
    authorization_timeout: StdDuration,
    current: Option<Credential>,
    rejected: bool,
}

impl<S: TokenStore> TokenManager<S> {
    pub fn new(store: S, oauth: OAuthConfig) -> Self {
        Self {
            store,
            oauth,
            refresh_margin: Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
            authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            current: None,
            rejected: false,
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_authorization_timeout(mut self, timeout: StdDuration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// Forget the credential, both in memory and persisted.
    pub fn reset(&mut self) -> Result<()> {
        self.current = None;
        self.rejected = false;
        self.store.clear()
    }

    /// Return a usable credential, running the authorization flow if needed.
    ///
    /// A persisted credential is reused as is when it is not close to
    /// expiry, and refreshed when it is. If nothing usable was persisted the
    /// user is asked to authorize the application again.
    pub async fn load_or_acquire(
        &mut self,
        api: &DeviantArtApi,
        receiver: &dyn CodeReceiver,
    ) -> Result<Credential> {
        if let Some(persisted) = self.load_persisted()? {
            if !persisted.expires_within(self.refresh_margin, Utc::now()) {
                tracing::info!("Using saved credential (expires {})", persisted.expires_at);
                self.current = Some(persisted.clone());
                return Ok(persisted);
            }

            if persisted.can_refresh() {
                tracing::info!("Saved access token is expiring, refreshing");
                match self.refresh(api, &persisted).await {
                    Ok(credential) => return Ok(credential),
                    Err(e) => {
                        tracing::warn!("Token refresh failed, authorization required: {}", e);
                        self.invalidate();
                    }
                }
            } else {
                tracing::info!("Saved access token expired and cannot be refreshed");
                self.invalidate();
            }
        }

        let mut flow = AuthorizationFlow::new(api, &self.oauth, self.authorization_timeout);
        let credential = flow.run(receiver).await?;

        self.store.save(&credential)?;
        self.current = Some(credential.clone());
        self.rejected = false;
        tracing::info!("Authorization complete (expires {})", credential.expires_at);

        Ok(credential)
    }

    /// Return the current credential, refreshing it once if it is within the
    /// refresh margin or was rejected by the API.
    ///
    /// A failed refresh clears the persisted credential and yields
    /// `AuthExpired`; the next run has to authorize again.
    pub async fn ensure_valid(&mut self, api: &DeviantArtApi) -> Result<Credential> {
        let credential = match self.current.clone() {
            Some(credential) => credential,
            None => self.load_persisted()?.ok_or_else(|| {
                Error::AuthExpired("No credential available, authorization required".into())
            })?,
        };

        if !self.rejected && !credential.expires_within(self.refresh_margin, Utc::now()) {
            self.current = Some(credential.clone());
            return Ok(credential);
        }

        if !credential.can_refresh() {
            self.invalidate();
            return Err(Error::AuthExpired(
                "Access token expired and no refresh token is available".into(),
            ));
        }

        match self.refresh(api, &credential).await {
            Ok(credential) => Ok(credential),
            Err(e) => {
                self.invalidate();
                Err(Error::AuthExpired(format!("Token refresh failed: {}", e)))
            }
        }
    }

    /// Record that the API answered 401 to the current access token.
    pub fn mark_rejected(&mut self) {
        tracing::debug!("Access token rejected by the API");
        self.rejected = true;
    }

    /// Run an API request with the current access token.
    ///
    /// A 401 marks the token rejected and repeats the request once with a
    /// refreshed token; a second 401 is `AuthExpired`. Rate limiting, server
    /// errors and transport failures are retried per `retry`. Anything else
    /// ends as a `FetchError` describing `what`.
    pub async fn authorized<T, F, Fut>(
        &mut self,
        api: &DeviantArtApi,
        retry: &RetryPolicy,
        what: &str,
        mut request: F,
    ) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut reauthorized = false;

        loop {
            attempt += 1;
            let credential = self.ensure_valid(api).await?;

            match request(credential.access_token).await {
                Ok(value) => return Ok(value),
                Err(Error::AuthExpired(detail)) if !reauthorized => {
                    tracing::info!("Access token rejected ({}), refreshing", detail);
                    reauthorized = true;
                    attempt -= 1;
                    self.mark_rejected();
                }
                Err(e @ Error::AuthExpired(_)) => return Err(e),
                Err(e) if is_transient(&e) && retry.should_retry(attempt) => {
                    let delay = retry.delay_for(attempt, retry_after(&e));
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        what,
                        attempt,
                        retry.max_attempts(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(into_fetch_error(e, what, attempt)),
            }
        }
    }

    async fn refresh(&mut self, api: &DeviantArtApi, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::AuthExpired("No refresh token".into()))?;

        let response = api.refresh_token(&self.oauth, refresh_token).await?;
        let refreshed = Credential::from_token_response(
            response,
            Utc::now(),
            &credential.scopes,
            Some(refresh_token),
        )?;

        self.store.save(&refreshed)?;
        self.current = Some(refreshed.clone());
        self.rejected = false;
        tracing::info!("Access token refreshed (expires {})", refreshed.expires_at);

        Ok(refreshed)
    }

    /// Read the store, treating a corrupt document as absent.
    fn load_persisted(&self) -> Result<Option<Credential>> {
        match self.store.load() {
            Ok(credential) => Ok(credential),
            Err(Error::Credential(msg)) => {
                tracing::warn!("Ignoring saved credential: {}", msg);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn invalidate(&mut self) {
        self.current = None;
        self.rejected = false;
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear saved credential: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RateLimiter;
    use crate::auth::receiver::{AuthorizationResponse, StaticCodeReceiver};
    use crate::auth::store::MemoryTokenStore;
    use crate::config::EndpointsConfig;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth() -> OAuthConfig {
        OAuthConfig {
            client_id: "1234".into(),
            client_secret: "secret-secret-secret".into(),
            redirect_uri: "http://localhost:8080/callback".into(),
            scopes: vec!["user".into(), "browse".into()],
        }
    }

    fn api(server_uri: &str) -> DeviantArtApi {
        DeviantArtApi::new(
            &EndpointsConfig {
                auth_base: format!("{}/oauth2", server_uri),
                api_base: format!("{}/api/v1/oauth2", server_uri),
            },
            RateLimiter::disabled(),
        )
        .unwrap()
    }

    fn credential(access: &str, expires_in_secs: i64) -> Credential {
        Credential {
            access_token: access.into(),
            refresh_token: Some("refresh-old".into()),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scopes: vec!["user".into(), "browse".into()],
        }
    }

    async fn mount_refresh(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "access_token": "access-new",
                "refresh_token": "refresh-new",
                "expires_in": 3600
            })))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_expiring_credential_refreshed_once() {
        let server = MockServer::start().await;
        mount_refresh(&server, 1).await;

        let api = api(&server.uri());
        let store = MemoryTokenStore::with_credential(credential("access-old", 30));
        let mut manager = TokenManager::new(store, oauth());

        let refreshed = manager.ensure_valid(&api).await.unwrap();
        assert_eq!(refreshed.access_token, "access-new");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-new"));
        assert!(!refreshed.is_expired_at(Utc::now()));
        assert_eq!(manager.store().save_count(), 1);

        // Fresh now: no second refresh.
        let again = manager.ensure_valid(&api).await.unwrap();
        assert_eq!(again.access_token, "access-new");
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Refresh token revoked"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server.uri());
        let store = MemoryTokenStore::with_credential(credential("access-old", 10));
        let mut manager = TokenManager::new(store, oauth());

        let err = manager.ensure_valid(&api).await.unwrap_err();
        assert!(matches!(err, Error::AuthExpired(_)));
        assert!(manager.store().load().unwrap().is_none());
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn test_fresh_credential_used_without_network() {
        let api = api("http://127.0.0.1:9");
        let store = MemoryTokenStore::with_credential(credential("access-ok", 3600));
        let mut manager = TokenManager::new(store, oauth());
        let receiver = StaticCodeReceiver::new(AuthorizationResponse::default());

        let credential = manager.load_or_acquire(&api, &receiver).await.unwrap();
        assert_eq!(credential.access_token, "access-ok");
        assert_eq!(manager.store().save_count(), 0);
    }

    #[tokio::test]
    async fn test_authorized_retries_transient_errors() {
        let api = api("http://127.0.0.1:9");
        let store = MemoryTokenStore::with_credential(credential("access-ok", 3600));
        let mut manager = TokenManager::new(store, oauth());
        let retry = RetryPolicy::new(3, StdDuration::ZERO, StdDuration::ZERO);
        let calls = std::cell::Cell::new(0);

        let value = manager
            .authorized(&api, &retry, "Test request", |token| {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    assert_eq!(token, "access-ok");
                    if attempt < 3 {
                        Err(Error::fetch(Some(503), "busy"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 3);

        let err = manager
            .authorized(&api, &retry, "Test request", |_| async {
                Err::<(), _>(Error::fetch(Some(404), "missing"))
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FetchError { status: Some(404), ref detail } if detail == "Test request: missing"
        ));
    }

    #[tokio::test]
    async fn test_rejected_token_forces_refresh() {
        let server = MockServer::start().await;
        mount_refresh(&server, 1).await;

        let api = api(&server.uri());
        let store = MemoryTokenStore::with_credential(credential("access-old", 3600));
        let mut manager = TokenManager::new(store, oauth());

        assert_eq!(
            manager.ensure_valid(&api).await.unwrap().access_token,
            "access-old"
        );

        manager.mark_rejected();
        assert_eq!(
            manager.ensure_valid(&api).await.unwrap().access_token,
            "access-new"
        );
    }

    #[tokio::test]
    async fn test_acquires_when_nothing_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-fresh",
                "refresh_token": "refresh-fresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server.uri());
        let mut manager = TokenManager::new(MemoryTokenStore::new(), oauth());
        let receiver = StaticCodeReceiver::new(AuthorizationResponse::with_code("pasted"));

        let credential = manager.load_or_acquire(&api, &receiver).await.unwrap();
        assert_eq!(credential.access_token, "access-fresh");
        assert_eq!(manager.store().save_count(), 1);
        assert_eq!(
            manager.store().load().unwrap().unwrap().access_token,
            "access-fresh"
        );
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_reauthorizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-fresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server.uri());
        let mut stale = credential("access-old", -10);
        stale.refresh_token = None;
        let mut manager = TokenManager::new(MemoryTokenStore::with_credential(stale), oauth());
        let receiver = StaticCodeReceiver::new(AuthorizationResponse::with_code("pasted"));

        let credential = manager.load_or_acquire(&api, &receiver).await.unwrap();
        assert_eq!(credential.access_token, "access-fresh");
    }
}
