//! OAuth 2.0 authorization-code grant with PKCE.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use url::Url;

use crate::api::DeviantArtApi;
use crate::auth::credential::Credential;
use crate::auth::pkce::{random_token, PkcePair};
use crate::auth::receiver::{AuthorizationResponse, CodeReceiver};
use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// Progress of one authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    AwaitingUserAuthorization,
    CodeReceived,
    TokenExchanged,
    Complete,
    Failed,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::AwaitingUserAuthorization => write!(f, "awaiting user authorization"),
            FlowState::CodeReceived => write!(f, "code received"),
            FlowState::TokenExchanged => write!(f, "token exchanged"),
            FlowState::Complete => write!(f, "complete"),
            FlowState::Failed => write!(f, "failed"),
        }
    }
}

/// One authorization attempt.
///
/// Any failure is terminal: a new attempt needs a new flow (fresh PKCE pair
/// and state token).
pub struct AuthorizationFlow<'a> {
    api: &'a DeviantArtApi,
    oauth: &'a OAuthConfig,
    pkce: PkcePair,
    csrf_token: String,
    timeout: Duration,
    state: FlowState,
}

impl<'a> AuthorizationFlow<'a> {
    pub fn new(api: &'a DeviantArtApi, oauth: &'a OAuthConfig, timeout: Duration) -> Self {
        Self {
            api,
            oauth,
            pkce: PkcePair::generate(),
            csrf_token: random_token(16),
            timeout,
            state: FlowState::AwaitingUserAuthorization,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// URL the user has to open to approve the application.
    pub fn authorization_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/authorize", self.api.auth_base()))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.oauth.client_id)
            .append_pair("redirect_uri", &self.oauth.redirect_uri)
            .append_pair("scope", &self.oauth.scopes.join(" "))
            .append_pair("state", &self.csrf_token)
            .append_pair("code_challenge", &self.pkce.challenge)
            .append_pair("code_challenge_method", "S256");
        Ok(url)
    }

    /// Drive the flow to completion.
    pub async fn run(&mut self, receiver: &dyn CodeReceiver) -> Result<Credential> {
        if self.state != FlowState::AwaitingUserAuthorization {
            return Err(Error::AuthProtocolError(format!(
                "Authorization flow already {}",
                self.state
            )));
        }

        let result = self.drive(receiver).await;
        if let Err(e) = &result {
            tracing::warn!("Authorization failed: {}", e);
            self.transition(FlowState::Failed);
        }
        result
    }

    async fn drive(&mut self, receiver: &dyn CodeReceiver) -> Result<Credential> {
        let url = self.authorization_url()?;

        let response = tokio::time::timeout(self.timeout, receiver.receive(&url))
            .await
            .map_err(|_| {
                Error::AuthProtocolError(format!(
                    "No authorization received within {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        let code = self.accept(response)?;
        self.transition(FlowState::CodeReceived);

        let token = self
            .api
            .exchange_code(self.oauth, &code, &self.pkce.verifier)
            .await?;
        self.transition(FlowState::TokenExchanged);

        let credential =
            Credential::from_token_response(token, Utc::now(), &self.oauth.scopes, None)?;
        self.transition(FlowState::Complete);

        Ok(credential)
    }

    /// Check the redirect parameters and extract the code.
    fn accept(&self, response: AuthorizationResponse) -> Result<String> {
        if let Some(error) = response.error {
            let detail = response
                .error_description
                .map(|d| format!("{} ({})", d, error))
                .unwrap_or_else(|| error.clone());
            return if error == "access_denied" {
                Err(Error::AuthDenied(detail))
            } else {
                Err(Error::AuthProtocolError(detail))
            };
        }

        // A pasted bare code carries no state; a redirect must carry ours.
        if let Some(state) = response.state {
            if state != self.csrf_token {
                return Err(Error::AuthProtocolError(
                    "State parameter does not match this authorization request".into(),
                ));
            }
        }

        match response.code {
            Some(code) if !code.is_empty() && !code.chars().any(char::is_whitespace) => Ok(code),
            Some(_) => Err(Error::AuthProtocolError(
                "Malformed authorization code".into(),
            )),
            None => Err(Error::AuthProtocolError(
                "Redirect did not include an authorization code".into(),
            )),
        }
    }

    fn transition(&mut self, next: FlowState) {
        tracing::debug!("Authorization flow: {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RateLimiter;
    use crate::auth::receiver::StaticCodeReceiver;
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

    #[test]
    fn test_authorization_url() {
        let api = api("https://www.example.com");
        let oauth = oauth();
        let flow = AuthorizationFlow::new(&api, &oauth, Duration::from_secs(5));

        let url = flow.authorization_url().unwrap();
        assert_eq!(url.path(), "/oauth2/authorize");

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "1234");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8080/callback");
        assert_eq!(pairs["scope"], "user browse");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["code_challenge"], flow.pkce.challenge);
        assert_eq!(pairs["state"], flow.csrf_token);
    }

    #[tokio::test]
    async fn test_successful_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=good-code"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600,
                "scope": "browse user"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server.uri());
        let oauth = oauth();
        let mut flow = AuthorizationFlow::new(&api, &oauth, Duration::from_secs(5));
        let receiver = StaticCodeReceiver::new(AuthorizationResponse {
            code: Some("good-code".into()),
            state: Some(flow.csrf_token.clone()),
            ..Default::default()
        });

        let credential = flow.run(&receiver).await.unwrap();
        assert_eq!(credential.access_token, "access-1");
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(flow.state(), FlowState::Complete);
    }

    #[tokio::test]
    async fn test_user_denied() {
        let api = api("http://127.0.0.1:9");
        let oauth = oauth();
        let mut flow = AuthorizationFlow::new(&api, &oauth, Duration::from_secs(5));
        let receiver = StaticCodeReceiver::new(AuthorizationResponse {
            error: Some("access_denied".into()),
            ..Default::default()
        });

        let err = flow.run(&receiver).await.unwrap_err();
        assert!(matches!(err, Error::AuthDenied(_)));
        assert_eq!(flow.state(), FlowState::Failed);

        // A failed flow cannot be resumed.
        let err = flow.run(&receiver).await.unwrap_err();
        assert!(matches!(err, Error::AuthProtocolError(_)));
    }

    #[tokio::test]
    async fn test_state_mismatch() {
        let api = api("http://127.0.0.1:9");
        let oauth = oauth();
        let mut flow = AuthorizationFlow::new(&api, &oauth, Duration::from_secs(5));
        let receiver = StaticCodeReceiver::new(AuthorizationResponse {
            code: Some("code".into()),
            state: Some("forged".into()),
            ..Default::default()
        });

        assert!(matches!(
            flow.run(&receiver).await,
            Err(Error::AuthProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_code() {
        let api = api("http://127.0.0.1:9");
        let oauth = oauth();
        let mut flow = AuthorizationFlow::new(&api, &oauth, Duration::from_secs(5));
        let receiver = StaticCodeReceiver::new(AuthorizationResponse::default());

        assert!(matches!(
            flow.run(&receiver).await,
            Err(Error::AuthProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_token_endpoint_rejects_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Code expired"
            })))
            .mount(&server)
            .await;

        let api = api(&server.uri());
        let oauth = oauth();
        let mut flow = AuthorizationFlow::new(&api, &oauth, Duration::from_secs(5));
        let receiver = StaticCodeReceiver::new(AuthorizationResponse::with_code("stale"));

        let err = flow.run(&receiver).await.unwrap_err();
        assert!(matches!(err, Error::AuthProtocolError(ref m) if m.contains("Code expired")));
        assert_eq!(flow.state(), FlowState::Failed);
    }

    struct NeverReceiver;

    #[async_trait::async_trait]
    impl CodeReceiver for NeverReceiver {
        async fn receive(&self, _url: &Url) -> Result<AuthorizationResponse> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_timeout() {
        let api = api("http://127.0.0.1:9");
        let oauth = oauth();
        let mut flow = AuthorizationFlow::new(&api, &oauth, Duration::from_secs(300));

        let err = flow.run(&NeverReceiver).await.unwrap_err();
        assert!(matches!(err, Error::AuthProtocolError(_)));
        assert_eq!(flow.state(), FlowState::Failed);
    }
}
