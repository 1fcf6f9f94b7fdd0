//! Capturing the authorization code after the user approves the application.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use url::Url;

use crate::error::{Error, Result};
use crate::output::{print_info, print_warning};

/// How long the callback server may take to close its connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const RECEIVED_PAGE: &str = "<!DOCTYPE html><html><body><p>Authorization received. \
     You can close this tab and return to the terminal.</p></body></html>";

const DENIED_PAGE: &str = "<!DOCTYPE html><html><body><p>Authorization was not granted. \
     You can close this tab.</p></body></html>";

/// Parameters the authorization server attaches to the redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl AuthorizationResponse {
    /// A response carrying only a code.
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Default::default()
        }
    }

    /// Pick the known parameters out of decoded query pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut response = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "code" => &mut response.code,
                "state" => &mut response.state,
                "error" => &mut response.error,
                "error_description" => &mut response.error_description,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        response
    }

    /// Read the redirect's query parameters.
    pub fn from_redirect(url: &Url) -> Self {
        Self::from_pairs(url.query_pairs())
    }

    /// Interpret user input: either the full redirected URL or the bare code.
    pub fn from_user_input(input: &str) -> Self {
        let input = input.trim();
        match Url::parse(input) {
            Ok(url) if url.query().is_some() => Self::from_redirect(&url),
            _ => Self::with_code(input),
        }
    }
}

/// Surfaces the authorization URL to the user and waits for the result.
#[async_trait]
pub trait CodeReceiver: Send + Sync {
    async fn receive(&self, authorization_url: &Url) -> Result<AuthorizationResponse>;
}

/// Serves the redirect URI's path on its host and port until the browser
/// comes back with the authorization response.
pub struct LocalCallbackReceiver {
    redirect_uri: Url,
    listener: Mutex<Option<TcpListener>>,
}

#[derive(Clone)]
struct CallbackState {
    sender: Arc<Mutex<Option<oneshot::Sender<AuthorizationResponse>>>>,
}

impl LocalCallbackReceiver {
    /// Create a receiver that binds its listener only when a code is needed.
    pub fn new(redirect_uri: Url) -> Self {
        Self {
            redirect_uri,
            listener: Mutex::new(None),
        }
    }

    /// Create a receiver with its listener bound immediately.
    pub async fn bind(redirect_uri: Url) -> Result<Self> {
        let listener = bind_listener(&redirect_uri).await?;
        Ok(Self {
            redirect_uri,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Address of the bound listener, if any.
    pub async fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener
            .lock()
            .await
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }

    fn router(&self, sender: oneshot::Sender<AuthorizationResponse>) -> Result<Router> {
        let path = self.redirect_uri.path();
        if path.contains(['{', '}', '*', ':']) {
            return Err(Error::ConfigValidation {
                field: "redirect_uri".to_string(),
                message: format!("Unsupported characters in redirect path '{}'", path),
            });
        }

        let state = CallbackState {
            sender: Arc::new(Mutex::new(Some(sender))),
        };
        Ok(Router::new().route(path, get(callback)).with_state(state))
    }
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let response = AuthorizationResponse::from_pairs(params);
    let page = if response.error.is_some() {
        DENIED_PAGE
    } else {
        RECEIVED_PAGE
    };

    match state.sender.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(response);
        }
        None => tracing::debug!("Repeated redirect ignored"),
    }

    Html(page)
}

#[async_trait]
impl CodeReceiver for LocalCallbackReceiver {
    async fn receive(&self, authorization_url: &Url) -> Result<AuthorizationResponse> {
        let bound = self.listener.lock().await.take();
        let listener = match bound {
            Some(listener) => listener,
            None => bind_listener(&self.redirect_uri).await?,
        };

        let (response_tx, response_rx) = oneshot::channel();
        let router = self.router(response_tx)?;

        // Dropping `shutdown_tx`, including when this future is cancelled,
        // stops the server.
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                    tracing::debug!("Callback server shutting down");
                })
                .await
        });

        print_info("Open this URL in your browser to authorize the application:");
        println!("{}", authorization_url);
        print_info(&format!("Waiting for the redirect to {} ...", self.redirect_uri));

        let response = response_rx.await.map_err(|_| {
            Error::AuthProtocolError("Callback server stopped before the redirect arrived".into())
        });

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::debug!("Callback server failed: {}", e),
            Ok(Err(e)) => tracing::debug!("Callback server task failed: {}", e),
            Err(_) => tracing::debug!("Callback server did not shut down in time"),
        }

        response
    }
}

async fn bind_listener(redirect_uri: &Url) -> Result<TcpListener> {
    let host = redirect_uri.host_str().ok_or_else(|| {
        Error::ConfigValidation {
            field: "redirect_uri".to_string(),
            message: format!("'{}' has no host", redirect_uri),
        }
    })?;
    let port = redirect_uri.port_or_known_default().unwrap_or(80);

    let listener = TcpListener::bind((host, port)).await.map_err(|e| {
        Error::AuthProtocolError(format!(
            "Cannot listen on {}:{} for the OAuth redirect: {}",
            host, port, e
        ))
    })?;
    tracing::debug!("Callback listener bound to {:?}", listener.local_addr());
    Ok(listener)
}

/// Asks the user to paste the code (or the redirected URL) into the terminal.
#[derive(Debug, Default)]
pub struct ManualCodeReceiver;

#[async_trait]
impl CodeReceiver for ManualCodeReceiver {
    async fn receive(&self, authorization_url: &Url) -> Result<AuthorizationResponse> {
        print_info("Open this URL in your browser to authorize the application:");
        println!("{}", authorization_url);
        print_info("After approving, paste the 'code' parameter (or the whole redirected URL):");

        let mut stdin = BufReader::new(tokio::io::stdin());
        loop {
            let mut line = String::new();
            if stdin.read_line(&mut line).await? == 0 {
                return Err(Error::AuthDenied(
                    "No authorization code entered".to_string(),
                ));
            }

            if line.trim().is_empty() {
                print_warning("Authorization code cannot be empty");
                continue;
            }

            return Ok(AuthorizationResponse::from_user_input(&line));
        }
    }
}

/// Returns a fixed response without user interaction.
#[derive(Debug, Clone)]
pub struct StaticCodeReceiver {
    response: AuthorizationResponse,
}

impl StaticCodeReceiver {
    pub fn new(response: AuthorizationResponse) -> Self {
        Self { response }
    }
}

#[async_trait]
impl CodeReceiver for StaticCodeReceiver {
    async fn receive(&self, _authorization_url: &Url) -> Result<AuthorizationResponse> {
        Ok(self.response.clone())
    }
}
