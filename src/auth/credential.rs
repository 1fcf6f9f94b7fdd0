//! OAuth credential representation.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::TokenResponse;
use crate::error::{Error, Result};

/// Access token lifetime assumed when the server does not state one.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// An access/refresh token pair with its expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    pub expires_at: DateTime<Utc>,

    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Build a credential from a token endpoint response received at `now`.
    ///
    /// Granted scopes fall back to the requested ones, and the refresh token
    /// falls back to `previous_refresh` when the server does not rotate it.
    pub fn from_token_response(
        response: TokenResponse,
        now: DateTime<Utc>,
        requested_scopes: &[String],
        previous_refresh: Option<&str>,
    ) -> Result<Self> {
        let access_token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::AuthProtocolError("Token response did not contain an access token".into())
            })?;

        let expires_in = response
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        let scopes = match response.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => requested_scopes.to_vec(),
        };

        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string));

        Ok(Self {
            access_token,
            refresh_token,
            expires_at: now + Duration::seconds(expires_in),
            scopes,
        })
    }

    /// Whether the access token is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether less than `margin` of validity remains at `now`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - now < margin
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}
