//! Configuration validation logic.

use regex::Regex;
use url::Url;

use crate::config::loader::{Config, MAX_PAGE_LIMIT};
use crate::error::{Error, Result};

/// Minimum length for the client secret.
const MIN_SECRET_LENGTH: usize = 16;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_client_id(&config.oauth.client_id)?;
    validate_client_secret(&config.oauth.client_secret)?;
    validate_redirect_uri(&config.oauth.redirect_uri)?;

    if config.oauth.scopes.is_empty() {
        return Err(Error::MissingConfig("scopes".to_string()));
    }

    if let Some(username) = &config.options.username {
        validate_username(username)?;
    }

    if config.options.page_limit == 0 || config.options.page_limit > MAX_PAGE_LIMIT {
        return Err(Error::ConfigValidation {
            field: "page_limit".to_string(),
            message: format!(
                "Page limit must be between 1 and {} (got {})",
                MAX_PAGE_LIMIT, config.options.page_limit
            ),
        });
    }

    if config.options.max_attempts == 0 {
        return Err(Error::ConfigValidation {
            field: "max_attempts".to_string(),
            message: "At least one attempt is required".to_string(),
        });
    }

    if config.options.read_timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            field: "read_timeout_secs".to_string(),
            message: "Read timeout must be at least one second".to_string(),
        });
    }

    Url::parse(&config.endpoints.auth_base)?;
    Url::parse(&config.endpoints.api_base)?;

    Ok(())
}

/// Validate the OAuth client ID.
pub fn validate_client_id(client_id: &str) -> Result<()> {
    if client_id.is_empty() {
        return Err(Error::MissingConfig("client_id".to_string()));
    }

    if !client_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::ConfigValidation {
            field: "client_id".to_string(),
            message: format!("Client ID must be numeric (got '{}')", client_id),
        });
    }

    Ok(())
}

/// Validate the OAuth client secret.
pub fn validate_client_secret(secret: &str) -> Result<()> {
    if secret.is_empty() {
        return Err(Error::MissingConfig("client_secret".to_string()));
    }

    let lower = secret.to_lowercase();
    if lower.contains("replaceme") || lower.contains("your_secret") {
        return Err(Error::ConfigValidation {
            field: "client_secret".to_string(),
            message: "Client secret appears to be a placeholder. Copy it from the developer page."
                .to_string(),
        });
    }

    if secret.len() < MIN_SECRET_LENGTH {
        return Err(Error::ConfigValidation {
            field: "client_secret".to_string(),
            message: format!(
                "Client secret must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                secret.len()
            ),
        });
    }

    Ok(())
}

/// Validate the redirect URI and return it parsed.
pub fn validate_redirect_uri(redirect_uri: &str) -> Result<Url> {
    let url = Url::parse(redirect_uri).map_err(|e| Error::ConfigValidation {
        field: "redirect_uri".to_string(),
        message: format!("'{}' is not a valid URL: {}", redirect_uri, e),
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::ConfigValidation {
            field: "redirect_uri".to_string(),
            message: format!("'{}' must be an http(s) URL with a host", redirect_uri),
        });
    }

    Ok(url)
}

/// Validate a DeviantArt username.
pub fn validate_username(username: &str) -> Result<()> {
    // 3-20 chars, alphanumeric and hyphens
    let username_pattern = Regex::new(r"^[A-Za-z0-9-]{3,20}$").unwrap();

    if !username_pattern.is_match(username) {
        return Err(Error::ConfigValidation {
            field: "username".to_string(),
            message: format!(
                "Username '{}' must be 3-20 characters of letters, digits and hyphens",
                username
            ),
        });
    }

    Ok(())
}
