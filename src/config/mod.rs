//! Configuration module for deviantart-favorites.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Defaults for pacing, retries and token handling
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{
    Config, EndpointsConfig, OAuthConfig, OptionsConfig, DEFAULT_API_BASE, DEFAULT_AUTH_BASE,
    MAX_PAGE_LIMIT,
};
pub use validation::{validate_config, validate_redirect_uri, validate_username};
