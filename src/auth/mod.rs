//! OAuth authorization and token lifecycle.
//!
//! This module provides:
//! - The persisted credential and its store
//! - The authorization-code flow with PKCE
//! - Receivers capturing the authorization code
//! - The token manager that keeps the credential valid during a run

pub mod credential;
pub mod flow;
pub mod manager;
pub mod pkce;
pub mod receiver;
pub mod store;

pub use credential::Credential;
pub use flow::{AuthorizationFlow, FlowState};
pub use manager::TokenManager;
pub use pkce::PkcePair;
pub use receiver::{
    AuthorizationResponse, CodeReceiver, LocalCallbackReceiver, ManualCodeReceiver,
    StaticCodeReceiver,
};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
