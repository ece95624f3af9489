pub mod error;
pub mod manager;
pub mod storage;
pub mod types;

pub use {
    error::TokenError,
    manager::{REFRESH_BUFFER_SECS, TokenManager},
    storage::TokenStore,
    types::{OAuthConfig, TokenRecord},
};
