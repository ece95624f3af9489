//! OAuth token lifecycle: authorization-code exchange, refresh, persistence.
//!
//! The manager guarantees that [`TokenManager::access_token`] returns a token
//! with at least [`REFRESH_BUFFER_SECS`] of remaining validity, refreshing
//! transparently when the cached token is about to go stale. Every state
//! change is persisted so the authenticated session survives restarts; the
//! browser consent flow only has to be completed once.

use {
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::{debug, info},
};

use crate::{
    error::TokenError,
    storage::TokenStore,
    types::{OAuthConfig, TokenRecord},
};

/// Refresh this many seconds before the recorded expiry.
pub const REFRESH_BUFFER_SECS: u64 = 300;

/// Fallback lifetime when the server omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Manages Zoho OAuth tokens with automatic refresh.
///
/// Single-instance, single-process: no internal locking. Callers sharing a
/// manager across tasks must serialize access themselves (the gateway wraps
/// it in a `Mutex`); concurrent refreshes race with last-writer-wins.
pub struct TokenManager {
    config: OAuthConfig,
    client: reqwest::Client,
    store: TokenStore,
    record: Option<TokenRecord>,
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenResponse {
    /// Stamp the wire response into a record, deriving `expires_at` from the
    /// receipt wall clock. A refresh response may omit the refresh token, in
    /// which case the previously stored one is carried forward.
    fn into_record(self, prior_refresh_token: Option<String>) -> TokenRecord {
        TokenRecord {
            expires_at: unix_now() + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(prior_refresh_token),
            expires_in: self.expires_in,
            extra: self.extra,
        }
    }
}

impl TokenManager {
    /// Construct against the default store path, loading any persisted
    /// record. A missing or corrupt store is not fatal (see
    /// [`TokenStore::load`]).
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_store(config, TokenStore::new())
    }

    /// Construct against a specific store (useful for testing).
    pub fn with_store(config: OAuthConfig, store: TokenStore) -> Self {
        let record = store.load();
        if record.is_some() {
            debug!(path = %store.path().display(), "loaded persisted tokens");
        }
        Self {
            config,
            client: reqwest::Client::new(),
            store,
            record,
        }
    }

    /// The currently held record, if any.
    pub fn record(&self) -> Option<&TokenRecord> {
        self.record.as_ref()
    }

    fn accounts_server(&self) -> &str {
        self.config.accounts_server.trim_end_matches('/')
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/v2/token", self.accounts_server())
    }

    /// Authorization URL for the initial browser consent flow.
    ///
    /// Pure function of the configuration; no side effects.
    pub fn authorization_url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("scope", &self.config.scope)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("access_type", "offline")
            .finish();
        format!("{}/oauth/v2/auth?{query}", self.accounts_server())
    }

    /// Exchange an authorization code for access and refresh tokens.
    ///
    /// The code comes out-of-band: the user completes the browser consent
    /// flow and the embedding application extracts the `code` query
    /// parameter from the redirect. On success the new record replaces the
    /// in-memory state and is persisted immediately.
    pub async fn exchange_code(&mut self, authorization_code: &str) -> Result<TokenRecord, TokenError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", authorization_code),
        ];

        let response = self.request_tokens(&params).await?;
        self.store_record(response.into_record(None))
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// A rejection here is a hard signal that the refresh token may have
    /// been revoked and the initial flow needs to be redone; this layer does
    /// not distinguish that from a transient server failure.
    pub async fn refresh(&mut self) -> Result<TokenRecord, TokenError> {
        let refresh_token = self
            .record
            .as_ref()
            .and_then(|r| r.refresh_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingRefreshToken)?;

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];

        let response = self.request_tokens(&params).await?;
        self.store_record(response.into_record(Some(refresh_token)))
    }

    /// Return a currently-valid access token, refreshing first when the
    /// cached one is inside the buffer window.
    ///
    /// This is the one capability consumers depend on; they wrap the result
    /// into an `Authorization: Bearer` header.
    pub async fn access_token(&mut self) -> Result<String, TokenError> {
        let expires_at = match self.record.as_ref() {
            Some(r) if !r.access_token.is_empty() => r.expires_at,
            _ => {
                return Err(TokenError::AuthenticationRequired {
                    auth_url: self.authorization_url(),
                });
            },
        };

        if unix_now() >= expires_at.saturating_sub(REFRESH_BUFFER_SECS) {
            info!("access token expired or expiring soon, refreshing");
            return Ok(self.refresh().await?.access_token);
        }

        match self.record.as_ref() {
            Some(r) => Ok(r.access_token.clone()),
            None => Err(TokenError::AuthenticationRequired {
                auth_url: self.authorization_url(),
            }),
        }
    }

    /// Whether a valid (or refreshable) token is available.
    ///
    /// Only the two "not yet authenticated" failures collapse to `false`;
    /// transport, rejection, and persistence failures propagate, since they
    /// signal an environment problem rather than authentication state.
    pub async fn is_authenticated(&mut self) -> Result<bool, TokenError> {
        match self.access_token().await {
            Ok(_) => Ok(true),
            Err(TokenError::AuthenticationRequired { .. } | TokenError::MissingRefreshToken) => {
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> Result<TokenResponse, TokenError> {
        let response = self.client.post(self.token_url()).form(params).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Replace the in-memory record and persist it. The in-memory state is
    /// updated even when the write fails, so the token stays usable for the
    /// current process.
    fn store_record(&mut self, record: TokenRecord) -> Result<TokenRecord, TokenError> {
        self.record = Some(record.clone());
        self.store.save(&record)?;
        Ok(record)
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
