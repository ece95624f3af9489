use {
    secrecy::SecretString,
    serde::{Deserialize, Serialize},
};

/// OAuth 2.0 client identity for the Zoho accounts server.
///
/// Built once at the application edge (CLI or gateway startup) and never
/// mutated; the token manager reads nothing from the process environment.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Must match the redirect URI registered with the Zoho app.
    pub redirect_uri: String,
    pub scope: String,
    /// Accounts server base URL, e.g. `https://accounts.zoho.com`.
    pub accounts_server: String,
}

/// Persisted OAuth token state.
///
/// Fields the server returns beyond the ones modeled here (token type,
/// scope, api_domain, …) land in `extra` and round-trip through persistence
/// unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds as reported by the server at issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Unix timestamp when the access token expires. Stamped from the wall
    /// clock at receipt; the only expiry representation consulted at runtime.
    pub expires_at: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
