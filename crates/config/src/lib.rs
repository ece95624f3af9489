//! Environment-derived settings.
//!
//! `.env` loading happens once in the binary entry point (via dotenvy);
//! library code only ever sees the immutable snapshot captured here. In
//! particular the token manager receives an explicit [`OAuthConfig`] and
//! never reads ambient process state itself.

use {anyhow::bail, secrecy::SecretString};

use crmlink_oauth::OAuthConfig;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/oauth/callback";
pub const DEFAULT_SCOPE: &str = "ZohoCRM.modules.ALL";
pub const DEFAULT_ACCOUNTS_SERVER: &str = "https://accounts.zoho.com";

/// Snapshot of the process environment, taken at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Streamable-HTTP MCP endpoint exposing the CRM tools (`ZOHO_MCP_URL`).
    pub mcp_url: Option<String>,
    /// Google Generative AI key (`GOOGLE_API_KEY`).
    pub google_api_key: Option<SecretString>,
    /// Zoho OAuth client credentials (`ZOHO_CLIENT_ID` / `ZOHO_CLIENT_SECRET`).
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    /// `ZOHO_REDIRECT_URI`; must match the Zoho app configuration.
    pub redirect_uri: String,
    /// `ZOHO_SCOPE`.
    pub scope: String,
    /// `ZOHO_ACCOUNTS_SERVER`.
    pub accounts_server: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            mcp_url: env_var("ZOHO_MCP_URL"),
            google_api_key: env_var("GOOGLE_API_KEY").map(SecretString::new),
            client_id: env_var("ZOHO_CLIENT_ID"),
            client_secret: env_var("ZOHO_CLIENT_SECRET").map(SecretString::new),
            redirect_uri: env_var("ZOHO_REDIRECT_URI")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.into()),
            scope: env_var("ZOHO_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.into()),
            accounts_server: env_var("ZOHO_ACCOUNTS_SERVER")
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_SERVER.into()),
        }
    }

    /// Fail fast on missing chat prerequisites, naming every absent variable.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut missing = Vec::new();
        if self.mcp_url.is_none() {
            missing.push("ZOHO_MCP_URL");
        }
        if self.google_api_key.is_none() {
            missing.push("GOOGLE_API_KEY");
        }
        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {}. Ensure they are set in your shell or .env file.",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// Fail fast on missing OAuth credentials, naming every absent variable.
    pub fn validate_oauth(&self) -> anyhow::Result<()> {
        let mut missing = Vec::new();
        if self.client_id.is_none() {
            missing.push("ZOHO_CLIENT_ID");
        }
        if self.client_secret.is_none() {
            missing.push("ZOHO_CLIENT_SECRET");
        }
        if !missing.is_empty() {
            bail!(
                "missing required OAuth environment variables: {}. These are needed for automatic token refresh.",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// OAuth client identity, when client credentials are configured.
    ///
    /// `None` means the agent runs without bearer-token authentication.
    pub fn oauth_config(&self) -> Option<OAuthConfig> {
        Some(OAuthConfig {
            client_id: self.client_id.clone()?,
            client_secret: self.client_secret.clone()?,
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
            accounts_server: self.accounts_server.clone(),
        })
    }
}

/// Read a variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_settings() -> Settings {
        Settings {
            mcp_url: None,
            google_api_key: None,
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            scope: DEFAULT_SCOPE.into(),
            accounts_server: DEFAULT_ACCOUNTS_SERVER.into(),
        }
    }

    #[test]
    fn validate_names_every_missing_variable() {
        let err = empty_settings().validate().unwrap_err().to_string();
        assert!(err.contains("ZOHO_MCP_URL"));
        assert!(err.contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn validate_oauth_names_every_missing_variable() {
        let err = empty_settings().validate_oauth().unwrap_err().to_string();
        assert!(err.contains("ZOHO_CLIENT_ID"));
        assert!(err.contains("ZOHO_CLIENT_SECRET"));
    }

    #[test]
    fn oauth_config_requires_both_credentials() {
        let mut settings = empty_settings();
        assert!(settings.oauth_config().is_none());

        settings.client_id = Some("abc".into());
        assert!(settings.oauth_config().is_none());

        settings.client_secret = Some(SecretString::new("xyz".into()));
        let config = settings.oauth_config().unwrap();
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.scope, DEFAULT_SCOPE);
        assert_eq!(config.accounts_server, DEFAULT_ACCOUNTS_SERVER);
    }

    #[test]
    fn validate_passes_when_prerequisites_are_present() {
        let mut settings = empty_settings();
        settings.mcp_url = Some("https://example.test/mcp".into());
        settings.google_api_key = Some(SecretString::new("key".into()));
        assert!(settings.validate().is_ok());
    }
}
