use thiserror::Error;

/// Failures surfaced by the token lifecycle manager.
///
/// None of these are retried at this layer; retry policy, if any, belongs to
/// the caller.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No usable token exists; the browser consent flow has to be completed.
    #[error(
        "no access token available. Complete the OAuth flow:\n\
         1. Visit: {auth_url}\n\
         2. Authorize the application\n\
         3. Copy the full redirect URL (it contains a 'code' parameter)\n\
         4. Run `crmlink auth setup` and paste it when prompted"
    )]
    AuthenticationRequired { auth_url: String },

    /// A refresh was attempted with no refresh token on record.
    #[error("no refresh token available; run the initial OAuth flow first")]
    MissingRefreshToken,

    /// The token endpoint answered with a non-success status. The stored
    /// refresh token may have been revoked; the initial flow likely needs to
    /// be redone.
    #[error("token endpoint rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The token request failed at the transport level.
    #[error("token endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint returned a body that is not valid JSON.
    #[error("token endpoint returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The token store could not be written. The in-memory token is still
    /// usable for this process but will not survive a restart.
    #[error("failed to save tokens: {0}")]
    Persistence(#[from] std::io::Error),
}
