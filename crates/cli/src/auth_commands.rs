use std::io::Write;

use {
    anyhow::{Context, Result},
    clap::Subcommand,
};

use {
    crmlink_config::Settings,
    crmlink_oauth::{TokenManager, TokenStore},
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Run the one-time OAuth consent flow.
    Setup,
    /// Show authentication status.
    Status,
    /// Delete stored tokens.
    Logout,
}

pub async fn handle_auth(settings: Settings, action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Setup => setup(settings).await,
        AuthAction::Status => status(settings),
        AuthAction::Logout => logout(),
    }
}

async fn setup(settings: Settings) -> Result<()> {
    println!("Zoho OAuth Setup - one-time authentication\n");

    settings.validate_oauth()?;
    let config = settings
        .oauth_config()
        .context("OAuth credentials are not configured")?;
    let mut manager = TokenManager::new(config);

    if manager.is_authenticated().await? {
        println!("You are already authenticated!");
        println!("Tokens are stored and will automatically refresh.");
        return Ok(());
    }

    let auth_url = manager.authorization_url();
    println!("Step 1: Authorize the application");
    println!("{}", "-".repeat(60));
    println!("Visit this URL in your browser:\n\n{auth_url}\n");
    if open::that(&auth_url).is_ok() {
        println!("(Opened it in your default browser.)");
    }
    println!("After authorizing, you will be redirected to your redirect URI.");
    println!("Copy the full redirect URL (including the 'code' parameter).\n");

    print!("Paste the full redirect URL here: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    let code = extract_code(line.trim()).with_context(|| {
        format!(
            "could not extract an authorization code; the redirect URL should look like \
             {}?code=YOUR_AUTHORIZATION_CODE",
            settings.redirect_uri
        )
    })?;

    println!("\nStep 2: Exchanging authorization code for tokens...");
    println!("{}", "-".repeat(60));
    let record = manager.exchange_code(&code).await?;

    println!("Successfully obtained tokens!");
    println!(
        "  - Access token expires in: {} seconds",
        record
            .expires_in
            .map_or_else(|| "unknown".into(), |s| s.to_string())
    );
    println!(
        "  - Refresh token obtained: {}",
        if record.refresh_token.is_some() { "Yes" } else { "No" }
    );
    println!("\nTokens have been saved and will automatically refresh.");
    println!("You will not need to run this setup again.");
    Ok(())
}

/// Accepts a full redirect URL or a bare authorization code.
fn extract_code(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }

    if let Ok(url) = url::Url::parse(input) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned());
    }

    // Not a URL: treat the input as the code itself.
    (!input.contains(char::is_whitespace)).then(|| input.to_string())
}

fn status(settings: Settings) -> Result<()> {
    let Some(config) = settings.oauth_config() else {
        println!("OAuth is not configured (set ZOHO_CLIENT_ID and ZOHO_CLIENT_SECRET).");
        return Ok(());
    };

    let manager = TokenManager::new(config);
    match manager.record() {
        None => println!("Not authenticated. Run `crmlink auth setup`."),
        Some(record) => {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());
            if record.expires_at > now {
                let remaining = record.expires_at - now;
                let hours = remaining / 3600;
                let mins = (remaining % 3600) / 60;
                println!("Authenticated [valid ({hours}h {mins}m remaining)]");
            } else if record.refresh_token.is_some() {
                println!("Access token expired; it will refresh on next use.");
            } else {
                println!(
                    "Access token expired and no refresh token is stored. Run `crmlink auth setup`."
                );
            }
        },
    }
    Ok(())
}

fn logout() -> Result<()> {
    TokenStore::new().delete()?;
    println!("Logged out; stored tokens deleted.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_full_redirect_url() {
        let code = extract_code(
            "http://localhost:8080/oauth/callback?code=1000.abc.def&location=us&accounts-server=https%3A%2F%2Faccounts.zoho.com",
        );
        assert_eq!(code.as_deref(), Some("1000.abc.def"));
    }

    #[test]
    fn accepts_a_bare_code() {
        assert_eq!(extract_code("1000.abc.def").as_deref(), Some("1000.abc.def"));
    }

    #[test]
    fn rejects_url_without_code_parameter() {
        assert_eq!(extract_code("http://localhost:8080/oauth/callback?error=denied"), None);
    }

    #[test]
    fn rejects_empty_and_whitespace_input() {
        assert_eq!(extract_code(""), None);
        assert_eq!(extract_code("not a code"), None);
    }
}
