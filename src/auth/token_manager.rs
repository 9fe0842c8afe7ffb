use anyhow::{Result, anyhow};
use log::debug;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{oauth, token_store, tokens_file};
use crate::config::Config;

/// Hands out valid access tokens, per account: cached token if unexpired,
/// otherwise a refresh-token exchange. Never starts an interactive flow on
/// its own; a notification for an account with no stored refresh token is
/// an error telling the operator to run the auth command.
#[derive(Clone)]
pub struct TokenManager {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_secret = token_store::load_client_secret(&cfg.client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());

        Ok(Self {
            client_id: cfg.client_id.clone(),
            client_secret,
            redirect_uri: cfg.redirect_uri(),
        })
    }

    /// Valid access token for `email`, refreshing if the cached one expired.
    pub fn access_token_for(&self, email: &str) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        if let Some(cached) = tokens_file::load_token(email)? {
            if now < cached.expires_at_epoch {
                return Ok(cached.access_token);
            }
            debug!("cached access token for {email} expired");
        }

        let Some(refresh_token) = token_store::load_refresh_token(email)? else {
            return Err(anyhow!(
                "no stored credentials for {email}; run the `auth` command first"
            ));
        };

        let t = oauth::refresh_access_token(
            &self.client_id,
            self.client_secret.as_deref(),
            &refresh_token,
        )?;
        self.cache(email, &t, now)?;
        Ok(t.access_token)
    }

    /// Run the interactive consent flow for `email` and cache the result.
    pub fn authorize_interactive(&self, email: &str) -> Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
        let t = oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
            email,
        )?;
        self.cache(email, &t, now)?;
        Ok(())
    }

    fn cache(&self, email: &str, tokens: &oauth::Tokens, now: i64) -> Result<()> {
        match tokens.expires_in {
            Some(expires_in) => tokens_file::save_token(
                email,
                tokens_file::CachedToken {
                    access_token: tokens.access_token.clone(),
                    // a minute of slack so we never hand out a token that
                    // dies mid-invocation
                    expires_at_epoch: now + expires_in as i64 - 60,
                },
            ),
            None => tokens_file::forget_token(email),
        }
    }
}
