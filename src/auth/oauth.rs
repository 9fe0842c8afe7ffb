use anyhow::{Result, anyhow};
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

use crate::auth::token_store;

/// Label management, read access for classification/sweeping, modify for the
/// sweep itself, and pub/sub consume for the notification poller.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/pubsub",
];

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens returned by the oauth flow (in-memory)
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

fn basic_client(client_id: &str, client_secret: Option<&str>) -> Result<BasicClient> {
    let client_id = ClientId::new(client_id.to_string());
    let client_secret = client_secret.map(|s| ClientSecret::new(s.to_string()));
    Ok(BasicClient::new(
        client_id,
        client_secret,
        AuthUrl::new(AUTH_URL.to_string())?,
        Some(TokenUrl::new(TOKEN_URL.to_string())?),
    ))
}

fn into_tokens(token: impl TokenResponse<oauth2::basic::BasicTokenType>) -> Tokens {
    Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    }
}

/// Exchange a refresh token for a new access token
pub fn refresh_access_token(
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> Result<Tokens> {
    let client = basic_client(client_id, client_secret)?;
    let rt = RefreshToken::new(refresh_token.to_string());
    let token = client.exchange_refresh_token(&rt).request(http_client)?;
    Ok(into_tokens(token))
}

/// Perform Authorization Code + PKCE flow. Opens the system browser and
/// captures the code via a short-lived loopback listener on the redirect
/// port. The refresh token, if granted, is stored in the keyring for
/// `user_email`.
pub fn perform_pkce_flow(
    client_id: &str,
    client_secret: Option<&str>,
    redirect_uri: &str,
    user_email: &str,
) -> Result<Tokens> {
    let client = basic_client(client_id, client_secret)?
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, _csrf_token) = client
        .authorize_url(oauth2::CsrfToken::new_random)
        .add_scopes(SCOPES.iter().map(|s| Scope::new((*s).to_string())))
        .set_pkce_challenge(pkce_challenge)
        .url();

    println!("Opening browser to: {}", auth_url.as_str());
    open::that(auth_url.as_str()).map_err(|e| anyhow!(e))?;

    let code = wait_for_code(redirect_uri)?;

    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
        .map_err(|err| anyhow!("token exchange failed: {err:#?}"))?;

    let tokens = into_tokens(token);

    // best-effort: a missing keyring shouldn't kill a successful flow
    if let Some(refresh) = &tokens.refresh_token {
        if let Err(e) = token_store::save_refresh_token(user_email, refresh) {
            eprintln!("Warning: could not store refresh token in keyring: {e}");
        }
    }

    Ok(tokens)
}

/// Listen on the redirect URI's port until the consent redirect lands or
/// two minutes pass.
fn wait_for_code(redirect_uri: &str) -> Result<String> {
    let parsed = Url::parse(redirect_uri)?;
    let port = parsed
        .port()
        .ok_or_else(|| anyhow!("redirect_uri must carry an explicit port"))?;

    let server = Server::http(("127.0.0.1", port)).map_err(|e| anyhow!(e))?;
    let deadline = Instant::now() + Duration::from_secs(120);

    while Instant::now() < deadline {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        let Some(request) = maybe_request else {
            continue;
        };

        let url = format!("http://localhost{}", request.url());
        let Ok(parsed) = Url::parse(&url) else {
            let _ = request.respond(Response::from_string("Bad redirect"));
            continue;
        };

        let code = parsed
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned());
        let _ = request.respond(Response::from_string(
            "Authorization received. You can close this tab.",
        ));

        if let Some(code) = code {
            return Ok(code);
        }
    }

    Err(anyhow!("no authorization code received"))
}
