use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "only_latest";

fn read_entry(account: &str) -> Result<Option<String>> {
    match Entry::new(SERVICE, account)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

fn write_entry(account: &str, value: &str) -> Result<()> {
    Entry::new(SERVICE, account)?
        .set_password(value)
        .map_err(|e| anyhow!(e.to_string()))
}

/// Refresh tokens live in the OS keyring, one entry per mailbox account.
pub fn save_refresh_token(email: &str, refresh_token: &str) -> Result<()> {
    write_entry(email, refresh_token)
}

pub fn load_refresh_token(email: &str) -> Result<Option<String>> {
    read_entry(email)
}

/// The OAuth client secret is keyed by client id so several configs can
/// share one registration.
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    write_entry(client_id, client_secret)
}

pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    read_entry(client_id)
}
