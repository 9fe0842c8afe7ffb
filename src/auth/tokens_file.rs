use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::config;

/// Non-secret access-token metadata cached on disk, one record per account
/// (the notification payload names the account, so lookups are per email).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TokensFile {
    #[serde(default)]
    pub accounts: BTreeMap<String, CachedToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at_epoch: i64, // epoch seconds
}

fn tokens_path() -> Result<PathBuf> {
    Ok(config::data_dir()?.join("tokens.json"))
}

pub fn load() -> Result<TokensFile> {
    let p = tokens_path()?;
    if !p.exists() {
        return Ok(TokensFile::default());
    }
    let s = fs::read_to_string(&p)?;
    Ok(serde_json::from_str(&s)?)
}

pub fn load_token(email: &str) -> Result<Option<CachedToken>> {
    Ok(load()?.accounts.get(email).cloned())
}

pub fn save_token(email: &str, token: CachedToken) -> Result<()> {
    let mut file = load()?;
    file.accounts.insert(email.to_string(), token);
    fs::write(tokens_path()?, serde_json::to_string_pretty(&file)?)?;
    Ok(())
}

pub fn forget_token(email: &str) -> Result<()> {
    let mut file = load()?;
    if file.accounts.remove(email).is_some() {
        fs::write(tokens_path()?, serde_json::to_string_pretty(&file)?)?;
    }
    Ok(())
}
