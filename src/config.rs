use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_LABEL: &str = "OnlyTheLatest";
const DEFAULT_REDIRECT: &str = "http://127.0.0.1:8080/callback";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub user_email: String,
    /// Pub/Sub topic the Gmail watch publishes to,
    /// e.g. `projects/<project>/topics/<topic>`.
    pub topic: String,
    /// Pub/Sub subscription the poller pulls from,
    /// e.g. `projects/<project>/subscriptions/<sub>`.
    pub subscription: String,
    pub redirect_uri: Option<String>,
    /// Sentinel label marking managed senders' visible message.
    pub label_name: Option<String>,
}

impl Config {
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIRECT.to_string())
    }

    pub fn label_name(&self) -> String {
        self.label_name
            .clone()
            .unwrap_or_else(|| DEFAULT_LABEL.to_string())
    }
}

pub fn data_dir() -> Result<PathBuf> {
    let p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("only_latest");
    fs::create_dir_all(&p)?;
    Ok(p)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            user_email: "you@example.com".to_string(),
            topic: "projects/your-project/topics/new-mail".to_string(),
            subscription: "projects/your-project/subscriptions/new-mail-pull".to_string(),
            redirect_uri: Some(DEFAULT_REDIRECT.to_string()),
            label_name: Some(DEFAULT_LABEL.to_string()),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {} — edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let cfg: Config = toml::from_str(
            r#"
            client_id = "abc.apps.googleusercontent.com"
            user_email = "me@example.com"
            topic = "projects/p/topics/t"
            subscription = "projects/p/subscriptions/s"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.label_name(), DEFAULT_LABEL);
        assert_eq!(cfg.redirect_uri(), "http://127.0.0.1:8080/callback");
    }
}
