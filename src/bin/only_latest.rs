use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use only_latest::auth::{token_manager::TokenManager, token_store};
use only_latest::config::load_config;
use only_latest::daemon::{PollerConfig, run_poller};
use only_latest::dispatch;
use only_latest::labels::LabelDirectory;
use only_latest::mail::gmail::GmailClient;
use only_latest::watch::init_watch;

#[derive(Parser)]
#[command(name = "only_latest")]
#[command(about = "Keep only the latest message per labeled sender", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the interactive OAuth consent flow for the configured account
    Auth,

    /// Create the sentinel label and (re)register the inbox watch
    InitWatch,

    /// Poll the Pub/Sub subscription and process notifications
    Listen {
        /// Seconds to sleep when the subscription is empty
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Messages to pull per request
        #[arg(long, default_value_t = 10)]
        max: u32,
    },

    /// Process a single base64 notification payload (argument or stdin)
    Process { payload: Option<String> },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Auth => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let tokens = TokenManager::from_config(&cfg)?;
            tokens.authorize_interactive(&cfg.user_email)?;
            println!("Authorized {}", cfg.user_email);
            Ok(())
        }

        Command::InitWatch => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let tokens = TokenManager::from_config(&cfg)?;
            let access = tokens.access_token_for(&cfg.user_email)?;
            let gateway = GmailClient::new(&access);
            let directory = LabelDirectory::new(cfg.label_name());
            init_watch(&gateway, &directory, &cfg.topic)?;
            println!("Watch initialized");
            Ok(())
        }

        Command::Listen { interval, max } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            run_poller(
                &cfg,
                PollerConfig {
                    interval_secs: interval,
                    max_messages: max,
                },
            )
        }

        Command::Process { payload } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let data = match payload {
                Some(p) => p,
                None => {
                    let mut buf = String::new();
                    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)?;
                    buf.trim().to_string()
                }
            };

            let tokens = TokenManager::from_config(&cfg)?;
            let directory = LabelDirectory::new(cfg.label_name());
            let outcome = dispatch::handle_payload(&tokens, &directory, &data)?;
            dispatch::log_outcome(&outcome);
            println!("{outcome:?}");
            Ok(())
        }
    }
}
