pub mod pubsub;

use anyhow::Result;
use log::{error, warn};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use crate::auth::token_manager::TokenManager;
use crate::config::Config;
use crate::daemon::pubsub::PubSubClient;
use crate::dispatch;
use crate::labels::LabelDirectory;

pub struct PollerConfig {
    pub interval_secs: u64,
    pub max_messages: u32,
}

/// Pull notifications off the subscription and run each through the
/// dispatcher until Ctrl-C. Every pulled message is acknowledged, whatever
/// its outcome: redelivery is the upstream retry mechanism, and a
/// reprocessed notification converges to the same mailbox state anyway.
/// Only pull/ack transport failures back off and try again.
pub fn run_poller(cfg: &Config, poll: PollerConfig) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    let token_mgr = TokenManager::from_config(cfg)?;
    let directory = LabelDirectory::new(cfg.label_name());

    while running.load(Ordering::SeqCst) {
        let access = match token_mgr.access_token_for(&cfg.user_email) {
            Ok(t) => t,
            Err(e) => {
                error!("token error: {e:#}");
                thread::sleep(Duration::from_secs(poll.interval_secs));
                continue;
            }
        };

        let client = PubSubClient::new(&access, &cfg.subscription);
        let pulled = match client.pull(poll.max_messages) {
            Ok(msgs) => msgs,
            Err(e) => {
                warn!("pull failed, backing off: {e}");
                thread::sleep(Duration::from_secs(poll.interval_secs));
                continue;
            }
        };

        let mut ack_ids = Vec::with_capacity(pulled.len());
        for msg in pulled {
            match dispatch::handle_payload(&token_mgr, &directory, &msg.data) {
                Ok(outcome) => dispatch::log_outcome(&outcome),
                Err(e) => error!("notification processing failed: {e:#}"),
            }
            ack_ids.push(msg.ack_id);
        }

        if let Err(e) = client.acknowledge(&ack_ids) {
            warn!("ack failed, messages will be redelivered: {e}");
        }

        if ack_ids.is_empty() {
            thread::sleep(Duration::from_secs(poll.interval_secs));
        }
    }

    Ok(())
}
