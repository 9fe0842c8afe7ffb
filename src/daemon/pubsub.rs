use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

const BASE: &str = "https://pubsub.googleapis.com/v1";

/// A message pulled off the subscription: the opaque data (still base64,
/// decoded at the dispatcher boundary) plus the ack id to settle it with.
#[derive(Debug)]
pub struct PulledMessage {
    pub ack_id: String,
    pub data: String,
}

/// Minimal Pub/Sub REST consumer for one subscription. Pull + acknowledge
/// is all the poller needs; subscription management stays with the project
/// owner's tooling.
pub struct PubSubClient {
    http: Client,
    access_token: String,
    subscription: String,
}

#[derive(Serialize)]
struct PullBody {
    #[serde(rename = "maxMessages")]
    max_messages: u32,
}

#[derive(Deserialize)]
struct PullResponse {
    #[serde(rename = "receivedMessages", default)]
    received: Vec<ReceivedWire>,
}

#[derive(Deserialize)]
struct ReceivedWire {
    #[serde(rename = "ackId")]
    ack_id: String,
    message: PubSubMessageWire,
}

#[derive(Deserialize)]
struct PubSubMessageWire {
    #[serde(default)]
    data: String,
}

#[derive(Serialize)]
struct AckBody<'a> {
    #[serde(rename = "ackIds")]
    ack_ids: &'a [String],
}

impl PubSubClient {
    pub fn new(access_token: &str, subscription: &str) -> Self {
        Self {
            http: Client::new(),
            access_token: access_token.to_string(),
            subscription: subscription.to_string(),
        }
    }

    /// Synchronous pull; returns however many messages the server had
    /// ready, possibly none.
    pub fn pull(&self, max_messages: u32) -> Result<Vec<PulledMessage>> {
        let resp = self
            .http
            .post(format!("{BASE}/{}:pull", self.subscription))
            .bearer_auth(&self.access_token)
            .json(&PullBody { max_messages })
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!(
                "pull failed (status {status}): {}",
                resp.text().unwrap_or_default()
            ));
        }

        let body: PullResponse = resp.json()?;
        Ok(body
            .received
            .into_iter()
            .map(|r| PulledMessage {
                ack_id: r.ack_id,
                data: r.message.data,
            })
            .collect())
    }

    pub fn acknowledge(&self, ack_ids: &[String]) -> Result<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }

        let resp = self
            .http
            .post(format!("{BASE}/{}:acknowledge", self.subscription))
            .bearer_auth(&self.access_token)
            .json(&AckBody { ack_ids })
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!(
                "ack failed (status {status}): {}",
                resp.text().unwrap_or_default()
            ));
        }
        Ok(())
    }
}
