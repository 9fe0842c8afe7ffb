use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::domain::message::{Label, LabelChange, Message, MessageQuery, MessageRef};
use crate::mail::gateway::{GatewayError, MailboxGateway};

const BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail REST implementation of the gateway, authenticated with a bearer
/// access token. One instance per invocation; the token is expected to
/// outlive the handful of calls a single notification needs.
pub struct GmailClient {
    http: Client,
    access_token: String,
    base: String,
}

impl GmailClient {
    pub fn new(access_token: &str) -> Self {
        Self {
            http: Client::new(),
            access_token: access_token.to_string(),
            base: BASE.to_string(),
        }
    }

    /// Point the client at a different endpoint (tests, API emulators).
    pub fn with_base(access_token: &str, base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            access_token: access_token.to_string(),
            base: base.into(),
        }
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response, GatewayError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()?;
        check_status(resp)
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, GatewayError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()?;
        check_status(resp)
    }

    fn post_empty(&self, path: &str) -> Result<Response, GatewayError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .bearer_auth(&self.access_token)
            .send()?;
        check_status(resp)
    }
}

fn check_status(resp: Response) -> Result<Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::CONFLICT => Err(GatewayError::Conflict),
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
        _ => Err(GatewayError::Api {
            status: status.as_u16(),
            message: api_error_message(resp),
        }),
    }
}

/// Best-effort extraction of `error.message` from a Gmail error body.
fn api_error_message(resp: Response) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let raw = resp.text().unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&raw) {
        Ok(body) => body.error.message,
        Err(_) => raw,
    }
}

// ---- wire types ----

#[derive(Deserialize)]
struct MessageListWire {
    #[serde(default)]
    messages: Option<Vec<MessageRefWire>>,
}

#[derive(Deserialize)]
struct MessageRefWire {
    id: String,
}

#[derive(Deserialize)]
struct MessageWire {
    id: String,
    #[serde(rename = "labelIds", default)]
    label_ids: Vec<String>,
    #[serde(default)]
    payload: Option<PayloadWire>,
}

#[derive(Deserialize)]
struct PayloadWire {
    #[serde(default)]
    headers: Vec<HeaderWire>,
}

#[derive(Deserialize)]
struct HeaderWire {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct ModifyBody<'a> {
    #[serde(rename = "addLabelIds")]
    add_label_ids: &'a [String],
    #[serde(rename = "removeLabelIds")]
    remove_label_ids: &'a [String],
}

#[derive(Serialize)]
struct BatchModifyBody<'a> {
    ids: &'a [String],
    #[serde(rename = "addLabelIds")]
    add_label_ids: &'a [String],
    #[serde(rename = "removeLabelIds")]
    remove_label_ids: &'a [String],
}

#[derive(Serialize)]
struct CreateLabelBody<'a> {
    name: &'a str,
    // keep the sentinel out of the label sidebar but show labeled mail
    #[serde(rename = "labelListVisibility")]
    label_list_visibility: &'a str,
    #[serde(rename = "messageListVisibility")]
    message_list_visibility: &'a str,
}

#[derive(Deserialize)]
struct LabelWire {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct LabelListWire {
    #[serde(default)]
    labels: Vec<LabelWire>,
}

#[derive(Serialize)]
struct WatchBody<'a> {
    #[serde(rename = "topicName")]
    topic_name: &'a str,
    #[serde(rename = "labelIds")]
    label_ids: &'a [String],
}

impl MailboxGateway for GmailClient {
    fn list_messages(&self, query: &MessageQuery) -> Result<Vec<MessageRef>, GatewayError> {
        let mut params: Vec<(&str, String)> =
            vec![("maxResults", query.max_results.to_string())];
        if let Some(sender) = &query.sender {
            params.push(("q", format!("from:{sender}")));
        }
        for label_id in &query.label_ids {
            params.push(("labelIds", label_id.clone()));
        }

        let list: MessageListWire = self.get("/messages", &params)?.json()?;
        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageRef { id: m.id })
            .collect())
    }

    fn get_message(&self, id: &str) -> Result<Message, GatewayError> {
        let wire: MessageWire = self
            .get(
                &format!("/messages/{id}"),
                &[
                    ("format", "metadata".to_string()),
                    ("metadataHeaders", "From".to_string()),
                ],
            )?
            .json()?;

        let from = wire.payload.and_then(|p| {
            p.headers
                .into_iter()
                .find(|h| h.name.eq_ignore_ascii_case("From"))
                .map(|h| h.value)
        });

        Ok(Message {
            id: wire.id,
            from,
            label_ids: wire.label_ids,
        })
    }

    fn modify_message(&self, id: &str, change: &LabelChange) -> Result<(), GatewayError> {
        self.post_json(
            &format!("/messages/{id}/modify"),
            &ModifyBody {
                add_label_ids: &change.add,
                remove_label_ids: &change.remove,
            },
        )?;
        Ok(())
    }

    fn batch_modify(&self, ids: &[String], change: &LabelChange) -> Result<(), GatewayError> {
        self.post_json(
            "/messages/batchModify",
            &BatchModifyBody {
                ids,
                add_label_ids: &change.add,
                remove_label_ids: &change.remove,
            },
        )?;
        Ok(())
    }

    fn create_label(&self, name: &str) -> Result<Label, GatewayError> {
        let wire: LabelWire = self
            .post_json(
                "/labels",
                &CreateLabelBody {
                    name,
                    label_list_visibility: "labelHide",
                    message_list_visibility: "show",
                },
            )?
            .json()?;
        Ok(Label {
            id: wire.id,
            name: wire.name,
        })
    }

    fn list_labels(&self) -> Result<Vec<Label>, GatewayError> {
        let list: LabelListWire = self.get("/labels", &[])?.json()?;
        Ok(list
            .labels
            .into_iter()
            .map(|l| Label {
                id: l.id,
                name: l.name,
            })
            .collect())
    }

    fn register_watch(&self, topic: &str, label_ids: &[String]) -> Result<(), GatewayError> {
        self.post_json(
            "/watch",
            &WatchBody {
                topic_name: topic,
                label_ids,
            },
        )?;
        Ok(())
    }

    fn cancel_watches(&self) -> Result<(), GatewayError> {
        self.post_empty("/stop")?;
        Ok(())
    }
}
