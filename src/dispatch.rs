use base64::Engine as _;
use base64::engine::general_purpose;
use log::{debug, info};
use serde::Deserialize;

use crate::auth::token_manager::TokenManager;
use crate::domain::message::{INBOX, MessageQuery};
use crate::engine::{InvariantEngine, Outcome, SkipReason};
use crate::error::Error;
use crate::labels::LabelDirectory;
use crate::mail::gateway::MailboxGateway;
use crate::mail::gmail::GmailClient;

/// Decoded push-notification payload. Gmail publishes
/// `{"emailAddress": "...", "historyId": ...}` as base64 message data.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Notification {
    #[serde(rename = "emailAddress")]
    pub email_address: String,
    #[serde(rename = "historyId", default)]
    pub history_id: Option<u64>,
}

/// Decode raw notification data: base64 (standard or url-safe alphabet,
/// the transports differ) wrapping a JSON object.
pub fn decode_notification(data: &str) -> Result<Notification, Error> {
    let bytes = general_purpose::STANDARD
        .decode(data)
        .or_else(|_| general_purpose::URL_SAFE.decode(data))
        .map_err(|e| Error::Payload(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Payload(format!("invalid json: {e}")))
}

/// Drives one notification to completion against an already-authenticated
/// gateway: look up the single newest inbox message and hand it to the
/// engine. An empty mailbox is a quiet no-op, not an error.
pub struct Dispatcher<'a> {
    gateway: &'a dyn MailboxGateway,
    directory: &'a LabelDirectory,
}

impl<'a> Dispatcher<'a> {
    pub fn new(gateway: &'a dyn MailboxGateway, directory: &'a LabelDirectory) -> Self {
        Self { gateway, directory }
    }

    pub fn on_new_message(&self) -> Result<Outcome, Error> {
        let newest = self.gateway.list_messages(&MessageQuery {
            sender: None,
            label_ids: vec![INBOX.to_string()],
            max_results: 1,
        })?;

        let Some(newest_ref) = newest.first() else {
            return Ok(Outcome::NoAction(SkipReason::EmptyMailbox));
        };

        let message = self.gateway.get_message(&newest_ref.id)?;
        InvariantEngine::new(self.gateway, self.directory).process(&message)
    }
}

/// Full path for one raw payload: decode, authenticate as the named
/// account, dispatch. This is the piece the poller and the `process`
/// command share.
pub fn handle_payload(
    tokens: &TokenManager,
    directory: &LabelDirectory,
    data: &str,
) -> anyhow::Result<Outcome> {
    let notification = decode_notification(data)?;
    debug!("notification for {}", notification.email_address);

    let access_token = tokens.access_token_for(&notification.email_address)?;
    let gateway = GmailClient::new(&access_token);
    Ok(Dispatcher::new(&gateway, directory).on_new_message()?)
}

/// Boundary triage: expected skips stay quiet, applied sweeps are one info
/// line, everything else is the caller's error to log.
pub fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Applied { swept } if *swept > 0 => info!("swept {swept} older message(s)"),
        Outcome::Applied { .. } => debug!("promoted with nothing to sweep"),
        Outcome::NoAction(reason) => debug!("no action ({reason:?})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::fake::FakeGateway;
    use base64::Engine as _;

    const LABEL: &str = "OnlyTheLatest";

    fn b64(json: &str) -> String {
        general_purpose::STANDARD.encode(json)
    }

    #[test]
    fn decodes_standard_base64_payload() {
        let n = decode_notification(&b64(
            r#"{"emailAddress":"me@example.com","historyId":42}"#,
        ))
        .unwrap();
        assert_eq!(n.email_address, "me@example.com");
        assert_eq!(n.history_id, Some(42));
    }

    #[test]
    fn decodes_url_safe_base64_payload() {
        let data = general_purpose::URL_SAFE.encode(r#"{"emailAddress":"me@example.com"}"#);
        let n = decode_notification(&data).unwrap();
        assert_eq!(n.email_address, "me@example.com");
        assert_eq!(n.history_id, None);
    }

    #[test]
    fn rejects_garbage_payloads() {
        assert!(matches!(
            decode_notification("!!not base64!!"),
            Err(Error::Payload(_))
        ));
        assert!(matches!(
            decode_notification(&b64("not json")),
            Err(Error::Payload(_))
        ));
        assert!(matches!(
            decode_notification(&b64(r#"{"historyId":1}"#)),
            Err(Error::Payload(_))
        ));
    }

    #[test]
    fn dispatches_newest_inbox_message() {
        let gw = FakeGateway::new();
        let sentinel = gw.add_label(LABEL).id;
        let dir = LabelDirectory::new(LABEL);
        gw.add_message("m1", "x@y.com", &[INBOX, sentinel.as_str()]);
        gw.add_message("m2", "x@y.com", &[INBOX]);

        let outcome = Dispatcher::new(&gw, &dir).on_new_message().unwrap();

        assert_eq!(outcome, Outcome::Applied { swept: 1 });
        assert!(gw.get_message("m2").unwrap().label_ids.contains(&sentinel));
    }

    #[test]
    fn empty_mailbox_is_a_quiet_no_op() {
        let gw = FakeGateway::new();
        gw.add_label(LABEL);
        let dir = LabelDirectory::new(LABEL);

        let outcome = Dispatcher::new(&gw, &dir).on_new_message().unwrap();
        assert_eq!(outcome, Outcome::NoAction(SkipReason::EmptyMailbox));
    }
}
