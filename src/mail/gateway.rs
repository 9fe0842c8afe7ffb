use thiserror::Error;

use crate::domain::message::{Label, LabelChange, Message, MessageQuery, MessageRef};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Create hit an already-existing resource (HTTP 409).
    #[error("resource already exists")]
    Conflict,
    /// The provider reports no such message or label.
    #[error("resource not found")]
    NotFound,
    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Operations the engine needs from the mailbox provider. Implemented over
/// the Gmail REST API for real use and by an in-memory fake in tests.
pub trait MailboxGateway: Send + Sync {
    /// Newest-first refs of messages matching the query.
    fn list_messages(&self, query: &MessageQuery) -> Result<Vec<MessageRef>, GatewayError>;

    fn get_message(&self, id: &str) -> Result<Message, GatewayError>;

    fn modify_message(&self, id: &str, change: &LabelChange) -> Result<(), GatewayError>;

    /// Applies one change to every id. Atomic (or rejected wholesale) from
    /// the caller's point of view; partial failures are the provider's
    /// problem, not retried here.
    fn batch_modify(&self, ids: &[String], change: &LabelChange) -> Result<(), GatewayError>;

    fn create_label(&self, name: &str) -> Result<Label, GatewayError>;

    fn list_labels(&self) -> Result<Vec<Label>, GatewayError>;

    fn register_watch(&self, topic: &str, label_ids: &[String]) -> Result<(), GatewayError>;

    fn cancel_watches(&self) -> Result<(), GatewayError>;
}
