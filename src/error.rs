use thiserror::Error;

use crate::mail::gateway::GatewayError;

/// Failures the engine and dispatcher can surface. "Nothing to do" is not
/// an error here; see [`crate::engine::Outcome`].
#[derive(Error, Debug)]
pub enum Error {
    /// The sentinel label was absent from a full label listing. Should not
    /// happen after a successful ensure; fatal for the current invocation.
    #[error("label {0:?} not found in the account's label list")]
    LabelNotFound(String),

    /// Notification payload could not be decoded.
    #[error("bad notification payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
