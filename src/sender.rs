use std::sync::LazyLock;

use regex::Regex;

use crate::domain::message::{Message, MessageQuery};
use crate::error::Error;
use crate::mail::gateway::MailboxGateway;

// Permissive: first local@domain token, whatever surrounds it. Accepts both
// `Some Name <a@b.com>` and a bare `a@b.com`, rejects headers with no
// address-looking token at all.
static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^@<\s]+@[^@\s>]+").expect("address pattern"));

/// Extract the normalized sender address from a raw `From` header value.
/// Returns `None` when nothing address-like is present.
pub fn extract_address(from_header: &str) -> Option<String> {
    ADDRESS
        .find(from_header)
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Sender of a message, or `None` if the header is absent or unparseable.
pub fn sender_of(message: &Message) -> Option<String> {
    message.from.as_deref().and_then(extract_address)
}

/// A sender is managed iff at least one of their messages currently carries
/// the sentinel label. Point-in-time check, one list call, no caching.
pub fn is_managed(
    gateway: &dyn MailboxGateway,
    sender: &str,
    sentinel_id: &str,
) -> Result<bool, Error> {
    let refs = gateway.list_messages(&MessageQuery {
        sender: Some(sender.to_string()),
        label_ids: vec![sentinel_id.to_string()],
        max_results: 1,
    })?;
    Ok(!refs.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(from: Option<&str>) -> Message {
        Message {
            id: "m1".into(),
            from: from.map(str::to_string),
            label_ids: vec![],
        }
    }

    #[test]
    fn extracts_bare_address() {
        assert_eq!(extract_address("x@y.com"), Some("x@y.com".into()));
    }

    #[test]
    fn extracts_from_display_name_form() {
        assert_eq!(
            extract_address("Some Body <Some.Body@Example.COM>"),
            Some("some.body@example.com".into())
        );
    }

    #[test]
    fn takes_first_of_several() {
        assert_eq!(
            extract_address("a@b.com via <relay@lists.example>"),
            Some("a@b.com".into())
        );
    }

    #[test]
    fn no_match_without_at_token() {
        assert_eq!(extract_address("undisclosed-recipients:;"), None);
        assert_eq!(extract_address(""), None);
    }

    #[test]
    fn sender_of_handles_missing_header() {
        assert_eq!(sender_of(&msg(None)), None);
        assert_eq!(sender_of(&msg(Some("nobody"))), None);
        assert_eq!(sender_of(&msg(Some("A <a@b.co>"))), Some("a@b.co".into()));
    }
}
