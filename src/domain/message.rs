/// Pseudo-label Gmail uses for inbox membership.
pub const INBOX: &str = "INBOX";

/// A message id paired with nothing else, as returned by list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
}

/// Snapshot of a message as fetched from the provider. Never mutated in
/// place; label changes are issued as gateway commands instead.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    /// Raw `From` header value, if the message carried one.
    pub from: Option<String>,
    pub label_ids: Vec<String>,
}

impl Message {
    pub fn is_visible(&self, sentinel_id: &str) -> bool {
        self.label_ids.iter().any(|l| l == INBOX || l == sentinel_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Filter for a list call. `label_ids` are ANDed by the provider; `sender`
/// becomes a `from:` query term.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub sender: Option<String>,
    pub label_ids: Vec<String>,
    pub max_results: u32,
}

/// Label membership change applied to one message or a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelChange {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelChange {
    pub fn add_one(label_id: impl Into<String>) -> Self {
        Self {
            add: vec![label_id.into()],
            remove: Vec::new(),
        }
    }

    pub fn remove_many(label_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            add: Vec::new(),
            remove: label_ids.into_iter().map(Into::into).collect(),
        }
    }
}
