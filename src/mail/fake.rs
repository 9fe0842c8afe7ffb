//! In-memory stand-in for the Gmail gateway, used by the unit tests.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::domain::message::{Label, LabelChange, Message, MessageQuery, MessageRef};
use crate::mail::gateway::{GatewayError, MailboxGateway};
use crate::sender;

#[derive(Clone)]
struct StoredMessage {
    id: String,
    from: String,
    labels: BTreeSet<String>,
}

#[derive(Default)]
struct State {
    labels: Vec<Label>,
    next_label: u32,
    // insertion order == arrival order, oldest first
    messages: Vec<StoredMessage>,
    list_labels_calls: usize,
    modify_calls: usize,
    batch_calls: Vec<(Vec<String>, LabelChange)>,
    watches: Vec<(String, Vec<String>)>,
}

pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn add_label(&self, name: &str) -> Label {
        let mut st = self.state.lock().unwrap();
        st.next_label += 1;
        let label = Label {
            id: format!("Label_{}", st.next_label),
            name: name.to_string(),
        };
        st.labels.push(label.clone());
        label
    }

    pub fn label_id(&self, name: &str) -> Option<String> {
        let st = self.state.lock().unwrap();
        st.labels.iter().find(|l| l.name == name).map(|l| l.id.clone())
    }

    pub fn add_message(&self, id: &str, from: &str, labels: &[&str]) -> Message {
        let stored = StoredMessage {
            id: id.to_string(),
            from: from.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
        };
        let msg = to_message(&stored);
        self.state.lock().unwrap().messages.push(stored);
        msg
    }

    pub fn messages_from(&self, sender_addr: &str) -> Vec<Message> {
        let st = self.state.lock().unwrap();
        st.messages
            .iter()
            .filter(|m| sender::extract_address(&m.from).as_deref() == Some(sender_addr))
            .map(to_message)
            .collect()
    }

    pub fn list_labels_calls(&self) -> usize {
        self.state.lock().unwrap().list_labels_calls
    }

    pub fn modify_calls(&self) -> usize {
        self.state.lock().unwrap().modify_calls
    }

    pub fn batch_calls(&self) -> Vec<(Vec<String>, LabelChange)> {
        self.state.lock().unwrap().batch_calls.clone()
    }

    pub fn watches(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().watches.clone()
    }
}

fn to_message(stored: &StoredMessage) -> Message {
    Message {
        id: stored.id.clone(),
        from: Some(stored.from.clone()),
        label_ids: stored.labels.iter().cloned().collect(),
    }
}

fn apply(labels: &mut BTreeSet<String>, change: &LabelChange) {
    for l in &change.add {
        labels.insert(l.clone());
    }
    for l in &change.remove {
        labels.remove(l);
    }
}

impl MailboxGateway for FakeGateway {
    fn list_messages(&self, query: &MessageQuery) -> Result<Vec<MessageRef>, GatewayError> {
        let st = self.state.lock().unwrap();
        let mut refs: Vec<MessageRef> = st
            .messages
            .iter()
            .rev() // newest first
            .filter(|m| match &query.sender {
                Some(s) => sender::extract_address(&m.from).as_deref() == Some(s.as_str()),
                None => true,
            })
            .filter(|m| query.label_ids.iter().all(|l| m.labels.contains(l)))
            .map(|m| MessageRef { id: m.id.clone() })
            .collect();
        refs.truncate(query.max_results as usize);
        Ok(refs)
    }

    fn get_message(&self, id: &str) -> Result<Message, GatewayError> {
        let st = self.state.lock().unwrap();
        st.messages
            .iter()
            .find(|m| m.id == id)
            .map(to_message)
            .ok_or(GatewayError::NotFound)
    }

    fn modify_message(&self, id: &str, change: &LabelChange) -> Result<(), GatewayError> {
        let mut st = self.state.lock().unwrap();
        st.modify_calls += 1;
        let msg = st
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(GatewayError::NotFound)?;
        apply(&mut msg.labels, change);
        Ok(())
    }

    fn batch_modify(&self, ids: &[String], change: &LabelChange) -> Result<(), GatewayError> {
        let mut st = self.state.lock().unwrap();
        st.batch_calls.push((ids.to_vec(), change.clone()));
        for id in ids {
            if let Some(msg) = st.messages.iter_mut().find(|m| &m.id == id) {
                apply(&mut msg.labels, change);
            }
        }
        Ok(())
    }

    fn create_label(&self, name: &str) -> Result<Label, GatewayError> {
        {
            let st = self.state.lock().unwrap();
            if st.labels.iter().any(|l| l.name == name) {
                return Err(GatewayError::Conflict);
            }
        }
        Ok(self.add_label(name))
    }

    fn list_labels(&self) -> Result<Vec<Label>, GatewayError> {
        let mut st = self.state.lock().unwrap();
        st.list_labels_calls += 1;
        Ok(st.labels.clone())
    }

    fn register_watch(&self, topic: &str, label_ids: &[String]) -> Result<(), GatewayError> {
        let mut st = self.state.lock().unwrap();
        st.watches.push((topic.to_string(), label_ids.to_vec()));
        Ok(())
    }

    fn cancel_watches(&self) -> Result<(), GatewayError> {
        self.state.lock().unwrap().watches.clear();
        Ok(())
    }
}
