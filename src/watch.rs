use log::info;

use crate::domain::message::INBOX;
use crate::error::Error;
use crate::labels::LabelDirectory;
use crate::mail::gateway::MailboxGateway;

/// One-shot (re)initialization: make sure the sentinel label exists, drop
/// any previous registration, then watch the inbox on the given topic.
/// Safe to run again whenever the registration needs renewing.
pub fn init_watch(
    gateway: &dyn MailboxGateway,
    directory: &LabelDirectory,
    topic: &str,
) -> Result<(), Error> {
    directory.ensure(gateway)?;
    gateway.cancel_watches()?;
    gateway.register_watch(topic, &[INBOX.to_string()])?;
    info!("watching inbox, notifications go to {topic}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::fake::FakeGateway;

    #[test]
    fn registers_an_inbox_watch_and_creates_the_label() {
        let gw = FakeGateway::new();
        let dir = LabelDirectory::new("OnlyTheLatest");

        init_watch(&gw, &dir, "projects/p/topics/mail").unwrap();

        assert!(gw.label_id("OnlyTheLatest").is_some());
        let watches = gw.watches();
        assert_eq!(watches.len(), 1);
        assert_eq!(watches[0].0, "projects/p/topics/mail");
        assert_eq!(watches[0].1, vec![INBOX.to_string()]);
    }

    #[test]
    fn rerunning_replaces_the_previous_watch() {
        let gw = FakeGateway::new();
        let dir = LabelDirectory::new("OnlyTheLatest");

        init_watch(&gw, &dir, "projects/p/topics/mail").unwrap();
        init_watch(&gw, &dir, "projects/p/topics/mail").unwrap();

        assert_eq!(gw.watches().len(), 1);
    }
}
