use std::collections::BTreeSet;

use log::debug;

use crate::domain::message::{INBOX, LabelChange, Message, MessageQuery};
use crate::error::Error;
use crate::labels::LabelDirectory;
use crate::mail::gateway::MailboxGateway;
use crate::sender;

/// Upper bound on messages collected per sender in one pass, mirroring the
/// provider's page size. Anything beyond this is picked up by the next
/// notification for the same sender.
const COLLECT_LIMIT: u32 = 500;

/// What a finished invocation did. Failures travel as `Err`; this type only
/// distinguishes "changed the mailbox" from "nothing to do".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Sender was managed; the new message was promoted and `swept` older
    /// messages were archived.
    Applied { swept: usize },
    NoAction(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `From` header absent or nothing address-like in it.
    NoSender,
    /// Sender has no message under the sentinel label.
    NotManaged,
    /// The account has no messages at all to look at.
    EmptyMailbox,
}

/// Re-establishes the one-visible-message-per-sender invariant after a new
/// message arrives. Stateless apart from the shared label-id cache; every
/// call runs to completion or fails wholesale.
pub struct InvariantEngine<'a> {
    gateway: &'a dyn MailboxGateway,
    directory: &'a LabelDirectory,
}

impl<'a> InvariantEngine<'a> {
    pub fn new(gateway: &'a dyn MailboxGateway, directory: &'a LabelDirectory) -> Self {
        Self { gateway, directory }
    }

    /// Process `newest`: ensure the sentinel label, classify the sender,
    /// then promote the message and sweep every older one from the inbox
    /// and the sentinel label in a single batch call.
    ///
    /// Reprocessing the same message converges to the same mailbox state,
    /// so duplicate or late notifications are harmless.
    pub fn process(&self, newest: &Message) -> Result<Outcome, Error> {
        self.directory.ensure(self.gateway)?;

        let Some(sender_addr) = sender::sender_of(newest) else {
            return Ok(Outcome::NoAction(SkipReason::NoSender));
        };

        let sentinel_id = self.directory.resolve(self.gateway)?;

        if !sender::is_managed(self.gateway, &sender_addr, &sentinel_id)? {
            debug!("sender {sender_addr} is not managed, nothing to do");
            return Ok(Outcome::NoAction(SkipReason::NotManaged));
        }

        // Promote before collecting, so a crash between the two leaves the
        // new message labeled and a redelivered notification can finish the
        // sweep.
        self.gateway
            .modify_message(&newest.id, &LabelChange::add_one(sentinel_id.clone()))?;

        let sweep = self.collect_sweep_set(&sender_addr, &sentinel_id, &newest.id)?;
        if sweep.is_empty() {
            return Ok(Outcome::Applied { swept: 0 });
        }

        let ids: Vec<String> = sweep.into_iter().collect();
        self.gateway.batch_modify(
            &ids,
            &LabelChange::remove_many([INBOX.to_string(), sentinel_id]),
        )?;

        Ok(Outcome::Applied { swept: ids.len() })
    }

    /// Union of the sender's inbox and sentinel-labeled messages, minus the
    /// newest message itself. Set semantics by id: a message present in both
    /// listings is swept at most once, and the newest message is excluded
    /// even if a duplicate delivery already promoted it.
    fn collect_sweep_set(
        &self,
        sender_addr: &str,
        sentinel_id: &str,
        newest_id: &str,
    ) -> Result<BTreeSet<String>, Error> {
        let mut sweep = BTreeSet::new();
        for label_id in [INBOX, sentinel_id] {
            let refs = self.gateway.list_messages(&MessageQuery {
                sender: Some(sender_addr.to_string()),
                label_ids: vec![label_id.to_string()],
                max_results: COLLECT_LIMIT,
            })?;
            sweep.extend(refs.into_iter().map(|r| r.id));
        }
        sweep.remove(newest_id);
        Ok(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::fake::FakeGateway;

    const LABEL: &str = "OnlyTheLatest";

    fn engine_env() -> (FakeGateway, LabelDirectory) {
        let gw = FakeGateway::new();
        gw.add_label(LABEL);
        (gw, LabelDirectory::new(LABEL))
    }

    fn visible_from(gw: &FakeGateway, sender: &str) -> Vec<String> {
        let sentinel = gw.label_id(LABEL).unwrap();
        gw.messages_from(sender)
            .into_iter()
            .filter(|m| m.is_visible(&sentinel))
            .map(|m| m.id)
            .collect()
    }

    #[test]
    fn promotes_new_message_and_sweeps_older_one() {
        let (gw, dir) = engine_env();
        let sentinel = gw.label_id(LABEL).unwrap();
        gw.add_message("m1", "x@y.com", &[INBOX, sentinel.as_str()]);
        let m2 = gw.add_message("m2", "x@y.com", &[INBOX]);

        let outcome = InvariantEngine::new(&gw, &dir).process(&m2).unwrap();

        assert_eq!(outcome, Outcome::Applied { swept: 1 });
        assert_eq!(visible_from(&gw, "x@y.com"), vec!["m2".to_string()]);
        let m2_after = gw.get_message("m2").unwrap();
        assert!(m2_after.label_ids.contains(&sentinel));
        let m1_after = gw.get_message("m1").unwrap();
        assert!(m1_after.label_ids.is_empty());
    }

    #[test]
    fn duplicate_delivery_is_idempotent() {
        let (gw, dir) = engine_env();
        let sentinel = gw.label_id(LABEL).unwrap();
        gw.add_message("m1", "x@y.com", &[INBOX, sentinel.as_str()]);
        let m2 = gw.add_message("m2", "x@y.com", &[INBOX]);

        let engine = InvariantEngine::new(&gw, &dir);
        engine.process(&m2).unwrap();
        let second = engine.process(&m2).unwrap();

        // second pass finds nothing left to sweep
        assert_eq!(second, Outcome::Applied { swept: 0 });
        assert_eq!(visible_from(&gw, "x@y.com"), vec!["m2".to_string()]);
    }

    #[test]
    fn unmanaged_sender_mutates_nothing() {
        let (gw, dir) = engine_env();
        gw.add_message("m1", "x@y.com", &[INBOX]);
        let m2 = gw.add_message("m2", "x@y.com", &[INBOX]);

        let outcome = InvariantEngine::new(&gw, &dir).process(&m2).unwrap();

        assert_eq!(outcome, Outcome::NoAction(SkipReason::NotManaged));
        assert_eq!(gw.modify_calls(), 0);
        assert_eq!(gw.batch_calls().len(), 0);
        // m1 stays visible: not our sender to manage
        assert_eq!(
            visible_from(&gw, "x@y.com"),
            vec!["m1".to_string(), "m2".to_string()]
        );
    }

    #[test]
    fn missing_sender_header_is_a_no_op() {
        let (gw, dir) = engine_env();
        let m = Message {
            id: "m9".into(),
            from: None,
            label_ids: vec![INBOX.into()],
        };

        let outcome = InvariantEngine::new(&gw, &dir).process(&m).unwrap();
        assert_eq!(outcome, Outcome::NoAction(SkipReason::NoSender));
        assert_eq!(gw.modify_calls(), 0);
    }

    #[test]
    fn sweep_set_is_the_union_counted_once() {
        let (gw, dir) = engine_env();
        let sentinel = gw.label_id(LABEL).unwrap();
        // a,b in inbox; b,c under the sentinel label; d is new
        gw.add_message("a", "s@t.io", &[INBOX]);
        gw.add_message("b", "s@t.io", &[INBOX, sentinel.as_str()]);
        gw.add_message("c", "s@t.io", &[sentinel.as_str()]);
        let d = gw.add_message("d", "s@t.io", &[INBOX]);

        let outcome = InvariantEngine::new(&gw, &dir).process(&d).unwrap();

        assert_eq!(outcome, Outcome::Applied { swept: 3 });
        let batches = gw.batch_calls();
        assert_eq!(batches.len(), 1);
        let (ids, change) = &batches[0];
        let mut ids = ids.clone();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".into(), "c".into()]);
        assert!(change.remove.contains(&INBOX.to_string()));
        assert!(change.remove.contains(&sentinel));
    }

    #[test]
    fn empty_sweep_skips_the_batch_call() {
        let (gw, dir) = engine_env();
        let sentinel = gw.label_id(LABEL).unwrap();
        // only prior trace of this sender is the new message itself,
        // already promoted by an earlier duplicate delivery
        let m = gw.add_message("m1", "x@y.com", &[INBOX, sentinel.as_str()]);

        let outcome = InvariantEngine::new(&gw, &dir).process(&m).unwrap();

        assert_eq!(outcome, Outcome::Applied { swept: 0 });
        assert_eq!(gw.batch_calls().len(), 0);
    }

    #[test]
    fn first_run_creates_the_sentinel_label() {
        let gw = FakeGateway::new();
        let dir = LabelDirectory::new(LABEL);
        let m = gw.add_message("m1", "x@y.com", &[INBOX]);

        let outcome = InvariantEngine::new(&gw, &dir).process(&m).unwrap();

        // label now exists; brand-new label means no managed senders yet
        assert!(gw.label_id(LABEL).is_some());
        assert_eq!(outcome, Outcome::NoAction(SkipReason::NotManaged));
    }
}
