use std::sync::Mutex;

use crate::error::Error;
use crate::mail::gateway::{GatewayError, MailboxGateway};

/// Resolves the sentinel label's name to its provider-assigned id, caching
/// the result. The cache is filled lazily on first successful resolution and
/// never proactively invalidated; labels edited behind our back surface as a
/// downstream not-found, at which point a caller may [`invalidate`] and
/// resolve again. Safe to share between invocations: a concurrent double
/// resolve converges on the same id, last write wins.
///
/// [`invalidate`]: LabelDirectory::invalidate
pub struct LabelDirectory {
    name: String,
    cached_id: Mutex<Option<String>>,
}

impl LabelDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cached_id: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached id, or one list-labels round trip matching by exact name.
    pub fn resolve(&self, gateway: &dyn MailboxGateway) -> Result<String, Error> {
        if let Some(id) = self.cached_id.lock().expect("label cache lock").clone() {
            return Ok(id);
        }

        let labels = gateway.list_labels()?;
        let id = labels
            .into_iter()
            .find(|l| l.name == self.name)
            .map(|l| l.id)
            .ok_or_else(|| Error::LabelNotFound(self.name.clone()))?;

        *self.cached_id.lock().expect("label cache lock") = Some(id.clone());
        Ok(id)
    }

    /// Create the sentinel label. Already-existing is success; anything else
    /// propagates.
    pub fn ensure(&self, gateway: &dyn MailboxGateway) -> Result<(), Error> {
        match gateway.create_label(&self.name) {
            Ok(_) | Err(GatewayError::Conflict) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the cached id so the next resolve hits the provider again. For
    /// callers that got a stale-id response from a mutating call; the retry
    /// failure, if any, is theirs to surface.
    pub fn invalidate(&self) {
        *self.cached_id.lock().expect("label cache lock") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::fake::FakeGateway;

    #[test]
    fn resolve_caches_after_first_listing() {
        let gw = FakeGateway::new();
        gw.add_label("OnlyTheLatest");

        let dir = LabelDirectory::new("OnlyTheLatest");
        let first = dir.resolve(&gw).unwrap();
        let second = dir.resolve(&gw).unwrap();

        assert_eq!(first, second);
        assert_eq!(gw.list_labels_calls(), 1);
    }

    #[test]
    fn resolve_fails_when_label_missing() {
        let gw = FakeGateway::new();
        let dir = LabelDirectory::new("OnlyTheLatest");

        match dir.resolve(&gw) {
            Err(Error::LabelNotFound(name)) => assert_eq!(name, "OnlyTheLatest"),
            other => panic!("expected LabelNotFound, got {other:?}"),
        }
    }

    #[test]
    fn invalidate_forces_a_second_listing() {
        let gw = FakeGateway::new();
        gw.add_label("OnlyTheLatest");

        let dir = LabelDirectory::new("OnlyTheLatest");
        dir.resolve(&gw).unwrap();
        dir.invalidate();
        dir.resolve(&gw).unwrap();

        assert_eq!(gw.list_labels_calls(), 2);
    }

    #[test]
    fn ensure_treats_conflict_as_success() {
        let gw = FakeGateway::new();
        let dir = LabelDirectory::new("OnlyTheLatest");

        dir.ensure(&gw).unwrap();
        // second create returns 409 from the provider
        dir.ensure(&gw).unwrap();

        assert_eq!(gw.list_labels().unwrap().len(), 1);
    }
}
