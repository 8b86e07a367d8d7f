//! Shared storage behind every mutable entity handle

use super::ids::EntityId;
use crate::notify::{Channel, NotificationBus, Notifier};
use parking_lot::RwLock;

/// Fields behind a lock plus the entity's notifier.
///
/// Writers release the lock before broadcasting so subscribers can read the
/// entity they were told about.
#[derive(Debug)]
pub(crate) struct EntityCell<F> {
    id: EntityId,
    fields: RwLock<F>,
    notifier: Notifier,
}

impl<F> EntityCell<F> {
    pub(crate) fn new(id: EntityId, fields: F, bus: &NotificationBus, kind: Channel) -> Self {
        Self {
            id,
            fields: RwLock::new(fields),
            notifier: Notifier::new(bus, kind),
        }
    }

    pub(crate) fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        f(&self.fields.read())
    }

    /// Mutate, then broadcast once
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        let result = f(&mut self.fields.write());
        self.notifier.notify();
        result
    }

    /// Mutate only if `f` reports a change (`Some`); broadcast only then
    pub(crate) fn try_update<R>(&self, f: impl FnOnce(&mut F) -> Option<R>) -> Option<R> {
        let result = f(&mut self.fields.write());
        if result.is_some() {
            self.notifier.notify();
        }
        result
    }

    /// Fallible mutation; broadcast only on `Ok`
    pub(crate) fn try_update_with<R, E>(
        &self,
        f: impl FnOnce(&mut F) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        let result = f(&mut self.fields.write())?;
        self.notifier.notify();
        Ok(result)
    }
}

impl<F: Clone> EntityCell<F> {
    pub(crate) fn fields(&self) -> F {
        self.fields.read().clone()
    }
}
