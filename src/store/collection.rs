//! Ordered, identity-keyed collection that broadcasts its list channel

use crate::models::{Entity, EntityId};
use crate::notify::{Channel, NotificationBus};
use parking_lot::RwLock;
use std::fmt;

/// One canonical sequence of entities.
///
/// Mutations broadcast `channel` exactly once, after the lock is released.
/// Out-of-range positions leave the collection untouched and stay silent.
pub struct Collection<T> {
    items: RwLock<Vec<T>>,
    channel: Channel,
    bus: NotificationBus,
}

impl<T: Entity + Clone> Collection<T> {
    pub(crate) fn new(bus: &NotificationBus, channel: Channel, items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            channel,
            bus: bus.clone(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Copy of the current sequence
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    pub fn by_id(&self, id: EntityId) -> Option<T> {
        self.items.read().iter().find(|item| item.id() == id).cloned()
    }

    pub fn index_of_id(&self, id: EntityId) -> Option<usize> {
        self.items.read().iter().position(|item| item.id() == id)
    }

    /// Position of `entity`, matched by id
    pub fn index_of(&self, entity: &T) -> Option<usize> {
        self.index_of_id(entity.id())
    }

    /// Position of this very handle, not just an entity with its id
    pub fn index_of_same(&self, entity: &T) -> Option<usize> {
        self.items.read().iter().position(|item| item.is_same(entity))
    }

    pub fn contains_id(&self, id: EntityId) -> bool {
        self.index_of_id(id).is_some()
    }

    /// Items matching `predicate`, in canonical order
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.items
            .read()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    pub fn count_where(&self, predicate: impl Fn(&T) -> bool) -> usize {
        self.items.read().iter().filter(|item| predicate(item)).count()
    }

    /// Returns the new item's position
    pub(crate) fn append(&self, item: T) -> usize {
        let index = {
            let mut items = self.items.write();
            items.push(item);
            items.len() - 1
        };
        self.bus.broadcast(self.channel);
        index
    }

    pub(crate) fn remove_at(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.items.write();
            if index < items.len() {
                Some(items.remove(index))
            } else {
                None
            }
        }?;
        self.bus.broadcast(self.channel);
        Some(removed)
    }

    pub(crate) fn replace_at(&self, index: usize, item: T) -> Option<T> {
        let previous = {
            let mut items = self.items.write();
            items
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, item))
        }?;
        self.bus.broadcast(self.channel);
        Some(previous)
    }

    /// Replace the stored copy of `item`'s handle wherever it now sits.
    ///
    /// Hands `item` back if that handle is not stored.
    pub(crate) fn replace_same(&self, item: T) -> std::result::Result<usize, T> {
        let index = {
            let mut items = self.items.write();
            match items.iter().position(|stored| stored.is_same(&item)) {
                Some(index) => {
                    items[index] = item;
                    index
                }
                None => return Err(item),
            }
        };
        self.bus.broadcast(self.channel);
        Ok(index)
    }

    /// Remove `entity`'s handle wherever it now sits
    pub(crate) fn remove_same(&self, entity: &T) -> Option<T> {
        let removed = {
            let mut items = self.items.write();
            let index = items.iter().position(|stored| stored.is_same(entity))?;
            items.remove(index)
        };
        self.bus.broadcast(self.channel);
        Some(removed)
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("channel", &self.channel)
            .field("len", &self.items.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PricePivotList;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn setup() -> (NotificationBus, Collection<PricePivotList>, Arc<AtomicUsize>, crate::notify::Subscription) {
        let bus = NotificationBus::new();
        let lists = (0..3)
            .map(|i| PricePivotList::new(1000 + i, i, &bus))
            .collect();
        let collection = Collection::new(&bus, Channel::PivotListList, lists);
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let sub = bus.subscribe(Channel::PivotListList, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        (bus, collection, hits, sub)
    }

    #[test]
    fn test_each_mutation_broadcasts_once() {
        let (bus, collection, hits, _sub) = setup();
        assert_eq!(collection.append(PricePivotList::new(1003, 0, &bus)), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let removed = collection.remove_at(0).unwrap();
        assert_eq!(removed.id(), 1000);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let old = collection.replace_at(0, PricePivotList::new(1004, 1, &bus)).unwrap();
        assert_eq!(old.id(), 1001);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(collection.len(), 3);
    }

    #[test]
    fn test_out_of_range_is_silent() {
        let (bus, collection, hits, _sub) = setup();
        assert!(collection.remove_at(3).is_none());
        assert!(collection.replace_at(7, PricePivotList::new(1009, 0, &bus)).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(collection.len(), 3);
    }

    #[test]
    fn test_lookup_by_identity() {
        let (bus, collection, _hits, _sub) = setup();
        assert_eq!(collection.by_id(1002).unwrap().market_id(), 2);
        assert!(collection.by_id(999).is_none());

        let stranger = PricePivotList::new(1001, 4, &bus);
        assert_eq!(collection.index_of(&stranger), Some(1));
        assert_eq!(collection.count_where(|l| l.market_id() > 0), 2);
    }

    #[test]
    fn test_same_handle_follows_its_position() {
        let (bus, collection, hits, _sub) = setup();
        let tracked = collection.get(2).unwrap();
        collection.remove_at(0);
        assert_eq!(collection.index_of_same(&tracked), Some(1));

        let twin = PricePivotList::new(tracked.id(), 9, &bus);
        assert_eq!(collection.index_of(&twin), Some(1));
        assert_eq!(collection.index_of_same(&twin), None);
        assert!(collection.replace_same(twin.clone()).is_err());
        assert!(collection.remove_same(&twin).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(collection.replace_same(tracked.clone()).ok(), Some(1));
        assert_eq!(collection.remove_same(&tracked).unwrap().id(), 1002);
        assert_eq!(collection.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_subscriber_can_read_during_broadcast() {
        let bus = NotificationBus::new();
        let collection = Arc::new(Collection::<PricePivotList>::new(&bus, Channel::PivotListList, vec![]));
        let seen = Arc::new(AtomicUsize::new(0));
        let (reader, sink) = (collection.clone(), seen.clone());
        let _sub = bus.subscribe(Channel::PivotListList, move |_| {
            sink.store(reader.len(), Ordering::SeqCst);
        });
        collection.append(PricePivotList::new(1000, 0, &bus));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
