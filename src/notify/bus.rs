//! Notification bus
//!
//! Synchronous publish/subscribe keyed by [`Channel`]. Delivery happens on the
//! caller of [`NotificationBus::broadcast`], in registration order. No lock is
//! held while callbacks run, so a callback may query the store, subscribe,
//! unsubscribe, or broadcast on another channel.
//!
//! Re-entrancy policy:
//! - Broadcasting a channel from inside a callback that is already delivering
//!   that same channel is a cycle. The nested broadcast is dropped (warn, 0).
//! - Cross-channel cascades are delivered. Since a channel can appear only
//!   once on the delivery stack, nesting is bounded by the number of
//!   deliverable channels.

use super::channel::Channel;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

type Callback = Arc<dyn Fn(Channel) + Send + Sync>;

/// Opaque subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    channel: Channel,
    callback: Callback,
    active: AtomicBool,
}

struct BusInner {
    /// Registration order is delivery order
    registrations: Mutex<Vec<Arc<Registration>>>,
    next_id: AtomicU64,
    /// Channels currently delivering, innermost last
    delivering: Mutex<Vec<Channel>>,
}

impl BusInner {
    fn remove(&self, id: SubscriptionId) -> bool {
        // The callback may own other subscriptions; drop it outside the lock
        let removed = {
            let mut registrations = self.registrations.lock();
            registrations
                .iter()
                .position(|r| r.id == id)
                .map(|index| registrations.remove(index))
        };
        match removed {
            Some(registration) => {
                registration.active.store(false, Ordering::Release);
                debug!("Unsubscribed {:?} from {}", id, registration.channel);
                true
            }
            None => false,
        }
    }
}

/// Pops the delivery stack even if a callback panics
struct DeliveryGuard<'a> {
    inner: &'a BusInner,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.inner.delivering.lock().pop();
    }
}

/// Shared handle to one notification bus
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                registrations: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                delivering: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register `callback` for `channel`.
    ///
    /// The returned guard unsubscribes when dropped. Registrations on
    /// [`Channel::Disabled`] are accepted but never invoked.
    pub fn subscribe<F>(&self, channel: Channel, callback: F) -> Subscription
    where
        F: Fn(Channel) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            channel,
            callback: Arc::new(callback),
            active: AtomicBool::new(true),
        });
        self.inner.registrations.lock().push(registration);
        debug!("Awaiting {} as {:?}", channel, id);

        Subscription {
            id,
            channel,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a registration. Unknown or already-removed ids are a no-op.
    ///
    /// Returns whether a registration was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// Invoke every callback currently registered on `channel`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn broadcast(&self, channel: Channel) -> usize {
        if channel.is_disabled() {
            return 0;
        }

        // Snapshot, then release the lock before delivering
        let targets: Vec<Arc<Registration>> = self
            .inner
            .registrations
            .lock()
            .iter()
            .filter(|r| r.channel == channel)
            .cloned()
            .collect();

        if targets.is_empty() {
            trace!("Sent {} to nobody", channel);
            return 0;
        }

        {
            let mut delivering = self.inner.delivering.lock();
            if delivering.contains(&channel) {
                warn!("Dropped re-entrant broadcast of {} (cycle)", channel);
                return 0;
            }
            delivering.push(channel);
        }
        let _guard = DeliveryGuard { inner: &self.inner };

        debug!("Sent {} to {} subscriber(s)", channel, targets.len());

        let mut delivered = 0;
        for registration in targets {
            // Skip anything unsubscribed earlier in this round
            if registration.active.load(Ordering::Acquire) {
                (registration.callback)(channel);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live registrations on `channel`
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.inner
            .registrations
            .lock()
            .iter()
            .filter(|r| r.channel == channel)
            .count()
    }

    /// Whether `channel` is being delivered right now
    pub fn is_delivering(&self, channel: Channel) -> bool {
        self.inner.delivering.lock().contains(&channel)
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("registrations", &self.inner.registrations.lock().len())
            .finish()
    }
}

/// Scoped registration: unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    id: SubscriptionId,
    channel: Channel,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Still registered on a live bus
    pub fn is_active(&self) -> bool {
        self.bus
            .upgrade()
            .map(|inner| inner.registrations.lock().iter().any(|r| r.id == self.id))
            .unwrap_or(false)
    }

    /// Release now instead of at end of scope
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}

/// A group of subscriptions released together, e.g. everything one screen
/// listens to.
pub struct SubscriptionScope {
    bus: NotificationBus,
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    pub fn new(bus: &NotificationBus) -> Self {
        Self {
            bus: bus.clone(),
            subscriptions: Vec::new(),
        }
    }

    pub fn listen<F>(&mut self, channel: Channel, callback: F) -> SubscriptionId
    where
        F: Fn(Channel) + Send + Sync + 'static,
    {
        let subscription = self.bus.subscribe(channel, callback);
        let id = subscription.id();
        self.subscriptions.push(subscription);
        id
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Unsubscribe everything held so far; the scope stays usable
    pub fn release(&mut self) {
        self.subscriptions.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}
