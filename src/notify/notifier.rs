//! Per-entity notification toggle
//!
//! An entity broadcasts on its own kind only while `notifying` is set;
//! otherwise its mutators go to [`Channel::Disabled`]. Entities start silent.

use super::bus::NotificationBus;
use super::channel::Channel;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Notifier {
    bus: NotificationBus,
    kind: Channel,
    notifying: AtomicBool,
}

impl Notifier {
    pub fn new(bus: &NotificationBus, kind: Channel) -> Self {
        Self {
            bus: bus.clone(),
            kind,
            notifying: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> Channel {
        self.kind
    }

    pub fn is_notifying(&self) -> bool {
        self.notifying.load(Ordering::Acquire)
    }

    pub fn set_notifying(&self, notifying: bool) {
        self.notifying.store(notifying, Ordering::Release);
    }

    /// The channel mutators currently broadcast on
    pub fn channel(&self) -> Channel {
        if self.is_notifying() {
            self.kind
        } else {
            Channel::Disabled
        }
    }

    /// Broadcast once on the effective channel
    pub fn notify(&self) -> usize {
        self.bus.broadcast(self.channel())
    }

    /// Run `f` with notifications off, restore the flag, then broadcast once.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = self.notifying.swap(false, Ordering::AcqRel);
        let result = f();
        self.set_notifying(previous);
        self.notify();
        result
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("kind", &self.kind)
            .field("notifying", &self.is_notifying())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_effective_channel() {
        let bus = NotificationBus::new();
        let notifier = Notifier::new(&bus, Channel::MarketLocation);
        assert_eq!(notifier.channel(), Channel::Disabled);
        notifier.set_notifying(true);
        assert_eq!(notifier.channel(), Channel::MarketLocation);
    }

    #[test]
    fn test_batch_broadcasts_once() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let _sub = bus.subscribe(Channel::PivotList, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        let notifier = Notifier::new(&bus, Channel::PivotList);
        notifier.set_notifying(true);
        notifier.batch(|| {
            for _ in 0..5 {
                notifier.notify();
            }
        });

        assert!(notifier.is_notifying());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_batch_on_silent_notifier_stays_silent() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let _sub = bus.subscribe(Channel::Prediction, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        let notifier = Notifier::new(&bus, Channel::Prediction);
        notifier.batch(|| notifier.notify());
        assert!(!notifier.is_notifying());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
