//! Change notification
//!
//! - `channel` - the closed set of change kinds
//! - `bus` - synchronous publish/subscribe with scoped subscriptions
//! - `notifier` - the per-entity on/off switch

mod bus;
mod channel;
mod notifier;

pub use bus::{NotificationBus, Subscription, SubscriptionId, SubscriptionScope};
pub use channel::Channel;
pub use notifier::Notifier;
