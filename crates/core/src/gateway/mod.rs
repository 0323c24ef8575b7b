//! Remote Data Gateway contract shared by all backends: change events,
//! subscriptions, and an in-memory backend for tests and offline use.

mod change_event;
mod memory_gateway;
mod subscription;


pub use change_event::{ChangeEvent, ChangeEventType, Table};
pub use memory_gateway::{GatewayOp, InMemoryGateway};
pub use subscription::{ChangeCallback, Subscription, SubscriptionRegistry};

/// Push-based change notifications keyed by table and event type.
pub trait ChangeFeedTrait: Send + Sync {
    /// Registers `callback` for matching events. The returned handle
    /// unsubscribes when dropped.
    fn subscribe(
        &self,
        table: Table,
        event_type: ChangeEventType,
        callback: ChangeCallback,
    ) -> Subscription;
}
