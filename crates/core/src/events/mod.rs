//! Domain events module.
//!
//! Provides domain event types and the sink trait for emitting events
//! after successful mutations. Runtime adapters (CLI, UI bindings) implement
//! the sink to translate domain events into platform-specific actions.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
