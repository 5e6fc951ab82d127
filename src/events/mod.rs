// Domain event system: typed events, the central registry, the
// in-memory bus, and the standard handler sinks.

pub mod bus;
pub mod handlers;
pub mod registry;
pub mod types;

pub use bus::{EventBus, EventContext, EventHandler, RequestMetadata};
pub use registry::{
    meta_for, registry_statistics, EventCategory, EventMeta, EventType, WorkflowPhase,
    EVENT_REGISTRY,
};
pub use types::{DomainEvent, EventPayload};
