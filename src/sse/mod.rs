// Server-Sent Events fan-out: wire event model, domain-to-SSE registry,
// Redis channel naming, publisher, and subscriber.

pub mod channels;
pub mod event;
pub mod publisher;
pub mod registry;
pub mod subscriber;

pub use channels::SseChannels;
pub use event::{parse_categories, SseCategory, SseEvent, SseEventType};
pub use publisher::{SsePublisher, SsePublisherConfig};
pub use registry::{map_to_sse, DOMAIN_TO_SSE, SSE_EVENT_REGISTRY};
pub use subscriber::{SseSubscriber, SseSubscription};
