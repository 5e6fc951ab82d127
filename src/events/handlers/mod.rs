// Standard event sinks wired by the composition root

pub mod audit;
pub mod email;
pub mod logging;
mod redaction;
pub mod session;
pub mod sse;

pub use audit::AuditEventHandler;
pub use email::{EmailEventHandler, EmailMessageKind};
pub use logging::LoggingEventHandler;
pub use session::{SessionAction, SessionEventHandler};
pub use sse::SseEventHandler;
