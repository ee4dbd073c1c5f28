//! Cross-cutting services module
//!
//! Observability hooks dispatched around interception and resolution.

pub mod events;

// Re-export commonly used types
pub use events::{
    ChallengeDetectedEvent, ChallengeResolvedEvent, EventDispatcher, EventHandler, InterceptEvent,
    LoggingHandler, ResolutionFailedEvent,
};
