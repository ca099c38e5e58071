//! Streaming Frontend: per-Run event bus and the event taxonomy it carries.

pub mod bus;
pub mod events;

pub use bus::RunBus;
pub use events::StreamEvent;
