//! Events, envelopes, and the in-process notification bus.
//!
//! State changes are published as enveloped events; observers subscribe to the
//! bus and may fold events into projections (read models).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;
pub mod runner;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
pub use runner::{ProjectionError, ProjectionRunner};
