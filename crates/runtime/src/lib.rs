//! Async orchestration for the combat engine.
//!
//! This crate wires the pure [`combat_core`] rules into a running service: a
//! single worker task owns every live session and the participant index, a
//! shared tick driver paces real-time sessions, and a topic-based event bus
//! streams structured combat events to the hosting transport layer. Consumers
//! embed [`CombatRuntime`] and interact through cloneable [`CombatHandle`]s.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`handle`] exposes the client-facing API
//! - [`events`] provides the topic-based event bus
//! - `worker` and `scheduler` keep the background tasks internal
pub mod error;
pub mod events;
pub mod handle;
pub mod runtime;

mod scheduler;
mod worker;

pub use error::{Result, RuntimeError};
pub use events::{CombatEvent, EventBus, Topic};
pub use handle::CombatHandle;
pub use runtime::{CombatRuntime, CombatRuntimeBuilder, RuntimeConfig};
