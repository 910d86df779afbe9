//! Runtime orchestrator and builder.
//!
//! [`CombatRuntime`] spawns the session worker, wires the command channel and
//! event bus, and hands out cloneable [`CombatHandle`]s. The builder is where
//! a strategy configuration is installed; building without one is refused up
//! front rather than failing mid-combat.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use combat_core::strategy::CombatStrategy;
use combat_core::{EngineConfig, RandomSource};

use crate::error::{Result, RuntimeError};
use crate::events::{CombatEvent, EventBus, Topic};
use crate::handle::CombatHandle;
use crate::worker::SessionWorker;

/// Runtime configuration shared across the orchestrator and worker.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            event_buffer_size: 100,
            command_buffer_size: 32,
        }
    }
}

/// Main runtime owning the session worker task.
///
/// [`CombatHandle`] provides a cloneable façade for clients; the runtime
/// itself is kept by whoever manages the process lifecycle.
pub struct CombatRuntime {
    handle: CombatHandle,
    worker_handle: JoinHandle<()>,
}

impl CombatRuntime {
    /// Creates a new runtime builder.
    pub fn builder() -> CombatRuntimeBuilder {
        CombatRuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime.
    pub fn handle(&self) -> CombatHandle {
        self.handle.clone()
    }

    /// Subscribe to combat events on a topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<CombatEvent> {
        self.handle.subscribe(topic)
    }

    /// Shuts the runtime down gracefully.
    ///
    /// Drops this runtime's handle and waits for the worker to drain; any
    /// handles still held by clients keep the worker alive until they drop.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);
        self.worker_handle.await.map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`CombatRuntime`].
pub struct CombatRuntimeBuilder {
    config: RuntimeConfig,
    strategy: Option<Arc<dyn CombatStrategy>>,
    rng: Option<Box<dyn RandomSource>>,
}

impl CombatRuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            strategy: None,
            rng: None,
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine_config(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    /// Installs the game's strategy configuration. Required.
    pub fn strategy(mut self, strategy: impl CombatStrategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Installs an already-shared strategy.
    pub fn strategy_arc(mut self, strategy: Arc<dyn CombatStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Overrides the random source; tests inject deterministic sources here.
    pub fn random_source(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    /// Spawns the session worker and returns the runtime.
    pub fn build(self) -> Result<CombatRuntime> {
        let strategy = self.strategy.ok_or(RuntimeError::MissingStrategy)?;
        let rng = self
            .rng
            .unwrap_or_else(|| Box::new(EntropyRandom::new()));

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let events = EventBus::with_capacity(self.config.event_buffer_size);

        let worker = SessionWorker::new(
            self.config.engine,
            strategy,
            rng,
            command_rx,
            command_tx.downgrade(),
            events.clone(),
        );
        let worker_handle = tokio::spawn(worker.run());

        Ok(CombatRuntime {
            handle: CombatHandle::new(command_tx, events),
            worker_handle,
        })
    }
}

/// Entropy-seeded random source used when the builder gets no override.
struct EntropyRandom(StdRng);

impl EntropyRandom {
    fn new() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl RandomSource for EntropyRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.gen_range(0.0..1.0)
    }
}
