//! Topic-based event bus for combat observers.
//!
//! The hosting transport layer subscribes here and ships events to connected
//! clients in whatever wire format it likes; only the logical schema is this
//! crate's contract. Publishing is best-effort: a topic without subscribers
//! drops events silently.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use combat_core::action::{Action, ActionEffect};
use combat_core::state::{CombatMode, CombatStatus, GameId, ParticipantId, SessionId};

/// Topics for event routing.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Session starts and terminal outcomes.
    Lifecycle,
    /// Actions and their per-target consequences.
    Action,
    /// Turn progression in turn-based sessions.
    Turn,
}

const ALL_TOPICS: [Topic; 3] = [Topic::Lifecycle, Topic::Action, Topic::Turn];

/// Structured events published while sessions run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CombatEvent {
    CombatStarted {
        session: SessionId,
        game: GameId,
        mode: CombatMode,
        participants: Vec<ParticipantId>,
    },
    CombatEnded {
        session: SessionId,
        status: CombatStatus,
        winners: Vec<ParticipantId>,
        losers: Vec<ParticipantId>,
        rounds: u32,
    },
    /// One action was processed, with every per-target effect it produced.
    ActionPerformed {
        session: SessionId,
        action: Action,
        effects: Vec<ActionEffect>,
    },
    Damage {
        session: SessionId,
        source: ParticipantId,
        target: ParticipantId,
        amount: u32,
        critical: bool,
    },
    Heal {
        session: SessionId,
        source: ParticipantId,
        target: ParticipantId,
        amount: u32,
    },
    Missed {
        session: SessionId,
        source: ParticipantId,
        target: ParticipantId,
    },
    Death {
        session: SessionId,
        victim: ParticipantId,
        killer: ParticipantId,
    },
    FleeAttempted {
        session: SessionId,
        participant: ParticipantId,
        success: bool,
        chance: f64,
    },
    TurnAdvanced {
        session: SessionId,
        participant: Option<ParticipantId>,
        round: u32,
    },
}

impl CombatEvent {
    pub fn topic(&self) -> Topic {
        match self {
            CombatEvent::CombatStarted { .. } | CombatEvent::CombatEnded { .. } => Topic::Lifecycle,
            CombatEvent::ActionPerformed { .. }
            | CombatEvent::Damage { .. }
            | CombatEvent::Heal { .. }
            | CombatEvent::Missed { .. }
            | CombatEvent::Death { .. }
            | CombatEvent::FleeAttempted { .. } => Topic::Action,
            CombatEvent::TurnAdvanced { .. } => Topic::Turn,
        }
    }
}

/// Topic-based event bus.
///
/// Consumers subscribe to the topics they care about; the channel set is
/// fixed at construction so publishing never takes a lock.
pub struct EventBus {
    channels: Arc<HashMap<Topic, broadcast::Sender<CombatEvent>>>,
}

impl EventBus {
    /// Creates a bus with the default per-topic capacity.
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let channels = ALL_TOPICS
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity).0))
            .collect();
        Self {
            channels: Arc::new(channels),
        }
    }

    /// Publishes an event to its topic. Best-effort: without subscribers the
    /// event is dropped, which is normal rather than an error.
    pub fn publish(&self, event: CombatEvent) {
        let topic = event.topic();
        let sender = self
            .channels
            .get(&topic)
            .expect("all topics are created at construction");
        if sender.send(event).is_err() {
            tracing::trace!(?topic, "no subscribers for topic");
        }
    }

    /// Subscribes to a single topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<CombatEvent> {
        self.channels
            .get(&topic)
            .expect("all topics are created at construction")
            .subscribe()
    }

    /// Subscribes to several topics at once.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<CombatEvent>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
