//! Cloneable façade for talking to the session worker.
//!
//! [`CombatHandle`] hides the channel plumbing and offers async helpers for
//! every registry operation plus event subscription. Clones share the same
//! worker, so a handle can be passed freely to connection tasks.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};

use combat_core::action::{Action, ActionResult, FleeOutcome, TurnOutcome};
use combat_core::state::{
    CombatOptions, CombatStatus, Participant, ParticipantId, Session, SessionId,
};
use combat_core::strategy::CombatSummary;

use crate::error::{Result, RuntimeError};
use crate::events::{CombatEvent, EventBus, Topic};
use crate::worker::Command;

/// Client-facing handle to the combat runtime.
#[derive(Clone)]
pub struct CombatHandle {
    command_tx: mpsc::Sender<Command>,
    events: EventBus,
}

impl CombatHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, events: EventBus) -> Self {
        Self { command_tx, events }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Starts a new session from the given participants.
    ///
    /// Fails when the list is empty or any participant is already engaged
    /// elsewhere; the existing registration is never overwritten.
    pub async fn start_combat(
        &self,
        participants: Vec<Participant>,
        options: CombatOptions,
    ) -> Result<Session> {
        self.request(|reply| Command::StartCombat {
            participants,
            options,
            reply,
        })
        .await?
    }

    /// Executes one action. Gameplay validation failures are reported inside
    /// the result, not as errors.
    pub async fn perform_action(
        &self,
        session: SessionId,
        action: Action,
    ) -> Result<ActionResult> {
        self.request(|reply| Command::PerformAction {
            session,
            action,
            reply,
        })
        .await
    }

    /// Rolls one escape attempt for a participant.
    pub async fn attempt_flee(
        &self,
        session: SessionId,
        participant: ParticipantId,
    ) -> Result<FleeOutcome> {
        self.request(|reply| Command::AttemptFlee {
            session,
            participant,
            reply,
        })
        .await
    }

    /// Moves a turn-based session to its next acting participant.
    pub async fn advance_turn(&self, session: SessionId) -> Result<TurnOutcome> {
        self.request(|reply| Command::AdvanceTurn { session, reply })
            .await
    }

    /// Ends a session unconditionally with the given terminal status.
    pub async fn end_combat(
        &self,
        session: SessionId,
        status: CombatStatus,
    ) -> Result<CombatSummary> {
        self.request(|reply| Command::EndCombat {
            session,
            status,
            reply,
        })
        .await?
    }

    /// Toggles auto-attack for a participant in a real-time session.
    pub async fn set_auto_attack(
        &self,
        session: SessionId,
        participant: ParticipantId,
        enabled: bool,
    ) -> Result<bool> {
        self.request(|reply| Command::SetAutoAttack {
            session,
            participant,
            enabled,
            reply,
        })
        .await
    }

    /// Read-only snapshot of a session, if it is still live.
    pub async fn session(&self, session: SessionId) -> Result<Option<Session>> {
        self.request(|reply| Command::GetSession { session, reply })
            .await
    }

    /// The session a participant is currently fighting in, if any.
    pub async fn participant_session(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<SessionId>> {
        self.request(|reply| Command::ParticipantSession { participant, reply })
            .await
    }

    pub async fn is_in_combat(&self, participant: ParticipantId) -> Result<bool> {
        self.request(|reply| Command::IsInCombat { participant, reply })
            .await
    }

    /// Advances logical time for every active real-time session, exactly as
    /// a scheduler tick would. Returns the number still active. This is how
    /// tests and headless hosts drive time deterministically.
    pub async fn advance_time(&self, elapsed: Duration) -> Result<usize> {
        self.request(|reply| Command::Tick {
            elapsed,
            from_driver: false,
            reply: Some(reply),
        })
        .await
    }

    /// Subscribes to events from a specific topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<CombatEvent> {
        self.events.subscribe(topic)
    }

    /// The underlying event bus, for transports that manage subscriptions
    /// themselves.
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }
}
