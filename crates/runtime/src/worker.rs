//! Session store worker that owns every live combat session.
//!
//! One task holds all session state and the participant index; every external
//! request travels over the command channel and is processed one at a time,
//! so lookups are linearizable with starts and ends and a participant can
//! never be claimed by two sessions. The worker also runs the tick sweep for
//! real-time sessions and lazily spawns the shared tick driver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use combat_core::action::{Action, ActionEffectKind, ActionResult, FleeOutcome, TurnOutcome};
use combat_core::state::{
    CombatMode, CombatOptions, CombatStatus, Participant, ParticipantId, Session, SessionId,
};
use combat_core::strategy::{CombatStrategy, CombatSummary};
use combat_core::{EngineConfig, RandomSource, engine};

use crate::error::{Result, RuntimeError};
use crate::events::{CombatEvent, EventBus};
use crate::scheduler::TickDriver;

/// Commands processed by the session worker.
pub(crate) enum Command {
    StartCombat {
        participants: Vec<Participant>,
        options: CombatOptions,
        reply: oneshot::Sender<Result<Session>>,
    },
    PerformAction {
        session: SessionId,
        action: Action,
        reply: oneshot::Sender<ActionResult>,
    },
    AttemptFlee {
        session: SessionId,
        participant: ParticipantId,
        reply: oneshot::Sender<FleeOutcome>,
    },
    AdvanceTurn {
        session: SessionId,
        reply: oneshot::Sender<TurnOutcome>,
    },
    EndCombat {
        session: SessionId,
        status: CombatStatus,
        reply: oneshot::Sender<Result<CombatSummary>>,
    },
    SetAutoAttack {
        session: SessionId,
        participant: ParticipantId,
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    GetSession {
        session: SessionId,
        reply: oneshot::Sender<Option<Session>>,
    },
    ParticipantSession {
        participant: ParticipantId,
        reply: oneshot::Sender<Option<SessionId>>,
    },
    IsInCombat {
        participant: ParticipantId,
        reply: oneshot::Sender<bool>,
    },
    /// Advance logical time for every active real-time session. The reply
    /// carries the number that remain active so the tick driver knows when
    /// to retire. `from_driver` distinguishes driver ticks from manual
    /// advancement; only a driver tick may mark the driver as retired.
    Tick {
        elapsed: Duration,
        from_driver: bool,
        reply: Option<oneshot::Sender<usize>>,
    },
}

/// Background task owning the session map and participant index.
pub(crate) struct SessionWorker {
    config: EngineConfig,
    strategy: Arc<dyn CombatStrategy>,
    rng: Box<dyn RandomSource>,
    sessions: HashMap<SessionId, Session>,
    index: HashMap<ParticipantId, SessionId>,
    next_session_id: u64,
    command_rx: mpsc::Receiver<Command>,
    /// Weak handle for spawning tick drivers; weak so the worker's own
    /// channel use never keeps the runtime alive.
    driver_tx: mpsc::WeakSender<Command>,
    events: EventBus,
    driver_running: bool,
}

impl SessionWorker {
    pub(crate) fn new(
        config: EngineConfig,
        strategy: Arc<dyn CombatStrategy>,
        rng: Box<dyn RandomSource>,
        command_rx: mpsc::Receiver<Command>,
        driver_tx: mpsc::WeakSender<Command>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            strategy,
            rng,
            sessions: HashMap::new(),
            index: HashMap::new(),
            next_session_id: 1,
            command_rx,
            driver_tx,
            events,
            driver_running: false,
        }
    }

    /// Main worker loop; exits when every handle is dropped.
    pub(crate) async fn run(mut self) {
        while let Some(command) = self.command_rx.recv().await {
            self.handle_command(command);
        }
        debug!("session worker stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartCombat {
                participants,
                options,
                reply,
            } => {
                let result = self.handle_start(participants, options);
                if reply.send(result).is_err() {
                    debug!("StartCombat reply channel closed (caller dropped)");
                }
            }
            Command::PerformAction {
                session,
                action,
                reply,
            } => {
                let result = self.handle_action(session, action);
                if reply.send(result).is_err() {
                    debug!("PerformAction reply channel closed (caller dropped)");
                }
            }
            Command::AttemptFlee {
                session,
                participant,
                reply,
            } => {
                let result = self.handle_flee(session, participant);
                if reply.send(result).is_err() {
                    debug!("AttemptFlee reply channel closed (caller dropped)");
                }
            }
            Command::AdvanceTurn { session, reply } => {
                let result = self.handle_advance_turn(session);
                if reply.send(result).is_err() {
                    debug!("AdvanceTurn reply channel closed (caller dropped)");
                }
            }
            Command::EndCombat {
                session,
                status,
                reply,
            } => {
                let result = self
                    .finish_session(session, status)
                    .ok_or(RuntimeError::SessionNotFound(session));
                if reply.send(result).is_err() {
                    debug!("EndCombat reply channel closed (caller dropped)");
                }
            }
            Command::SetAutoAttack {
                session,
                participant,
                enabled,
                reply,
            } => {
                let updated = self.handle_set_auto_attack(session, participant, enabled);
                let _ = reply.send(updated);
            }
            Command::GetSession { session, reply } => {
                let _ = reply.send(self.sessions.get(&session).cloned());
            }
            Command::ParticipantSession { participant, reply } => {
                let _ = reply.send(self.index.get(&participant).copied());
            }
            Command::IsInCombat { participant, reply } => {
                let _ = reply.send(self.index.contains_key(&participant));
            }
            Command::Tick {
                elapsed,
                from_driver,
                reply,
            } => {
                let remaining = self.handle_tick(elapsed, from_driver);
                if let Some(reply) = reply {
                    let _ = reply.send(remaining);
                }
            }
        }
    }

    fn handle_start(
        &mut self,
        participants: Vec<Participant>,
        options: CombatOptions,
    ) -> Result<Session> {
        // Refuse rather than silently steal a participant already fighting
        // elsewhere; the same id twice in one roster is the same conflict.
        let mut seen = HashSet::new();
        for participant in &participants {
            if self.index.contains_key(&participant.id) || !seen.insert(participant.id) {
                return Err(RuntimeError::ParticipantBusy(participant.id));
            }
        }

        let id = SessionId(self.next_session_id);
        let session = engine::start_session(id, options, participants, self.strategy.as_ref())?;
        self.next_session_id += 1;

        for participant in &session.participants {
            self.index.insert(participant.id, id);
        }
        self.strategy.on_combat_start(&session);
        self.events.publish(CombatEvent::CombatStarted {
            session: id,
            game: session.game,
            mode: session.mode,
            participants: session.participants.iter().map(|p| p.id).collect(),
        });
        info!(session = %id, mode = %session.mode, "combat session started");

        if session.mode == CombatMode::RealTime {
            self.ensure_driver();
        }

        let snapshot = session.clone();
        self.sessions.insert(id, session);
        Ok(snapshot)
    }

    fn handle_action(&mut self, id: SessionId, action: Action) -> ActionResult {
        let Some(session) = self.sessions.get_mut(&id) else {
            return ActionResult::failure(format!("combat session {id} not found"));
        };

        let result = engine::perform_action(
            session,
            &action,
            self.strategy.as_ref(),
            self.rng.as_mut(),
            &self.config,
        );
        if !result.success {
            return result;
        }

        for effect in &result.effects {
            let event = match effect.kind {
                ActionEffectKind::Damage => CombatEvent::Damage {
                    session: id,
                    source: action.source,
                    target: effect.target,
                    amount: effect.amount,
                    critical: effect.critical,
                },
                ActionEffectKind::Heal => CombatEvent::Heal {
                    session: id,
                    source: action.source,
                    target: effect.target,
                    amount: effect.amount,
                },
                ActionEffectKind::Miss => CombatEvent::Missed {
                    session: id,
                    source: action.source,
                    target: effect.target,
                },
            };
            self.events.publish(event);
            if effect.killed {
                self.events.publish(CombatEvent::Death {
                    session: id,
                    victim: effect.target,
                    killer: action.source,
                });
            }
        }

        if let Some(outcome) = &result.fled {
            self.events.publish(CombatEvent::FleeAttempted {
                session: id,
                participant: action.source,
                success: outcome.success,
                chance: outcome.chance,
            });
            // A successful escape releases the participant immediately, not
            // at session end.
            if outcome.success {
                self.index.remove(&action.source);
            }
        }

        self.events.publish(CombatEvent::ActionPerformed {
            session: id,
            action,
            effects: result.effects.clone(),
        });

        if let Some(status) = result.ended {
            self.finish_session(id, status);
        }
        result
    }

    fn handle_flee(&mut self, id: SessionId, participant: ParticipantId) -> FleeOutcome {
        let result = self.handle_action(id, Action::flee(participant));
        result.fled.unwrap_or_else(|| FleeOutcome {
            success: false,
            chance: 0.0,
            message: result
                .error
                .unwrap_or_else(|| "flee attempt was not processed".to_string()),
            penalty: None,
        })
    }

    fn handle_advance_turn(&mut self, id: SessionId) -> TurnOutcome {
        let Some(session) = self.sessions.get_mut(&id) else {
            return TurnOutcome::failure(format!("combat session {id} not found"));
        };

        let outcome = engine::advance_turn(session, self.strategy.as_ref());
        if outcome.success {
            self.events.publish(CombatEvent::TurnAdvanced {
                session: id,
                participant: outcome.participant,
                round: outcome.round,
            });
            if let Some(status) = outcome.ended {
                self.finish_session(id, status);
            }
        }
        outcome
    }

    fn handle_set_auto_attack(
        &mut self,
        id: SessionId,
        participant: ParticipantId,
        enabled: bool,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        if session.participant(participant).is_none() {
            return false;
        }
        match session.realtime.as_mut() {
            Some(realtime) => {
                realtime.auto_attack.insert(participant, enabled);
                true
            }
            None => false,
        }
    }

    /// Advances every active real-time session and reports how many remain.
    fn handle_tick(&mut self, elapsed: Duration, from_driver: bool) -> usize {
        let ticking: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.mode == CombatMode::RealTime && s.is_active())
            .map(|(&id, _)| id)
            .collect();

        for id in ticking {
            let Some(session) = self.sessions.get_mut(&id) else {
                continue;
            };
            let mut ended =
                engine::advance_time(session, elapsed, self.strategy.as_ref(), &self.config);
            if ended.is_none() {
                // Auto-attacks, regeneration, and anything else the host
                // wants per tick happen in its hook; recheck afterwards.
                self.strategy.on_combat_tick(session);
                ended = engine::check_termination(session);
            }
            if let Some(status) = ended {
                self.finish_session(id, status);
            }
        }

        let remaining = self
            .sessions
            .values()
            .filter(|s| s.mode == CombatMode::RealTime && s.is_active())
            .count();
        if remaining == 0 && from_driver && self.driver_running {
            self.driver_running = false;
            debug!("tick driver retiring; no real-time sessions remain");
        }
        remaining
    }

    /// Dismantles a session: index entries removed, final bookkeeping run,
    /// terminal event published. The id is dead afterwards.
    fn finish_session(&mut self, id: SessionId, status: CombatStatus) -> Option<CombatSummary> {
        let mut session = self.sessions.remove(&id)?;
        for participant in &session.participants {
            self.index.remove(&participant.id);
        }

        let summary = engine::end_session(&mut session, status, self.strategy.as_ref());
        info!(session = %id, status = %summary.status, "combat session ended");
        self.events.publish(CombatEvent::CombatEnded {
            session: id,
            status: summary.status,
            winners: summary.winners.clone(),
            losers: summary.losers.clone(),
            rounds: summary.rounds,
        });
        Some(summary)
    }

    fn ensure_driver(&mut self) {
        if self.driver_running {
            return;
        }
        let period = self.config.scheduler_period();
        // Detached on purpose; the driver retires itself via the tick reply.
        let _ = TickDriver::spawn(self.driver_tx.clone(), period);
        self.driver_running = true;
        debug!(?period, "tick driver started");
    }
}
