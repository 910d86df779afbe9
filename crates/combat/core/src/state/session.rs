//! Session state: one live encounter.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{GameId, ParticipantId, SessionId, Team};
use super::log::CombatLog;
use super::participant::{Participant, ParticipantKind};

/// How a session advances: explicit turns or the shared background tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CombatMode {
    TurnBased,
    RealTime,
}

/// Session lifecycle status.
///
/// Transitions monotonically from `Active` to exactly one terminal value and
/// never back; [`Session::finish`] enforces this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CombatStatus {
    Active,
    Victory,
    Defeat,
    Fled,
    Timeout,
}

impl CombatStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CombatStatus::Active)
    }
}

/// Options supplied by the host when starting a session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CombatOptions {
    pub game: GameId,
    pub mode: Option<CombatMode>,
    /// Free-form per-game payload stored on the session.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Initial auto-attack toggle for every participant (real-time only).
    #[serde(default)]
    pub auto_attack: bool,
}

/// Auxiliary state kept only for real-time sessions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeState {
    /// Last auto-attack instant per participant, maintained by the host's
    /// tick hook.
    pub last_attack: HashMap<ParticipantId, DateTime<Utc>>,
    /// Per-participant auto-attack toggles.
    pub auto_attack: HashMap<ParticipantId, bool>,
    /// Logical time accumulated toward the next effect tick.
    pub effect_clock: Duration,
    /// Logical time since the last action, for the idle-timeout policy.
    pub idle: Duration,
}

/// One live combat encounter.
///
/// A session exclusively owns its participants and log for its lifetime. It
/// is created only by the registry's start operation, mutated only by the
/// action processor, tick sweep, and flee resolver, and destroyed only by
/// the end operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub game: GameId,
    pub mode: CombatMode,
    pub participants: Vec<Participant>,
    /// Acting order for turn-based sessions; a permutation of the living
    /// participants present at session start. Empty in real-time mode.
    pub turn_order: Vec<ParticipantId>,
    pub turn_index: usize,
    pub round: u32,
    pub status: CombatStatus,
    pub created_at: DateTime<Utc>,
    pub last_action_at: DateTime<Utc>,
    pub log: CombatLog,
    /// Free-form per-game payload.
    #[serde(default)]
    pub data: serde_json::Value,
    pub realtime: Option<RealtimeState>,
}

impl Session {
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Participants still alive and engaged; the set the termination check
    /// and targeting rules operate on.
    pub fn active_combatants(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(|p| p.is_alive && p.in_combat)
    }

    /// Distinct teams with at least one active combatant.
    pub fn teams_standing(&self) -> BTreeSet<Team> {
        self.active_combatants().map(|p| p.team).collect()
    }

    /// True when any active combatant is a player character.
    pub fn player_remains(&self) -> bool {
        self.active_combatants()
            .any(|p| p.kind == ParticipantKind::Player)
    }

    /// The participant whose turn it currently is (turn-based only).
    pub fn current_participant(&self) -> Option<ParticipantId> {
        self.turn_order.get(self.turn_index).copied()
    }

    /// Refreshes the last-action timestamp and resets real-time idle time.
    pub fn touch(&mut self) {
        self.last_action_at = Utc::now();
        if let Some(realtime) = self.realtime.as_mut() {
            realtime.idle = Duration::ZERO;
        }
    }

    /// Moves the session to a terminal status. Returns false (and changes
    /// nothing) if the session already ended; the first terminal status wins.
    pub fn finish(&mut self, status: CombatStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    pub fn is_active(&self) -> bool {
        self.status == CombatStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::common::ResourceMeter;
    use crate::state::stats::StatBlock;

    fn session_with(participants: Vec<Participant>) -> Session {
        Session {
            id: SessionId(1),
            game: GameId(0),
            mode: CombatMode::TurnBased,
            participants,
            turn_order: Vec::new(),
            turn_index: 0,
            round: 1,
            status: CombatStatus::Active,
            created_at: Utc::now(),
            last_action_at: Utc::now(),
            log: CombatLog::new(),
            data: serde_json::Value::Null,
            realtime: None,
        }
    }

    fn combatant(id: u64, kind: ParticipantKind, team: u8) -> Participant {
        let mut p = Participant::new(
            ParticipantId(id),
            format!("p{id}"),
            kind,
            Team(team),
            ResourceMeter::full(100),
            ResourceMeter::full(0),
            StatBlock::default(),
        );
        p.in_combat = true;
        p
    }

    #[test]
    fn status_transitions_are_monotonic() {
        let mut session = session_with(vec![combatant(1, ParticipantKind::Player, 0)]);

        assert!(session.finish(CombatStatus::Victory));
        assert!(!session.finish(CombatStatus::Defeat));
        assert_eq!(session.status, CombatStatus::Victory);
    }

    #[test]
    fn teams_standing_ignores_dead_and_departed() {
        let mut session = session_with(vec![
            combatant(1, ParticipantKind::Player, 0),
            combatant(2, ParticipantKind::Hostile, 1),
            combatant(3, ParticipantKind::Hostile, 1),
        ]);

        assert_eq!(session.teams_standing().len(), 2);

        session.participant_mut(ParticipantId(2)).unwrap().apply_damage(100);
        session.participant_mut(ParticipantId(3)).unwrap().leave_combat();
        assert_eq!(session.teams_standing().len(), 1);
        assert!(session.player_remains());
    }
}
