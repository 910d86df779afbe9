//! The host-supplied strategy surface.
//!
//! All game-specific combat math lives behind [`CombatStrategy`]. The two
//! required methods cover the calculations every game must define; the rest
//! are optional capabilities with neutral default bodies, so a host opts in
//! by overriding. Implementing the trait is what validates a configuration:
//! a strategy without the required formulas does not compile, and the
//! runtime builder refuses to start without one installed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::state::{
    AbilityId, CombatLog, CombatStatus, EffectDuration, GameId, Participant, ParticipantId,
    Session, SessionId,
};

/// Inputs to the host's damage formula for one attacker/defender pair.
#[derive(Clone, Copy, Debug)]
pub struct DamageRequest<'a> {
    pub attacker: &'a Participant,
    pub defender: &'a Participant,
    pub ability: Option<&'a AbilityId>,
    pub is_basic_attack: bool,
    pub combo_multiplier: f64,
    /// Result of the engine's critical roll when the strategy provides
    /// [`CombatStrategy::critical_chance`]; false otherwise.
    pub is_critical: bool,
}

/// What the host's damage formula decided.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageOutcome {
    pub amount: u32,
    pub critical: bool,
    pub damage_type: DamageType,
    pub element: Option<String>,
    /// Damage prevented by the defender's mitigation, informational only.
    pub blocked: u32,
    /// Damage soaked by shields or absorption effects, informational only.
    pub absorbed: u32,
}

impl DamageOutcome {
    /// A plain physical hit of `amount`, useful for simple games and tests.
    pub fn flat(amount: u32) -> Self {
        Self {
            amount,
            critical: false,
            damage_type: DamageType::Physical,
            element: None,
            blocked: 0,
            absorbed: 0,
        }
    }
}

/// Broad damage classification carried on outcomes and log entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DamageType {
    Physical,
    Magical,
    /// Ignores mitigation by convention; the engine does not enforce this,
    /// host formulas do.
    True,
}

/// What using an item does, as decided by the optional `use_item` hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemUse {
    Heal(u32),
    Damage(u32),
}

/// Rewards granted at session end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBundle {
    pub experience: u64,
    pub currency: u64,
    pub items: Vec<String>,
}

impl RewardBundle {
    /// The placeholder handed to `on_combat_end` when the host registers no
    /// reward hook.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Result summary handed to [`CombatStrategy::on_combat_end`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombatSummary {
    pub session: SessionId,
    pub game: GameId,
    pub status: CombatStatus,
    pub duration: Duration,
    pub rounds: u32,
    /// Participants still alive at the end.
    pub winners: Vec<ParticipantId>,
    /// Participants dead at the end.
    pub losers: Vec<ParticipantId>,
    pub rewards: RewardBundle,
    pub log: CombatLog,
}

/// Game-specific combat math and lifecycle hooks.
///
/// `calculate_damage` and `calculate_healing` are required. Every other
/// method is an optional capability: the default bodies return `None` or do
/// nothing, and the engine treats `None` as "capability absent".
pub trait CombatStrategy: Send + Sync {
    // ------------------------------------------------------------------
    // Required formulas
    // ------------------------------------------------------------------

    /// Computes the damage of one attack or hostile ability application.
    fn calculate_damage(&self, request: &DamageRequest<'_>) -> DamageOutcome;

    /// Computes the healing of one friendly ability application.
    fn calculate_healing(
        &self,
        healer: &Participant,
        target: &Participant,
        ability: &AbilityId,
    ) -> u32;

    // ------------------------------------------------------------------
    // Optional capabilities
    // ------------------------------------------------------------------

    /// Custom initial turn order. Must be a permutation of the living
    /// participants; the default order (descending speed, stable ties) is
    /// used when this returns `None`.
    fn turn_order(&self, _participants: &[Participant]) -> Option<Vec<ParticipantId>> {
        None
    }

    /// Chance in `[0, 1]` that an attack connects. When present, the engine
    /// rolls once per target and records a miss instead of damage on failure.
    fn hit_chance(&self, _attacker: &Participant, _defender: &Participant) -> Option<f64> {
        None
    }

    /// Chance in `[0, 1]` of a critical hit. When present, the engine rolls
    /// once per target and passes the result in [`DamageRequest::is_critical`].
    fn critical_chance(&self, _attacker: &Participant, _defender: &Participant) -> Option<f64> {
        None
    }

    /// Flat adjustment layered onto a participant's effective stat, for
    /// games with stat sources the effect system does not model.
    fn stat_modifier(&self, _participant: &Participant, _stat: &str) -> Option<i32> {
        None
    }

    /// Cooldown to record after a successful use of `ability`.
    fn ability_cooldown(&self, _ability: &AbilityId) -> Option<EffectDuration> {
        None
    }

    /// Resolves an `Item` action. Items fail softly when this is absent.
    fn use_item(
        &self,
        _user: &Participant,
        _target: &Participant,
        _item: &AbilityId,
    ) -> Option<ItemUse> {
        None
    }

    /// Selects an action for an AI-controlled participant. The threat tables
    /// on each participant are the intended targeting input.
    fn ai_action(&self, _session: &Session, _actor: &Participant) -> Option<Action> {
        None
    }

    /// Rewards for the surviving side. The default is the empty bundle.
    fn generate_rewards(&self, _session: &Session, _winners: &[ParticipantId]) -> RewardBundle {
        RewardBundle::empty()
    }

    // ------------------------------------------------------------------
    // Lifecycle callbacks
    // ------------------------------------------------------------------

    /// Invoked after a session is registered, before any action runs.
    fn on_combat_start(&self, _session: &Session) {}

    /// Invoked with the final summary after the terminal log entry is
    /// written and before the session is dismantled.
    fn on_combat_end(&self, _summary: &CombatSummary) {}

    /// Invoked once per death, with the participant credited for the kill.
    fn on_participant_death(
        &self,
        _session: &Session,
        _victim: ParticipantId,
        _killer: ParticipantId,
    ) {
    }

    /// Invoked once per scheduler tick for every active real-time session,
    /// after the engine has advanced timed effects. Auto-attack resolution
    /// and resource regeneration live here.
    fn on_combat_tick(&self, _session: &mut Session) {}
}
