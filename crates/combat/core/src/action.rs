//! Combat actions and their results.

use serde::{Deserialize, Serialize};

use crate::state::{AbilityId, CombatStatus, ParticipantId};
use crate::strategy::DamageType;

/// What a combatant is attempting this action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    Attack,
    Ability,
    Item,
    Defend,
    Flee,
    Skip,
}

/// One combat action as issued by the message layer or an AI hook.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub source: ParticipantId,
    pub targets: Vec<ParticipantId>,
    /// Ability key for `Ability`, item key for `Item`.
    pub ability: Option<AbilityId>,
    /// Streak bonus forwarded into the host's damage formula; 1.0 when the
    /// host does not track combos.
    pub combo_multiplier: f64,
}

impl Action {
    fn new(kind: ActionKind, source: ParticipantId) -> Self {
        Self {
            kind,
            source,
            targets: Vec::new(),
            ability: None,
            combo_multiplier: 1.0,
        }
    }

    pub fn attack(source: ParticipantId, target: ParticipantId) -> Self {
        let mut action = Self::new(ActionKind::Attack, source);
        action.targets.push(target);
        action
    }

    pub fn ability(
        source: ParticipantId,
        ability: AbilityId,
        targets: Vec<ParticipantId>,
    ) -> Self {
        let mut action = Self::new(ActionKind::Ability, source);
        action.ability = Some(ability);
        action.targets = targets;
        action
    }

    pub fn item(source: ParticipantId, item: AbilityId, target: ParticipantId) -> Self {
        let mut action = Self::new(ActionKind::Item, source);
        action.ability = Some(item);
        action.targets.push(target);
        action
    }

    pub fn defend(source: ParticipantId) -> Self {
        Self::new(ActionKind::Defend, source)
    }

    pub fn flee(source: ParticipantId) -> Self {
        Self::new(ActionKind::Flee, source)
    }

    pub fn skip(source: ParticipantId) -> Self {
        Self::new(ActionKind::Skip, source)
    }

    pub fn with_combo_multiplier(mut self, multiplier: f64) -> Self {
        self.combo_multiplier = multiplier;
        self
    }
}

/// One per-target outcome recorded while processing an action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionEffect {
    pub target: ParticipantId,
    pub kind: ActionEffectKind,
    pub amount: u32,
    pub critical: bool,
    pub damage_type: Option<DamageType>,
    pub element: Option<String>,
    /// Damage beyond the health the target had left.
    pub overkill: u32,
    /// True when this effect reduced the target to zero health.
    pub killed: bool,
}

/// Direction of an [`ActionEffect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ActionEffectKind {
    Damage,
    Heal,
    Miss,
}

/// Result of one flee attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FleeOutcome {
    pub success: bool,
    /// The computed escape chance, for transparency in logs and UIs.
    pub chance: f64,
    pub message: String,
    /// Suggested health penalty for a failed attempt. The engine deducts
    /// nothing; applying it is the caller's decision.
    pub penalty: Option<u32>,
}

/// Result of one turn advancement in a turn-based session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// Participant whose turn begins, when advancement succeeded and the
    /// session is still running.
    pub participant: Option<ParticipantId>,
    pub round: u32,
    /// Terminal status reached during advancement (damage-over-time deaths).
    pub ended: Option<CombatStatus>,
}

impl TurnOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            participant: None,
            round: 0,
            ended: None,
        }
    }
}

/// Outcome of [`crate::engine::perform_action`].
///
/// Validation problems are reported here with `success == false` and a
/// descriptive message; they are deliberately not `Err` values so callers
/// branch on the result instead of catching failures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub error: Option<String>,
    pub effects: Vec<ActionEffect>,
    /// Present when the action was a flee attempt.
    pub fled: Option<FleeOutcome>,
    /// Terminal status the session reached as a consequence of this action.
    pub ended: Option<CombatStatus>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            effects: Vec::new(),
            fled: None,
            ended: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            effects: Vec::new(),
            fled: None,
            ended: None,
        }
    }
}
