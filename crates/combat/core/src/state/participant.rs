//! Combatant records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::common::{AbilityId, ParticipantId, ResourceMeter, Team};
use super::effects::{EffectDuration, StatusEffects};
use super::stats::{self, StatBlock};
use super::threat::ThreatTable;

/// What a combatant is, for targeting and victory attribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantKind {
    /// A connected player character.
    Player,
    /// A friendly entity fighting alongside players (pet, summon, guard).
    Ally,
    /// A hostile entity.
    Hostile,
}

/// One combatant inside a session.
///
/// Base stats and identity come from the external entity layer; everything
/// else (health changes, effects, threat, cooldowns) is mutated exclusively
/// by the engine for the session's lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub kind: ParticipantKind,
    pub team: Team,
    pub health: ResourceMeter,
    /// Secondary pool (mana, energy, rage); spent and regenerated entirely by
    /// host formulas and tick hooks.
    pub power: ResourceMeter,
    pub stats: StatBlock,
    pub effects: StatusEffects,
    pub cooldowns: HashMap<AbilityId, EffectDuration>,
    pub threat: ThreatTable,
    pub in_combat: bool,
    pub is_alive: bool,
    pub abilities: Vec<AbilityId>,
    /// Free-form per-game payload carried through untouched.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Outcome of applying damage to a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageApplied {
    /// Health actually removed.
    pub dealt: u32,
    /// Damage beyond the health that remained.
    pub overkill: u32,
    /// True when this application reduced health to zero.
    pub died: bool,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        name: impl Into<String>,
        kind: ParticipantKind,
        team: Team,
        health: ResourceMeter,
        power: ResourceMeter,
        stats: StatBlock,
    ) -> Self {
        let is_alive = health.current > 0;
        Self {
            id,
            name: name.into(),
            kind,
            team,
            health,
            power,
            stats,
            effects: StatusEffects::new(),
            cooldowns: HashMap::new(),
            threat: ThreatTable::new(),
            in_combat: false,
            is_alive,
            abilities: Vec::new(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_abilities(mut self, abilities: Vec<AbilityId>) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Resolves a stat through the active effect modifiers.
    pub fn effective_stat(&self, name: &str) -> i32 {
        stats::apply_modifiers(self.stats.get(name), self.effects.modifiers_for(name))
    }

    pub fn knows_ability(&self, ability: &AbilityId) -> bool {
        self.abilities.iter().any(|a| a == ability)
    }

    /// Remaining cooldown for an ability, ignoring expired entries.
    pub fn cooldown_remaining(&self, ability: &AbilityId) -> Option<EffectDuration> {
        self.cooldowns
            .get(ability)
            .copied()
            .filter(|d| !d.is_expired())
    }

    /// Applies damage, clamped at zero. Flips `is_alive` and `in_combat`
    /// when health reaches zero.
    pub fn apply_damage(&mut self, amount: u32) -> DamageApplied {
        let dealt = self.health.deduct(amount);
        let overkill = amount - dealt;
        let died = self.is_alive && self.health.is_empty();
        if died {
            self.is_alive = false;
            self.in_combat = false;
        }
        DamageApplied {
            dealt,
            overkill,
            died,
        }
    }

    /// Applies healing, clamped at the maximum. Returns the amount restored.
    /// Healing never revives: a dead participant is left untouched.
    pub fn apply_heal(&mut self, amount: u32) -> u32 {
        if !self.is_alive {
            return 0;
        }
        self.health.restore(amount)
    }

    /// Removes the participant from active combat, dropping combat-scoped
    /// state (effects, threat, cooldowns). Used on successful flee and at
    /// session teardown.
    pub fn leave_combat(&mut self) {
        self.in_combat = false;
        self.effects.clear();
        self.threat.clear();
        self.cooldowns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::effects::{EffectPolarity, StatModifier, StatusEffect};

    fn hero(health: u32) -> Participant {
        Participant::new(
            ParticipantId(1),
            "Hero",
            ParticipantKind::Player,
            Team(0),
            ResourceMeter::full(health),
            ResourceMeter::full(50),
            StatBlock::new(10, 5, 0, 0, 12),
        )
    }

    #[test]
    fn lethal_damage_flips_flags_and_reports_overkill() {
        let mut p = hero(100);
        p.in_combat = true;

        let hit = p.apply_damage(130);
        assert_eq!(hit.dealt, 100);
        assert_eq!(hit.overkill, 30);
        assert!(hit.died);
        assert!(!p.is_alive);
        assert!(!p.in_combat);
    }

    #[test]
    fn death_is_reported_once() {
        let mut p = hero(40);
        assert!(p.apply_damage(40).died);
        assert!(!p.apply_damage(10).died);
    }

    #[test]
    fn healing_respects_maximum_and_death() {
        let mut p = hero(100);
        p.apply_damage(30);
        assert_eq!(p.apply_heal(50), 30);
        assert_eq!(p.health.current, 100);

        p.apply_damage(200);
        assert_eq!(p.apply_heal(50), 0);
        assert_eq!(p.health.current, 0);
    }

    #[test]
    fn effective_stat_layers_effect_modifiers() {
        let mut p = hero(100);
        p.effects.add(
            StatusEffect::new(
                "haste",
                "Haste",
                ParticipantId(2),
                EffectPolarity::Buff,
                EffectDuration::Rounds(3),
            )
            .with_modifier(StatModifier::percent("speed", 50)),
        );

        assert_eq!(p.effective_stat("speed"), 18);
        assert_eq!(p.effective_stat("attack"), 10);
    }
}
