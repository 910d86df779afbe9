//! Base stats and modifier resolution.
//!
//! A participant carries a fixed set of core combat stats plus an open-ended
//! bag of host-defined extras. Effective values are resolved by layering
//! status-effect modifiers on top of the base: flat bonuses first, then the
//! summed percentage bonuses as a final multiplier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::effects::{ModifierOp, StatModifier};

/// Canonical stat names used by the engine itself.
pub const STAT_ATTACK: &str = "attack";
pub const STAT_DEFENSE: &str = "defense";
pub const STAT_MAGIC_ATTACK: &str = "magic_attack";
pub const STAT_MAGIC_DEFENSE: &str = "magic_defense";
pub const STAT_SPEED: &str = "speed";

/// Base combat stats for one participant.
///
/// The named fields are the stats the engine reads directly (turn ordering
/// and flee use `speed`); `extra` holds any further stats a game module
/// defines for its own formulas (accuracy, lifesteal, resistances, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    pub attack: i32,
    pub defense: i32,
    pub magic_attack: i32,
    pub magic_defense: i32,
    pub speed: i32,
    #[serde(default)]
    pub extra: BTreeMap<String, i32>,
}

impl StatBlock {
    pub fn new(attack: i32, defense: i32, magic_attack: i32, magic_defense: i32, speed: i32) -> Self {
        Self {
            attack,
            defense,
            magic_attack,
            magic_defense,
            speed,
            extra: BTreeMap::new(),
        }
    }

    /// Looks up a stat by name, covering both the fixed fields and extras.
    ///
    /// Unknown names resolve to 0 so host formulas can probe optional stats
    /// without branching.
    pub fn get(&self, name: &str) -> i32 {
        match name {
            STAT_ATTACK => self.attack,
            STAT_DEFENSE => self.defense,
            STAT_MAGIC_ATTACK => self.magic_attack,
            STAT_MAGIC_DEFENSE => self.magic_defense,
            STAT_SPEED => self.speed,
            other => self.extra.get(other).copied().unwrap_or(0),
        }
    }

    /// Adds or replaces a host-defined extra stat. Returns self for chaining.
    pub fn with_extra(mut self, name: impl Into<String>, value: i32) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// Applies a set of modifiers to a base value.
///
/// Flat modifiers sum onto the base; percent modifiers sum together and scale
/// the result once. Each modifier's value is multiplied by the stack count of
/// the effect that carries it before being applied.
pub fn apply_modifiers<'a>(
    base: i32,
    modifiers: impl Iterator<Item = (&'a StatModifier, u32)>,
) -> i32 {
    let mut flat: i64 = 0;
    let mut percent: i64 = 0;

    for (modifier, stacks) in modifiers {
        let scaled = modifier.value as i64 * stacks as i64;
        match modifier.op {
            ModifierOp::Flat => flat += scaled,
            ModifierOp::Percent => percent += scaled,
        }
    }

    let with_flat = base as i64 + flat;
    let scaled = with_flat * (100 + percent) / 100;
    scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
