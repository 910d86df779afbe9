//! Status effect system for participants.
//!
//! Buffs and debuffs are ordered, stackable records carrying stat modifiers
//! and an optional per-tick amount (heal-over-time for buffs, damage-over-time
//! for debuffs). The engine owns their advancement: round-based durations
//! decrement at round boundaries, time-based durations in the real-time tick
//! sweep. Hosts only ever add effects.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::common::ParticipantId;

/// Whether an effect helps or harms its carrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EffectPolarity {
    Buff,
    Debuff,
}

/// Remaining lifetime of an effect or cooldown.
///
/// Turn-based content uses `Rounds`; real-time content uses `Time`. A value
/// of `Rounds(0)` or a zero `Time` is already expired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectDuration {
    Rounds(u32),
    Time(Duration),
}

impl EffectDuration {
    pub fn is_expired(&self) -> bool {
        match self {
            EffectDuration::Rounds(rounds) => *rounds == 0,
            EffectDuration::Time(time) => time.is_zero(),
        }
    }

    /// Decrements a round-based duration by one round. Time durations are
    /// untouched; they only advance through [`EffectDuration::elapse`].
    pub(crate) fn pass_round(&mut self) {
        if let EffectDuration::Rounds(rounds) = self {
            *rounds = rounds.saturating_sub(1);
        }
    }

    /// Subtracts elapsed wall time from a time-based duration.
    pub(crate) fn elapse(&mut self, elapsed: Duration) {
        if let EffectDuration::Time(time) = self {
            *time = time.saturating_sub(elapsed);
        }
    }
}

/// How a [`StatModifier`] combines with the base stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierOp {
    Flat,
    Percent,
}

/// One stat adjustment carried by an effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModifier {
    /// Stat name as understood by [`super::stats::StatBlock::get`].
    pub stat: String,
    pub op: ModifierOp,
    pub value: i32,
}

impl StatModifier {
    pub fn flat(stat: impl Into<String>, value: i32) -> Self {
        Self {
            stat: stat.into(),
            op: ModifierOp::Flat,
            value,
        }
    }

    pub fn percent(stat: impl Into<String>, value: i32) -> Self {
        Self {
            stat: stat.into(),
            op: ModifierOp::Percent,
            value,
        }
    }
}

/// A buff or debuff attached to a participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Host-defined effect key; re-applying the same key stacks it.
    pub id: String,
    pub name: String,
    /// Participant that applied the effect; credited as killer for lethal
    /// damage-over-time ticks.
    pub source: ParticipantId,
    pub polarity: EffectPolarity,
    pub remaining: EffectDuration,
    pub stacks: u32,
    pub modifiers: Vec<StatModifier>,
    /// Heal per tick for buffs, damage per tick for debuffs, scaled by stacks.
    pub tick_amount: Option<u32>,
}

impl StatusEffect {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: ParticipantId,
        polarity: EffectPolarity,
        remaining: EffectDuration,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            polarity,
            remaining,
            stacks: 1,
            modifiers: Vec::new(),
            tick_amount: None,
        }
    }

    pub fn with_modifier(mut self, modifier: StatModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_tick_amount(mut self, amount: u32) -> Self {
        self.tick_amount = Some(amount);
        self
    }

    pub fn with_stacks(mut self, stacks: u32) -> Self {
        self.stacks = stacks.max(1);
        self
    }
}

/// A pending heal-over-time or damage-over-time application produced by
/// advancing effects. The engine turns these into health changes and log
/// entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectTick {
    pub effect_id: String,
    pub effect_name: String,
    pub source: ParticipantId,
    pub polarity: EffectPolarity,
    pub amount: u32,
}

/// Ordered collection of active effects on one participant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffects {
    effects: Vec<StatusEffect>,
}

impl StatusEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an effect. Re-applying an effect with a known id adds its stacks
    /// and extends the duration to the later of the two.
    pub fn add(&mut self, effect: StatusEffect) {
        if let Some(existing) = self.effects.iter_mut().find(|e| e.id == effect.id) {
            existing.stacks += effect.stacks;
            existing.remaining = match (existing.remaining, effect.remaining) {
                (EffectDuration::Rounds(a), EffectDuration::Rounds(b)) => {
                    EffectDuration::Rounds(a.max(b))
                }
                (EffectDuration::Time(a), EffectDuration::Time(b)) => {
                    EffectDuration::Time(a.max(b))
                }
                (_, incoming) => incoming,
            };
            return;
        }
        self.effects.push(effect);
    }

    /// Removes an effect by id immediately. Returns true if it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.id != id);
        self.effects.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&StatusEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Iterates the modifiers that apply to `stat`, paired with the stack
    /// count of their carrying effect.
    pub fn modifiers_for<'a>(
        &'a self,
        stat: &'a str,
    ) -> impl Iterator<Item = (&'a StatModifier, u32)> {
        self.effects.iter().flat_map(move |effect| {
            effect
                .modifiers
                .iter()
                .filter(move |m| m.stat == stat)
                .map(move |m| (m, effect.stacks))
        })
    }

    /// Advances round-based effects by one round.
    ///
    /// Returns the pending tick applications (computed before the decrement,
    /// so a one-round effect ticks once) and the effects that expired.
    pub fn advance_round(&mut self) -> (Vec<EffectTick>, Vec<StatusEffect>) {
        self.advance(|remaining| matches!(remaining, EffectDuration::Rounds(_)), |remaining| {
            remaining.pass_round();
        })
    }

    /// Advances time-based effects by one effect tick of length `step`.
    pub fn advance_time(&mut self, step: Duration) -> (Vec<EffectTick>, Vec<StatusEffect>) {
        self.advance(
            |remaining| matches!(remaining, EffectDuration::Time(_)),
            |remaining| remaining.elapse(step),
        )
    }

    fn advance(
        &mut self,
        applies: impl Fn(&EffectDuration) -> bool,
        decrement: impl Fn(&mut EffectDuration),
    ) -> (Vec<EffectTick>, Vec<StatusEffect>) {
        let mut ticks = Vec::new();

        for effect in self.effects.iter_mut() {
            if !applies(&effect.remaining) || effect.remaining.is_expired() {
                continue;
            }
            if let Some(amount) = effect.tick_amount {
                ticks.push(EffectTick {
                    effect_id: effect.id.clone(),
                    effect_name: effect.name.clone(),
                    source: effect.source,
                    polarity: effect.polarity,
                    amount: amount.saturating_mul(effect.stacks),
                });
            }
            decrement(&mut effect.remaining);
        }

        let mut expired = Vec::new();
        self.effects.retain(|effect| {
            if effect.remaining.is_expired() {
                expired.push(effect.clone());
                false
            } else {
                true
            }
        });

        (ticks, expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poison(rounds: u32) -> StatusEffect {
        StatusEffect::new(
            "poison",
            "Poison",
            ParticipantId(7),
            EffectPolarity::Debuff,
            EffectDuration::Rounds(rounds),
        )
        .with_tick_amount(5)
    }

    #[test]
    fn reapplying_stacks_and_extends() {
        let mut effects = StatusEffects::new();
        effects.add(poison(2));
        effects.add(poison(4));

        let effect = effects.get("poison").unwrap();
        assert_eq!(effect.stacks, 2);
        assert_eq!(effect.remaining, EffectDuration::Rounds(4));
    }

    #[test]
    fn round_advancement_ticks_then_expires() {
        let mut effects = StatusEffects::new();
        effects.add(poison(2));

        let (ticks, expired) = effects.advance_round();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].amount, 5);
        assert!(expired.is_empty());

        let (ticks, expired) = effects.advance_round();
        assert_eq!(ticks.len(), 1);
        assert_eq!(expired.len(), 1);
        assert!(effects.is_empty());
    }

    #[test]
    fn time_advancement_ignores_round_effects() {
        let mut effects = StatusEffects::new();
        effects.add(poison(3));

        let (ticks, expired) = effects.advance_time(Duration::from_secs(1));
        assert!(ticks.is_empty());
        assert!(expired.is_empty());
        assert_eq!(effects.get("poison").unwrap().remaining, EffectDuration::Rounds(3));
    }

    #[test]
    fn tick_amount_scales_with_stacks() {
        let mut effects = StatusEffects::new();
        effects.add(poison(3).with_stacks(3));

        let (ticks, _) = effects.advance_round();
        assert_eq!(ticks[0].amount, 15);
    }

    #[test]
    fn time_effect_expires_after_duration() {
        let mut effects = StatusEffects::new();
        effects.add(
            StatusEffect::new(
                "regen",
                "Regeneration",
                ParticipantId(1),
                EffectPolarity::Buff,
                EffectDuration::Time(Duration::from_secs(2)),
            )
            .with_tick_amount(3),
        );

        let (ticks, expired) = effects.advance_time(Duration::from_secs(1));
        assert_eq!(ticks.len(), 1);
        assert!(expired.is_empty());

        let (ticks, expired) = effects.advance_time(Duration::from_secs(1));
        assert_eq!(ticks.len(), 1);
        assert_eq!(expired.len(), 1);
        assert!(effects.is_empty());
    }
}
