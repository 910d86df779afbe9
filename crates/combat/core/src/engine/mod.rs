//! The action execution pipeline.
//!
//! Every session mutation flows through the functions here: session
//! construction, action processing, flee resolution, turn and tick
//! advancement, and teardown. Validation problems surface as soft
//! [`ActionResult`] failures; only construction can return a hard error.

mod flee;
mod tick;
mod turns;

pub use flee::{attempt_flee, flee_chance};
pub use tick::advance_time;
pub use turns::{advance_turn, default_turn_order};

use std::collections::BTreeSet;

use chrono::Utc;
use serde_json::json;

use crate::action::{Action, ActionEffect, ActionEffectKind, ActionKind, ActionResult};
use crate::config::EngineConfig;
use crate::error::CombatError;
use crate::rng::RandomSource;
use crate::state::{
    CombatLog, CombatMode, CombatOptions, CombatStatus, EffectDuration, EffectPolarity,
    EffectTick, LogEntry, LogEventKind, Participant, ParticipantId, RealtimeState, Session,
    SessionId, StatModifier, StatusEffect,
};
use crate::strategy::{CombatStrategy, CombatSummary, DamageRequest, ItemUse};

/// Resolves a participant's stat through effect modifiers and the optional
/// strategy adjustment.
pub fn effective_stat(
    participant: &Participant,
    stat: &str,
    strategy: &dyn CombatStrategy,
) -> i32 {
    participant.effective_stat(stat)
        + strategy.stat_modifier(participant, stat).unwrap_or(0)
}

/// Builds a new session from host-supplied participants.
///
/// Participants are normalized (`is_alive` from health, everyone engaged),
/// the initial turn order is computed for turn-based mode, and the opening
/// log entry is written. Lifecycle hooks are the registry's job: it invokes
/// `on_combat_start` once the session is registered.
pub fn start_session(
    id: SessionId,
    options: CombatOptions,
    mut participants: Vec<Participant>,
    strategy: &dyn CombatStrategy,
) -> Result<Session, CombatError> {
    if participants.is_empty() {
        return Err(CombatError::NoParticipants);
    }

    for participant in &mut participants {
        participant.is_alive = participant.health.current > 0;
        participant.in_combat = participant.is_alive;
    }

    let mode = options.mode.unwrap_or(CombatMode::TurnBased);

    let turn_order = match mode {
        CombatMode::TurnBased => match strategy.turn_order(&participants) {
            Some(order) => {
                validate_turn_order(&order, &participants)?;
                order
            }
            None => turns::default_turn_order(&participants, strategy),
        },
        CombatMode::RealTime => Vec::new(),
    };

    let realtime = (mode == CombatMode::RealTime).then(|| {
        let now = Utc::now();
        RealtimeState {
            last_attack: participants.iter().map(|p| (p.id, now)).collect(),
            auto_attack: participants
                .iter()
                .map(|p| (p.id, options.auto_attack))
                .collect(),
            ..RealtimeState::default()
        }
    });

    let now = Utc::now();
    let roster: Vec<u64> = participants.iter().map(|p| p.id.0).collect();
    let mut session = Session {
        id,
        game: options.game,
        mode,
        participants,
        turn_order,
        turn_index: 0,
        round: 1,
        status: CombatStatus::Active,
        created_at: now,
        last_action_at: now,
        log: CombatLog::new(),
        data: options.data,
        realtime,
    };

    session.log.append(
        LogEntry::new(
            1,
            LogEventKind::CombatStart,
            format!(
                "combat begins with {} combatants",
                session.participants.len()
            ),
        )
        .with_data(json!({ "mode": session.mode.to_string(), "participants": roster })),
    );

    Ok(session)
}

fn validate_turn_order(
    order: &[ParticipantId],
    participants: &[Participant],
) -> Result<(), CombatError> {
    let living: BTreeSet<ParticipantId> =
        participants.iter().filter(|p| p.is_alive).map(|p| p.id).collect();
    let ordered: BTreeSet<ParticipantId> = order.iter().copied().collect();
    if ordered.len() != order.len() || ordered != living {
        return Err(CombatError::InvalidTurnOrder);
    }
    Ok(())
}

/// Executes one combat action against a session.
///
/// Validation failures come back as soft results. On success the session's
/// last-action time is refreshed and termination is rechecked; a terminal
/// status reached here is marked on the session and reported in
/// [`ActionResult::ended`], leaving final bookkeeping to [`end_session`].
pub fn perform_action(
    session: &mut Session,
    action: &Action,
    strategy: &dyn CombatStrategy,
    rng: &mut dyn RandomSource,
    config: &EngineConfig,
) -> ActionResult {
    if !session.is_active() {
        return ActionResult::failure("combat session is not active");
    }
    let Some(source) = session.participant(action.source) else {
        return ActionResult::failure(format!(
            "participant {} is not part of this session",
            action.source
        ));
    };
    if !source.is_alive {
        return ActionResult::failure(format!("{} is dead and cannot act", source.name));
    }
    if !source.in_combat {
        return ActionResult::failure(format!("{} is no longer in combat", source.name));
    }

    let mut result = match action.kind {
        ActionKind::Attack | ActionKind::Ability => resolve_strike(session, action, strategy, rng),
        ActionKind::Item => resolve_item(session, action, strategy),
        ActionKind::Defend => resolve_defend(session, action.source),
        ActionKind::Flee => {
            let outcome = flee::attempt_flee(session, action.source, strategy, &config.flee, rng);
            let mut result = ActionResult::ok();
            if outcome.success && !session.player_remains() && session.finish(CombatStatus::Fled) {
                result.ended = Some(CombatStatus::Fled);
            }
            result.fled = Some(outcome);
            result
        }
        ActionKind::Skip => {
            let name = session.participant(action.source).map(|p| p.name.clone());
            let round = session.round;
            session.log.append(
                LogEntry::new(
                    round,
                    LogEventKind::Action,
                    format!("{} waits", name.unwrap_or_default()),
                )
                .with_source(action.source),
            );
            ActionResult::ok()
        }
    };

    if !result.success {
        return result;
    }

    session.touch();
    if result.ended.is_none() {
        result.ended = check_termination(session);
    }
    result
}

/// Checks whether at most one team still has living combatants and marks the
/// session terminal when so: `Victory` if a surviving player character
/// exists, `Defeat` otherwise. Returns the terminal status it applied.
pub fn check_termination(session: &mut Session) -> Option<CombatStatus> {
    if !session.is_active() {
        return None;
    }
    if session.teams_standing().len() > 1 {
        return None;
    }
    let status = if session.player_remains() {
        CombatStatus::Victory
    } else {
        CombatStatus::Defeat
    };
    session.finish(status);
    Some(status)
}

/// Finalizes a session: terminal status, rewards, the closing log entry, and
/// the host's end-of-combat callback. The caller (normally the registry)
/// dismantles the session afterwards; the returned summary is all that
/// survives it.
pub fn end_session(
    session: &mut Session,
    status: CombatStatus,
    strategy: &dyn CombatStrategy,
) -> CombatSummary {
    session.finish(status);
    let status = session.status;

    let winners: Vec<ParticipantId> = session
        .participants
        .iter()
        .filter(|p| p.is_alive)
        .map(|p| p.id)
        .collect();
    let losers: Vec<ParticipantId> = session
        .participants
        .iter()
        .filter(|p| !p.is_alive)
        .map(|p| p.id)
        .collect();

    let rewards = strategy.generate_rewards(session, &winners);

    let round = session.round;
    session.log.append(
        LogEntry::new(round, LogEventKind::CombatEnd, format!("combat ends: {status}")).with_data(
            json!({
                "status": status.to_string(),
                "winners": winners.iter().map(|id| id.0).collect::<Vec<_>>(),
                "losers": losers.iter().map(|id| id.0).collect::<Vec<_>>(),
            }),
        ),
    );

    let duration = (Utc::now() - session.created_at).to_std().unwrap_or_default();
    let summary = CombatSummary {
        session: session.id,
        game: session.game,
        status,
        duration,
        rounds: session.round,
        winners,
        losers,
        rewards,
        log: session.log.clone(),
    };

    strategy.on_combat_end(&summary);

    for participant in &mut session.participants {
        participant.leave_combat();
    }

    summary
}

fn resolve_strike(
    session: &mut Session,
    action: &Action,
    strategy: &dyn CombatStrategy,
    rng: &mut dyn RandomSource,
) -> ActionResult {
    let is_basic = action.kind == ActionKind::Attack;

    if !is_basic {
        let Some(ability) = &action.ability else {
            return ActionResult::failure("ability actions require an ability id");
        };
        let source = session
            .participant(action.source)
            .expect("source validated by perform_action");
        if !source.knows_ability(ability) {
            return ActionResult::failure(format!(
                "{} does not know the ability {ability}",
                source.name
            ));
        }
        if source.cooldown_remaining(ability).is_some() {
            return ActionResult::failure(format!("{ability} is still on cooldown"));
        }
    }

    let attacker = session
        .participant(action.source)
        .expect("source validated by perform_action")
        .clone();
    let round = session.round;
    let mut result = ActionResult::ok();
    let mut deaths: Vec<(ParticipantId, ParticipantId)> = Vec::new();

    session.log.append(
        LogEntry::new(
            round,
            LogEventKind::Action,
            match &action.ability {
                Some(ability) => format!("{} uses {ability}", attacker.name),
                None => format!("{} attacks", attacker.name),
            },
        )
        .with_source(attacker.id),
    );

    for &target_id in &action.targets {
        let Some(defender) = session.participant(target_id) else {
            continue;
        };
        if !defender.is_alive || !defender.in_combat {
            continue;
        }

        // Abilities aimed at the caster's own side are heals; everything
        // else resolves through the damage formula.
        let friendly = defender.team == attacker.team;
        if !is_basic && friendly {
            let ability = action.ability.as_ref().expect("validated above");
            let amount = strategy.calculate_healing(&attacker, defender, ability);
            let target = session
                .participant_mut(target_id)
                .expect("defender looked up above");
            let healed = target.apply_heal(amount);
            let target_name = target.name.clone();
            result.effects.push(ActionEffect {
                target: target_id,
                kind: ActionEffectKind::Heal,
                amount: healed,
                critical: false,
                damage_type: None,
                element: None,
                overkill: 0,
                killed: false,
            });
            session.log.append(
                LogEntry::new(
                    round,
                    LogEventKind::Heal,
                    format!("{} restores {healed} health to {target_name}", attacker.name),
                )
                .with_source(attacker.id)
                .with_target(target_id)
                .with_data(json!({ "amount": healed })),
            );
            continue;
        }

        if let Some(chance) = strategy.hit_chance(&attacker, defender) {
            if !rng.roll(chance) {
                let target_name = defender.name.clone();
                result.effects.push(ActionEffect {
                    target: target_id,
                    kind: ActionEffectKind::Miss,
                    amount: 0,
                    critical: false,
                    damage_type: None,
                    element: None,
                    overkill: 0,
                    killed: false,
                });
                session.log.append(
                    LogEntry::new(
                        round,
                        LogEventKind::Miss,
                        format!("{} misses {target_name}", attacker.name),
                    )
                    .with_source(attacker.id)
                    .with_target(target_id),
                );
                continue;
            }
        }

        let is_critical = strategy
            .critical_chance(&attacker, defender)
            .map(|chance| rng.roll(chance))
            .unwrap_or(false);
        let request = DamageRequest {
            attacker: &attacker,
            defender,
            ability: action.ability.as_ref(),
            is_basic_attack: is_basic,
            combo_multiplier: action.combo_multiplier,
            is_critical,
        };
        let outcome = strategy.calculate_damage(&request);
        let critical = outcome.critical || is_critical;

        let target = session
            .participant_mut(target_id)
            .expect("defender looked up above");
        let applied = target.apply_damage(outcome.amount);
        target.threat.record(attacker.id, applied.dealt);
        let target_name = target.name.clone();

        result.effects.push(ActionEffect {
            target: target_id,
            kind: ActionEffectKind::Damage,
            amount: outcome.amount,
            critical,
            damage_type: Some(outcome.damage_type),
            element: outcome.element.clone(),
            overkill: applied.overkill,
            killed: applied.died,
        });
        session.log.append(
            LogEntry::new(
                round,
                LogEventKind::Damage,
                if critical {
                    format!(
                        "{} critically hits {target_name} for {} damage",
                        attacker.name, outcome.amount
                    )
                } else {
                    format!(
                        "{} hits {target_name} for {} damage",
                        attacker.name, outcome.amount
                    )
                },
            )
            .with_source(attacker.id)
            .with_target(target_id)
            .with_data(json!({
                "amount": outcome.amount,
                "critical": critical,
                "damage_type": outcome.damage_type.to_string(),
                "element": outcome.element,
                "blocked": outcome.blocked,
                "absorbed": outcome.absorbed,
                "overkill": applied.overkill,
            })),
        );

        if applied.died {
            session.log.append(
                LogEntry::new(
                    round,
                    LogEventKind::Death,
                    format!("{target_name} is defeated"),
                )
                .with_source(attacker.id)
                .with_target(target_id),
            );
            deaths.push((target_id, attacker.id));
        }
    }

    if let Some(ability) = &action.ability
        && action.kind == ActionKind::Ability
        && let Some(cooldown) = strategy.ability_cooldown(ability)
        && let Some(source) = session.participant_mut(action.source)
    {
        source.cooldowns.insert(ability.clone(), cooldown);
    }

    for (victim, killer) in deaths {
        strategy.on_participant_death(session, victim, killer);
    }

    result
}

fn resolve_item(
    session: &mut Session,
    action: &Action,
    strategy: &dyn CombatStrategy,
) -> ActionResult {
    let Some(item) = &action.ability else {
        return ActionResult::failure("item actions require an item id");
    };
    let target_id = action.targets.first().copied().unwrap_or(action.source);
    let Some(target) = session.participant(target_id) else {
        return ActionResult::failure(format!("participant {target_id} is not part of this session"));
    };
    if !target.is_alive {
        return ActionResult::failure(format!("{} is dead", target.name));
    }

    let user = session
        .participant(action.source)
        .expect("source validated by perform_action")
        .clone();
    let Some(use_result) = strategy.use_item(&user, target, item) else {
        return ActionResult::failure(format!("no item handling is configured for {item}"));
    };

    let round = session.round;
    let mut result = ActionResult::ok();
    session.log.append(
        LogEntry::new(round, LogEventKind::Action, format!("{} uses {item}", user.name))
            .with_source(user.id)
            .with_target(target_id),
    );

    let target = session
        .participant_mut(target_id)
        .expect("target looked up above");
    let target_name = target.name.clone();
    match use_result {
        ItemUse::Heal(amount) => {
            let healed = target.apply_heal(amount);
            result.effects.push(ActionEffect {
                target: target_id,
                kind: ActionEffectKind::Heal,
                amount: healed,
                critical: false,
                damage_type: None,
                element: None,
                overkill: 0,
                killed: false,
            });
            session.log.append(
                LogEntry::new(
                    round,
                    LogEventKind::Heal,
                    format!("{item} restores {healed} health to {target_name}"),
                )
                .with_source(user.id)
                .with_target(target_id)
                .with_data(json!({ "amount": healed, "item": item.0 })),
            );
        }
        ItemUse::Damage(amount) => {
            let applied = target.apply_damage(amount);
            target.threat.record(user.id, applied.dealt);
            result.effects.push(ActionEffect {
                target: target_id,
                kind: ActionEffectKind::Damage,
                amount,
                critical: false,
                damage_type: None,
                element: None,
                overkill: applied.overkill,
                killed: applied.died,
            });
            session.log.append(
                LogEntry::new(
                    round,
                    LogEventKind::Damage,
                    format!("{item} deals {amount} damage to {target_name}"),
                )
                .with_source(user.id)
                .with_target(target_id)
                .with_data(json!({ "amount": amount, "item": item.0 })),
            );
            if applied.died {
                session.log.append(
                    LogEntry::new(round, LogEventKind::Death, format!("{target_name} is defeated"))
                        .with_source(user.id)
                        .with_target(target_id),
                );
                strategy.on_participant_death(session, target_id, user.id);
            }
        }
    }

    result
}

fn resolve_defend(session: &mut Session, source_id: ParticipantId) -> ActionResult {
    let round = session.round;
    let source = session
        .participant_mut(source_id)
        .expect("source validated by perform_action");
    let name = source.name.clone();
    source.effects.add(
        StatusEffect::new(
            EngineConfig::GUARD_EFFECT_ID,
            "Defending",
            source_id,
            EffectPolarity::Buff,
            EffectDuration::Rounds(1),
        )
        .with_modifier(StatModifier::percent(
            crate::state::STAT_DEFENSE,
            EngineConfig::GUARD_DEFENSE_PERCENT,
        )),
    );
    session.log.append(
        LogEntry::new(round, LogEventKind::EffectApplied, format!("{name} takes a defensive stance"))
            .with_source(source_id)
            .with_data(json!({ "effect": EngineConfig::GUARD_EFFECT_ID })),
    );
    ActionResult::ok()
}

/// Applies pending damage/heal-over-time ticks to their carrier and logs the
/// results. Lethal ticks credit the effect's source as the killer. Returns
/// the deaths that occurred.
pub(crate) fn apply_effect_ticks(
    session: &mut Session,
    carrier: ParticipantId,
    ticks: Vec<EffectTick>,
    strategy: &dyn CombatStrategy,
) {
    let round = session.round;
    let mut deaths: Vec<(ParticipantId, ParticipantId)> = Vec::new();

    for tick in ticks {
        let Some(participant) = session.participant_mut(carrier) else {
            break;
        };
        if !participant.is_alive {
            break;
        }
        let name = participant.name.clone();
        match tick.polarity {
            EffectPolarity::Buff => {
                let healed = participant.apply_heal(tick.amount);
                session.log.append(
                    LogEntry::new(
                        round,
                        LogEventKind::Heal,
                        format!("{name} recovers {healed} health from {}", tick.effect_name),
                    )
                    .with_source(tick.source)
                    .with_target(carrier)
                    .with_data(json!({ "amount": healed, "effect": tick.effect_id })),
                );
            }
            EffectPolarity::Debuff => {
                let applied = participant.apply_damage(tick.amount);
                participant.threat.record(tick.source, applied.dealt);
                session.log.append(
                    LogEntry::new(
                        round,
                        LogEventKind::Damage,
                        format!("{name} suffers {} damage from {}", tick.amount, tick.effect_name),
                    )
                    .with_source(tick.source)
                    .with_target(carrier)
                    .with_data(json!({ "amount": tick.amount, "effect": tick.effect_id })),
                );
                if applied.died {
                    session.log.append(
                        LogEntry::new(round, LogEventKind::Death, format!("{name} is defeated"))
                            .with_source(tick.source)
                            .with_target(carrier),
                    );
                    deaths.push((carrier, tick.source));
                }
            }
        }
    }

    for (victim, killer) in deaths {
        strategy.on_participant_death(session, victim, killer);
    }
}

/// Logs effects that ran out while advancing.
pub(crate) fn log_expired_effects(
    session: &mut Session,
    carrier: ParticipantId,
    expired: Vec<StatusEffect>,
) {
    let round = session.round;
    let carrier_name = session
        .participant(carrier)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    for effect in expired {
        session.log.append(
            LogEntry::new(
                round,
                LogEventKind::EffectExpired,
                format!("{} fades from {carrier_name}", effect.name),
            )
            .with_target(carrier)
            .with_data(json!({ "effect": effect.id })),
        );
    }
}
