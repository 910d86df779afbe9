//! Flee resolution.

use serde_json::json;

use crate::action::FleeOutcome;
use crate::config::FleeTuning;
use crate::rng::RandomSource;
use crate::state::{LogEntry, LogEventKind, ParticipantId, STAT_SPEED, Session};
use crate::strategy::CombatStrategy;

use super::effective_stat;

/// Escape chance for a participant against the average speed of the living
/// opposition: `base + (speed - avg_enemy_speed) * factor`, clamped.
pub fn flee_chance(speed: i32, avg_enemy_speed: f64, tuning: &FleeTuning) -> f64 {
    (tuning.base_chance + (f64::from(speed) - avg_enemy_speed) * tuning.speed_factor)
        .clamp(tuning.min_chance, tuning.max_chance)
}

/// Resolves one escape attempt.
///
/// On success the participant leaves combat immediately (effects, threat,
/// and cooldowns dropped). On failure nothing is deducted here; the outcome
/// carries a suggested penalty (`max_health / penalty_divisor`) that the
/// caller decides whether to apply. Whether the session ends because the
/// last player escaped is the action pipeline's decision, not this one's.
pub fn attempt_flee(
    session: &mut Session,
    participant_id: ParticipantId,
    strategy: &dyn CombatStrategy,
    tuning: &FleeTuning,
    rng: &mut dyn RandomSource,
) -> FleeOutcome {
    if !session.is_active() {
        return FleeOutcome {
            success: false,
            chance: 0.0,
            message: "combat session is not active".to_string(),
            penalty: None,
        };
    }
    let Some(participant) = session.participant(participant_id) else {
        return FleeOutcome {
            success: false,
            chance: 0.0,
            message: format!("participant {participant_id} is not part of this session"),
            penalty: None,
        };
    };
    if !participant.is_alive || !participant.in_combat {
        return FleeOutcome {
            success: false,
            chance: 0.0,
            message: format!("{} is in no state to flee", participant.name),
            penalty: None,
        };
    }

    let name = participant.name.clone();
    let team = participant.team;
    let max_health = participant.health.maximum;
    let speed = effective_stat(participant, STAT_SPEED, strategy);

    let enemy_speeds: Vec<f64> = session
        .active_combatants()
        .filter(|enemy| enemy.team != team)
        .map(|enemy| f64::from(effective_stat(enemy, STAT_SPEED, strategy)))
        .collect();

    // Nothing left to run from: escape is as easy as it gets.
    let chance = if enemy_speeds.is_empty() {
        tuning.max_chance
    } else {
        let avg = enemy_speeds.iter().sum::<f64>() / enemy_speeds.len() as f64;
        flee_chance(speed, avg, tuning)
    };

    let round = session.round;
    if rng.roll(chance) {
        let participant = session
            .participant_mut(participant_id)
            .expect("participant looked up above");
        participant.leave_combat();
        session.log.append(
            LogEntry::new(round, LogEventKind::Flee, format!("{name} escapes from combat"))
                .with_source(participant_id)
                .with_data(json!({ "chance": chance, "success": true })),
        );
        FleeOutcome {
            success: true,
            chance,
            message: format!("{name} escapes from combat"),
            penalty: None,
        }
    } else {
        session.log.append(
            LogEntry::new(round, LogEventKind::Flee, format!("{name} fails to escape"))
                .with_source(participant_id)
                .with_data(json!({ "chance": chance, "success": false })),
        );
        FleeOutcome {
            success: false,
            chance,
            message: format!("{name} fails to escape"),
            penalty: Some(max_health / tuning.penalty_divisor),
        }
    }
}
