//! Logical time advancement for real-time sessions.
//!
//! The runtime's shared tick driver feeds elapsed time in here before the
//! host's tick hook runs. Damage/heal-over-time effects apply on a fixed
//! cadence (`effect_tick_interval`) regardless of the driver period, so tick
//! rate changes never change effect throughput.

use std::time::Duration;

use crate::config::EngineConfig;
use crate::state::{CombatMode, CombatStatus, ParticipantId, Session};
use crate::strategy::CombatStrategy;

use super::{apply_effect_ticks, check_termination, log_expired_effects};

/// Advances a real-time session by `elapsed` of logical time.
///
/// Applies whole effect ticks crossed by the accumulated clock, counts down
/// time-based cooldowns, and enforces the idle-timeout policy when one is
/// configured. Returns the terminal status the session reached, if any; the
/// status is already marked on the session.
pub fn advance_time(
    session: &mut Session,
    elapsed: Duration,
    strategy: &dyn CombatStrategy,
    config: &EngineConfig,
) -> Option<CombatStatus> {
    if !session.is_active() || session.mode != CombatMode::RealTime {
        return None;
    }

    let step = config.effect_tick_interval;
    let idle;
    let mut steps = 0u32;
    {
        let realtime = session.realtime.as_mut()?;
        realtime.effect_clock += elapsed;
        realtime.idle += elapsed;
        idle = realtime.idle;
        if !step.is_zero() {
            while realtime.effect_clock >= step {
                realtime.effect_clock -= step;
                steps += 1;
            }
        }
    }

    for _ in 0..steps {
        let engaged: Vec<ParticipantId> = session.active_combatants().map(|p| p.id).collect();
        for id in engaged {
            let Some(participant) = session.participant_mut(id) else {
                continue;
            };
            let (ticks, expired) = participant.effects.advance_time(step);
            for cooldown in participant.cooldowns.values_mut() {
                cooldown.elapse(step);
            }
            participant.cooldowns.retain(|_, cooldown| !cooldown.is_expired());

            apply_effect_ticks(session, id, ticks, strategy);
            log_expired_effects(session, id, expired);
        }
        if let Some(status) = check_termination(session) {
            return Some(status);
        }
    }

    if let Some(limit) = config.idle_timeout
        && idle >= limit
        && session.finish(CombatStatus::Timeout)
    {
        return Some(CombatStatus::Timeout);
    }

    None
}
