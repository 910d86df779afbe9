//! Turn ordering and round advancement for turn-based sessions.
//!
//! The engine computes the initial order and moves the cursor on request;
//! it never advances turns on its own. Round boundaries are where
//! round-based effects tick and cooldowns count down.

use std::cmp::Reverse;

use crate::action::TurnOutcome;
use crate::state::{
    CombatMode, CombatStatus, LogEntry, LogEventKind, Participant, ParticipantId, STAT_SPEED,
    Session,
};
use crate::strategy::CombatStrategy;

use super::{apply_effect_ticks, check_termination, effective_stat, log_expired_effects};

/// Default initial turn order: living participants by descending effective
/// speed, ties broken by their position in the input list.
pub fn default_turn_order(
    participants: &[Participant],
    strategy: &dyn CombatStrategy,
) -> Vec<ParticipantId> {
    let mut order: Vec<&Participant> = participants.iter().filter(|p| p.is_alive).collect();
    order.sort_by_key(|p| Reverse(effective_stat(p, STAT_SPEED, strategy)));
    order.into_iter().map(|p| p.id).collect()
}

/// Moves the turn cursor to the next participant able to act.
///
/// Skips dead and departed entries. Wrapping past the end of the order
/// increments the round counter and runs the round boundary: round-based
/// effects tick (which can kill), expired effects drop off, and cooldowns
/// count down. A terminal status reached during the boundary is marked on
/// the session and reported in [`TurnOutcome::ended`].
pub fn advance_turn(session: &mut Session, strategy: &dyn CombatStrategy) -> TurnOutcome {
    if !session.is_active() {
        return TurnOutcome::failure("combat session is not active");
    }
    if session.mode != CombatMode::TurnBased {
        return TurnOutcome::failure("only turn-based sessions have a turn order");
    }
    if session.turn_order.is_empty() {
        return TurnOutcome::failure("session has no turn order");
    }

    let len = session.turn_order.len();
    let mut ended = None;

    for _ in 0..len {
        session.turn_index += 1;
        if session.turn_index >= len {
            session.turn_index = 0;
            session.round += 1;
            ended = process_round_boundary(session, strategy);
            if ended.is_some() {
                break;
            }
        }

        let candidate = session.turn_order[session.turn_index];
        if let Some(participant) = session.participant(candidate)
            && participant.is_alive
            && participant.in_combat
        {
            let name = participant.name.clone();
            let round = session.round;
            session.log.append(
                LogEntry::new(round, LogEventKind::Turn, format!("round {round}: {name}'s turn"))
                    .with_source(candidate),
            );
            return TurnOutcome {
                success: true,
                error: None,
                participant: Some(candidate),
                round,
                ended: None,
            };
        }
    }

    // Nobody left able to act; make sure the session is marked terminal.
    if ended.is_none() {
        ended = check_termination(session);
    }
    TurnOutcome {
        success: true,
        error: None,
        participant: None,
        round: session.round,
        ended,
    }
}

fn process_round_boundary(
    session: &mut Session,
    strategy: &dyn CombatStrategy,
) -> Option<CombatStatus> {
    let engaged: Vec<ParticipantId> = session
        .active_combatants()
        .map(|p| p.id)
        .collect();

    for id in engaged {
        let Some(participant) = session.participant_mut(id) else {
            continue;
        };
        let (ticks, expired) = participant.effects.advance_round();
        for cooldown in participant.cooldowns.values_mut() {
            cooldown.pass_round();
        }
        participant.cooldowns.retain(|_, cooldown| !cooldown.is_expired());

        apply_effect_ticks(session, id, ticks, strategy);
        log_expired_effects(session, id, expired);
    }

    check_termination(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::start_session;
    use crate::state::{
        CombatOptions, EffectDuration, EffectPolarity, ParticipantKind, ResourceMeter, SessionId,
        StatBlock, StatusEffect, Team,
    };
    use crate::strategy::{DamageOutcome, DamageRequest};

    struct Inert;
    impl CombatStrategy for Inert {
        fn calculate_damage(&self, _request: &DamageRequest<'_>) -> DamageOutcome {
            DamageOutcome::flat(0)
        }
        fn calculate_healing(
            &self,
            _healer: &Participant,
            _target: &Participant,
            _ability: &crate::state::AbilityId,
        ) -> u32 {
            0
        }
    }

    fn fighter(id: u64, kind: ParticipantKind, team: u8, health: u32, speed: i32) -> Participant {
        Participant::new(
            crate::state::ParticipantId(id),
            format!("p{id}"),
            kind,
            Team(team),
            ResourceMeter::full(health),
            ResourceMeter::full(0),
            StatBlock::new(0, 0, 0, 0, speed),
        )
    }

    fn three_way() -> Session {
        start_session(
            SessionId(1),
            CombatOptions::default(),
            vec![
                fighter(1, ParticipantKind::Player, 0, 100, 30),
                fighter(2, ParticipantKind::Hostile, 1, 100, 20),
                fighter(3, ParticipantKind::Hostile, 1, 100, 10),
            ],
            &Inert,
        )
        .unwrap()
    }

    #[test]
    fn advancement_cycles_and_counts_rounds() {
        let mut session = three_way();
        assert_eq!(session.current_participant(), Some(ParticipantId(1)));

        let outcome = advance_turn(&mut session, &Inert);
        assert_eq!(outcome.participant, Some(ParticipantId(2)));
        assert_eq!(outcome.round, 1);

        advance_turn(&mut session, &Inert);
        let outcome = advance_turn(&mut session, &Inert);
        assert_eq!(outcome.participant, Some(ParticipantId(1)));
        assert_eq!(outcome.round, 2);
    }

    #[test]
    fn dead_participants_are_skipped() {
        let mut session = three_way();
        session
            .participant_mut(ParticipantId(2))
            .unwrap()
            .apply_damage(100);

        let outcome = advance_turn(&mut session, &Inert);
        assert_eq!(outcome.participant, Some(ParticipantId(3)));
    }

    #[test]
    fn round_boundary_ticks_poison_and_can_end_combat() {
        let mut session = three_way();
        session
            .participant_mut(ParticipantId(1))
            .unwrap()
            .effects
            .add(
                StatusEffect::new(
                    "poison",
                    "Poison",
                    ParticipantId(2),
                    EffectPolarity::Debuff,
                    EffectDuration::Rounds(5),
                )
                .with_tick_amount(100),
            );

        // Walk a full cycle so the wrap triggers the boundary.
        advance_turn(&mut session, &Inert);
        advance_turn(&mut session, &Inert);
        let outcome = advance_turn(&mut session, &Inert);

        assert_eq!(outcome.ended, Some(crate::state::CombatStatus::Defeat));
        assert!(!session.participant(ParticipantId(1)).unwrap().is_alive);
    }

    #[test]
    fn round_boundary_counts_down_cooldowns() {
        let mut session = three_way();
        session
            .participant_mut(ParticipantId(1))
            .unwrap()
            .cooldowns
            .insert(crate::state::AbilityId::new("smite"), EffectDuration::Rounds(1));

        for _ in 0..3 {
            advance_turn(&mut session, &Inert);
        }
        assert!(
            session
                .participant(ParticipantId(1))
                .unwrap()
                .cooldowns
                .is_empty()
        );
    }

    #[test]
    fn advancement_fails_softly_off_mode() {
        let mut session = three_way();
        session.mode = CombatMode::RealTime;
        let outcome = advance_turn(&mut session, &Inert);
        assert!(!outcome.success);
    }
}
