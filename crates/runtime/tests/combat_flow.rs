//! End-to-end exercises of the session registry and action pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use combat_core::action::Action;
use combat_core::state::{
    AbilityId, CombatMode, CombatOptions, CombatStatus, Participant, ParticipantId,
    ParticipantKind, ResourceMeter, Session, StatBlock, Team,
};
use combat_core::strategy::{CombatStrategy, DamageOutcome, DamageRequest};
use combat_core::{FixedRandom, ParticipantId as Pid};
use runtime::{CombatEvent, CombatRuntime, RuntimeError, Topic};

/// Fixed-damage strategy with counters for the lifecycle callbacks.
#[derive(Default)]
struct FlatDamage {
    amount: u32,
    deaths: Arc<AtomicUsize>,
    ends: Arc<AtomicUsize>,
}

impl CombatStrategy for FlatDamage {
    fn calculate_damage(&self, _request: &DamageRequest<'_>) -> DamageOutcome {
        DamageOutcome::flat(self.amount)
    }

    fn calculate_healing(
        &self,
        _healer: &Participant,
        _target: &Participant,
        _ability: &AbilityId,
    ) -> u32 {
        0
    }

    fn on_participant_death(
        &self,
        _session: &Session,
        _victim: ParticipantId,
        _killer: ParticipantId,
    ) {
        self.deaths.fetch_add(1, Ordering::SeqCst);
    }

    fn on_combat_end(&self, _summary: &combat_core::CombatSummary) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}

fn fighter(id: u64, kind: ParticipantKind, team: u8, health: u32, speed: i32) -> Participant {
    Participant::new(
        Pid(id),
        format!("fighter-{id}"),
        kind,
        Team(team),
        ResourceMeter::full(health),
        ResourceMeter::full(30),
        StatBlock::new(10, 5, 0, 0, speed),
    )
}

fn duel_roster() -> Vec<Participant> {
    vec![
        fighter(1, ParticipantKind::Player, 0, 100, 20),
        fighter(2, ParticipantKind::Hostile, 1, 100, 10),
    ]
}

#[tokio::test]
async fn full_fight_to_victory_cleans_up_registry() {
    let deaths = Arc::new(AtomicUsize::new(0));
    let ends = Arc::new(AtomicUsize::new(0));
    let runtime = CombatRuntime::builder()
        .strategy(FlatDamage {
            amount: 30,
            deaths: deaths.clone(),
            ends: ends.clone(),
        })
        .random_source(FixedRandom::constant(0.5))
        .build()
        .unwrap();
    let handle = runtime.handle();
    let mut lifecycle = handle.subscribe(Topic::Lifecycle);
    let mut actions = handle.subscribe(Topic::Action);

    let session = handle
        .start_combat(duel_roster(), CombatOptions::default())
        .await
        .unwrap();
    let id = session.id;

    // Default order: faster participant first.
    assert_eq!(session.turn_order, vec![Pid(1), Pid(2)]);
    assert!(handle.is_in_combat(Pid(1)).await.unwrap());
    assert_eq!(handle.participant_session(Pid(2)).await.unwrap(), Some(id));
    assert!(matches!(
        lifecycle.recv().await.unwrap(),
        CombatEvent::CombatStarted { .. }
    ));

    // 100 health / 30 per swing: the fourth attack kills.
    let attack = Action::attack(Pid(1), Pid(2));
    for _ in 0..3 {
        let result = handle.perform_action(id, attack.clone()).await.unwrap();
        assert!(result.success);
        assert!(result.ended.is_none());
    }
    let result = handle.perform_action(id, attack.clone()).await.unwrap();
    assert!(result.success);
    assert_eq!(result.ended, Some(CombatStatus::Victory));
    assert_eq!(deaths.load(Ordering::SeqCst), 1);
    assert_eq!(ends.load(Ordering::SeqCst), 1);

    // The id is dead and every mapping is gone.
    assert!(handle.session(id).await.unwrap().is_none());
    assert!(!handle.is_in_combat(Pid(1)).await.unwrap());
    assert!(!handle.is_in_combat(Pid(2)).await.unwrap());

    // Actions against the dead id fail softly.
    let late = handle.perform_action(id, attack).await.unwrap();
    assert!(!late.success);
    assert!(late.error.unwrap().contains("not found"));

    // Damage events streamed for each swing, then the death.
    let mut damage_events = 0;
    let mut death_events = 0;
    while let Ok(event) = actions.try_recv() {
        match event {
            CombatEvent::Damage { amount, .. } => {
                assert_eq!(amount, 30);
                damage_events += 1;
            }
            CombatEvent::Death { victim, killer, .. } => {
                assert_eq!(victim, Pid(2));
                assert_eq!(killer, Pid(1));
                death_events += 1;
            }
            _ => {}
        }
    }
    assert_eq!(damage_events, 4);
    assert_eq!(death_events, 1);

    match lifecycle.recv().await.unwrap() {
        CombatEvent::CombatEnded {
            status, winners, ..
        } => {
            assert_eq!(status, CombatStatus::Victory);
            assert_eq!(winners, vec![Pid(1)]);
        }
        other => panic!("expected CombatEnded, got {other:?}"),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn busy_participants_are_refused() {
    let runtime = CombatRuntime::builder()
        .strategy(FlatDamage::default())
        .build()
        .unwrap();
    let handle = runtime.handle();

    handle
        .start_combat(duel_roster(), CombatOptions::default())
        .await
        .unwrap();

    // Participant 1 is already fighting; the second start must not steal it.
    let second = handle
        .start_combat(
            vec![
                fighter(1, ParticipantKind::Player, 0, 100, 20),
                fighter(9, ParticipantKind::Hostile, 1, 50, 5),
            ],
            CombatOptions::default(),
        )
        .await;
    assert!(matches!(second, Err(RuntimeError::ParticipantBusy(Pid(1)))));

    // An empty roster is refused outright.
    let empty = handle
        .start_combat(Vec::new(), CombatOptions::default())
        .await;
    assert!(matches!(empty, Err(RuntimeError::Combat(_))));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn flee_failure_reports_penalty_without_deducting() {
    let runtime = CombatRuntime::builder()
        .strategy(FlatDamage::default())
        .random_source(FixedRandom::constant(0.95))
        .build()
        .unwrap();
    let handle = runtime.handle();

    let session = handle
        .start_combat(
            vec![
                fighter(1, ParticipantKind::Player, 0, 100, 20),
                fighter(2, ParticipantKind::Hostile, 1, 100, 10),
                fighter(3, ParticipantKind::Hostile, 1, 100, 10),
            ],
            CombatOptions::default(),
        )
        .await
        .unwrap();

    let outcome = handle.attempt_flee(session.id, Pid(1)).await.unwrap();
    assert!(!outcome.success);
    // speed 20 vs avg 10: clamped to the 0.9 ceiling, and 0.95 rolls over it.
    assert!((outcome.chance - 0.9).abs() < f64::EPSILON);
    assert_eq!(outcome.penalty, Some(10));

    let snapshot = handle.session(session.id).await.unwrap().unwrap();
    assert_eq!(
        snapshot.participant(Pid(1)).unwrap().health.current,
        100,
        "the resolver must not deduct the penalty itself"
    );
    assert!(handle.is_in_combat(Pid(1)).await.unwrap());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn flee_success_releases_participant_and_ends_session() {
    let runtime = CombatRuntime::builder()
        .strategy(FlatDamage::default())
        .random_source(FixedRandom::constant(0.85))
        .build()
        .unwrap();
    let handle = runtime.handle();

    let session = handle
        .start_combat(duel_roster(), CombatOptions::default())
        .await
        .unwrap();

    let outcome = handle.attempt_flee(session.id, Pid(1)).await.unwrap();
    assert!(outcome.success);

    // The last player escaped: the session is gone with a fled outcome and
    // both mappings are released.
    assert!(handle.session(session.id).await.unwrap().is_none());
    assert!(!handle.is_in_combat(Pid(1)).await.unwrap());
    assert!(!handle.is_in_combat(Pid(2)).await.unwrap());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn explicit_end_records_summary_and_invalidates_id() {
    let runtime = CombatRuntime::builder()
        .strategy(FlatDamage::default())
        .build()
        .unwrap();
    let handle = runtime.handle();

    let session = handle
        .start_combat(duel_roster(), CombatOptions::default())
        .await
        .unwrap();

    let summary = handle
        .end_combat(session.id, CombatStatus::Defeat)
        .await
        .unwrap();
    assert_eq!(summary.status, CombatStatus::Defeat);
    assert_eq!(summary.winners.len(), 2, "nobody died in this fight");
    assert!(
        summary
            .log
            .of_kind(combat_core::LogEventKind::CombatEnd)
            .count()
            == 1
    );

    let again = handle.end_combat(session.id, CombatStatus::Defeat).await;
    assert!(matches!(again, Err(RuntimeError::SessionNotFound(_))));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn custom_turn_order_hook_wins_over_default() {
    struct ReverseOrder;
    impl CombatStrategy for ReverseOrder {
        fn calculate_damage(&self, _request: &DamageRequest<'_>) -> DamageOutcome {
            DamageOutcome::flat(0)
        }
        fn calculate_healing(
            &self,
            _healer: &Participant,
            _target: &Participant,
            _ability: &AbilityId,
        ) -> u32 {
            0
        }
        fn turn_order(&self, participants: &[Participant]) -> Option<Vec<ParticipantId>> {
            let mut order: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();
            order.reverse();
            Some(order)
        }
    }

    let runtime = CombatRuntime::builder()
        .strategy(ReverseOrder)
        .build()
        .unwrap();
    let handle = runtime.handle();

    let session = handle
        .start_combat(duel_roster(), CombatOptions::default())
        .await
        .unwrap();
    assert_eq!(session.turn_order, vec![Pid(2), Pid(1)]);

    let outcome = handle.advance_turn(session.id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.participant, Some(Pid(1)));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_strategy_is_rejected_at_build_time() {
    let result = CombatRuntime::builder().build();
    assert!(matches!(result, Err(RuntimeError::MissingStrategy)));
}

#[tokio::test]
async fn auto_attack_toggle_requires_realtime_session() {
    let runtime = CombatRuntime::builder()
        .strategy(FlatDamage::default())
        .build()
        .unwrap();
    let handle = runtime.handle();

    let turn_based = handle
        .start_combat(duel_roster(), CombatOptions::default())
        .await
        .unwrap();
    assert!(!handle
        .set_auto_attack(turn_based.id, Pid(1), true)
        .await
        .unwrap());

    let realtime = handle
        .start_combat(
            vec![
                fighter(5, ParticipantKind::Player, 0, 100, 20),
                fighter(6, ParticipantKind::Hostile, 1, 100, 10),
            ],
            CombatOptions {
                mode: Some(CombatMode::RealTime),
                ..CombatOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(handle
        .set_auto_attack(realtime.id, Pid(5), true)
        .await
        .unwrap());

    let snapshot = handle.session(realtime.id).await.unwrap().unwrap();
    assert_eq!(
        snapshot.realtime.unwrap().auto_attack.get(&Pid(5)),
        Some(&true)
    );

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn ai_hook_targets_highest_threat() {
    /// AI that always strikes whoever has hurt it the most.
    struct ThreatHunter;
    impl CombatStrategy for ThreatHunter {
        fn calculate_damage(&self, _request: &DamageRequest<'_>) -> DamageOutcome {
            DamageOutcome::flat(10)
        }
        fn calculate_healing(
            &self,
            _healer: &Participant,
            _target: &Participant,
            _ability: &AbilityId,
        ) -> u32 {
            0
        }
        fn ai_action(&self, session: &Session, actor: &Participant) -> Option<Action> {
            let target = actor.threat.highest().map(|(id, _)| id).or_else(|| {
                session
                    .active_combatants()
                    .find(|p| p.team != actor.team)
                    .map(|p| p.id)
            })?;
            Some(Action::attack(actor.id, target))
        }
    }

    let strategy = Arc::new(ThreatHunter);
    let runtime = CombatRuntime::builder()
        .strategy_arc(strategy.clone())
        .build()
        .unwrap();
    let handle = runtime.handle();

    let session = handle
        .start_combat(
            vec![
                fighter(1, ParticipantKind::Player, 0, 100, 20),
                fighter(2, ParticipantKind::Player, 0, 100, 15),
                fighter(3, ParticipantKind::Hostile, 1, 500, 10),
            ],
            CombatOptions::default(),
        )
        .await
        .unwrap();

    // Player 2 builds more threat than player 1 across two swings each.
    for _ in 0..2 {
        handle
            .perform_action(session.id, Action::attack(Pid(1), Pid(3)))
            .await
            .unwrap();
        handle
            .perform_action(
                session.id,
                Action::attack(Pid(2), Pid(3)).with_combo_multiplier(2.0),
            )
            .await
            .unwrap();
    }
    // Give the second player a decisive extra swing.
    handle
        .perform_action(session.id, Action::attack(Pid(2), Pid(3)))
        .await
        .unwrap();

    // The host drives the hostile's turn: snapshot, ask the AI, act.
    let snapshot = handle.session(session.id).await.unwrap().unwrap();
    let hostile = snapshot.participant(Pid(3)).unwrap();
    assert_eq!(hostile.threat.get(Pid(1)), 20);
    assert_eq!(hostile.threat.get(Pid(2)), 30);

    let action = strategy.ai_action(&snapshot, hostile).unwrap();
    assert_eq!(action.targets, vec![Pid(2)]);

    let result = handle.perform_action(session.id, action).await.unwrap();
    assert!(result.success);
    let snapshot = handle.session(session.id).await.unwrap().unwrap();
    assert_eq!(snapshot.participant(Pid(2)).unwrap().health.current, 90);

    runtime.shutdown().await.unwrap();
}
