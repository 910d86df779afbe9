//! Real-time mode: tick driver lifecycle, logical time, and the tick hook.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use combat_core::state::{
    CombatMode, CombatOptions, CombatStatus, Participant, ParticipantId, ParticipantKind,
    ResourceMeter, Session, StatBlock, Team,
};
use combat_core::strategy::{CombatStrategy, DamageOutcome, DamageRequest};
use combat_core::EngineConfig;
use runtime::{CombatEvent, CombatRuntime, RuntimeConfig, Topic};

/// Strategy whose tick hook auto-attacks: every tick, each player hits the
/// first living hostile for a fixed amount.
struct AutoBattler {
    swing: u32,
    ticks: Arc<AtomicUsize>,
}

impl CombatStrategy for AutoBattler {
    fn calculate_damage(&self, _request: &DamageRequest<'_>) -> DamageOutcome {
        DamageOutcome::flat(self.swing)
    }

    fn calculate_healing(
        &self,
        _healer: &Participant,
        _target: &Participant,
        _ability: &combat_core::AbilityId,
    ) -> u32 {
        0
    }

    fn on_combat_tick(&self, session: &mut Session) {
        self.ticks.fetch_add(1, Ordering::SeqCst);

        let attackers: Vec<ParticipantId> = session
            .active_combatants()
            .filter(|p| p.kind == ParticipantKind::Player)
            .map(|p| p.id)
            .collect();
        for attacker in attackers {
            let auto = session
                .realtime
                .as_ref()
                .and_then(|rt| rt.auto_attack.get(&attacker).copied())
                .unwrap_or(false);
            if !auto {
                continue;
            }
            let Some(target) = session
                .active_combatants()
                .find(|p| p.kind == ParticipantKind::Hostile)
                .map(|p| p.id)
            else {
                continue;
            };
            if let Some(victim) = session.participant_mut(target) {
                victim.apply_damage(self.swing);
                victim.threat.record(attacker, self.swing);
            }
        }
    }
}

fn roster() -> Vec<Participant> {
    vec![
        Participant::new(
            ParticipantId(1),
            "Hero",
            ParticipantKind::Player,
            Team(0),
            ResourceMeter::full(100),
            ResourceMeter::full(30),
            StatBlock::new(10, 5, 0, 0, 20),
        ),
        Participant::new(
            ParticipantId(2),
            "Ghoul",
            ParticipantKind::Hostile,
            Team(1),
            ResourceMeter::full(100),
            ResourceMeter::full(0),
            StatBlock::new(8, 2, 0, 0, 10),
        ),
    ]
}

fn realtime_options() -> CombatOptions {
    CombatOptions {
        mode: Some(CombatMode::RealTime),
        auto_attack: true,
        ..CombatOptions::default()
    }
}

#[tokio::test]
async fn logical_time_drives_auto_attacks_to_termination() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let runtime = CombatRuntime::builder()
        .strategy(AutoBattler {
            swing: 40,
            ticks: ticks.clone(),
        })
        .build()
        .unwrap();
    let handle = runtime.handle();
    let mut lifecycle = handle.subscribe(Topic::Lifecycle);

    let session = handle
        .start_combat(roster(), realtime_options())
        .await
        .unwrap();
    assert!(session.realtime.is_some());
    assert!(session.turn_order.is_empty());
    lifecycle.recv().await.unwrap();

    // Two manual ticks: 80 damage, the ghoul hangs on.
    assert_eq!(handle.advance_time(Duration::from_millis(500)).await.unwrap(), 1);
    assert_eq!(handle.advance_time(Duration::from_millis(500)).await.unwrap(), 1);
    let snapshot = handle.session(session.id).await.unwrap().unwrap();
    assert_eq!(snapshot.participant(ParticipantId(2)).unwrap().health.current, 20);

    // The third tick kills; the worker ends the session on its own.
    assert_eq!(handle.advance_time(Duration::from_millis(500)).await.unwrap(), 0);
    assert!(handle.session(session.id).await.unwrap().is_none());
    assert_eq!(ticks.load(Ordering::SeqCst), 3);

    match lifecycle.recv().await.unwrap() {
        CombatEvent::CombatEnded { status, .. } => assert_eq!(status, CombatStatus::Victory),
        other => panic!("expected CombatEnded, got {other:?}"),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn idle_timeout_policy_force_ends_sessions() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let config = RuntimeConfig {
        engine: EngineConfig {
            idle_timeout: Some(Duration::from_secs(30)),
            ..EngineConfig::default()
        },
        ..RuntimeConfig::default()
    };
    let runtime = CombatRuntime::builder()
        .strategy(AutoBattler {
            swing: 0,
            ticks,
        })
        .config(config)
        .build()
        .unwrap();
    let handle = runtime.handle();
    let mut lifecycle = handle.subscribe(Topic::Lifecycle);

    let session = handle
        .start_combat(roster(), realtime_options())
        .await
        .unwrap();
    lifecycle.recv().await.unwrap();

    handle.advance_time(Duration::from_secs(29)).await.unwrap();
    assert!(handle.session(session.id).await.unwrap().is_some());

    // Crossing the threshold times the session out; the log still records
    // the terminal outcome.
    handle.advance_time(Duration::from_secs(1)).await.unwrap();
    assert!(handle.session(session.id).await.unwrap().is_none());
    match lifecycle.recv().await.unwrap() {
        CombatEvent::CombatEnded { status, .. } => assert_eq!(status, CombatStatus::Timeout),
        other => panic!("expected CombatEnded, got {other:?}"),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shared_driver_runs_while_sessions_live_and_stops_idle() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let runtime = CombatRuntime::builder()
        .strategy(AutoBattler {
            swing: 0,
            ticks: ticks.clone(),
        })
        .build()
        .unwrap();
    let handle = runtime.handle();

    let session = handle
        .start_combat(roster(), realtime_options())
        .await
        .unwrap();

    // Default tick interval 2s -> driver period 500ms. Three seconds of
    // (paused, auto-advancing) time must deliver several ticks.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let while_running = ticks.load(Ordering::SeqCst);
    assert!(while_running >= 3, "driver delivered {while_running} ticks");

    // After the last real-time session ends the driver retires: no further
    // tick hook invocations, no matter how long we wait.
    handle
        .end_combat(session.id, CombatStatus::Defeat)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    let after_end = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), after_end);

    // A new real-time session lazily restarts the shared driver.
    handle
        .start_combat(roster(), realtime_options())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(ticks.load(Ordering::SeqCst) > after_end);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn turn_based_sessions_never_tick() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let runtime = CombatRuntime::builder()
        .strategy(AutoBattler {
            swing: 40,
            ticks: ticks.clone(),
        })
        .build()
        .unwrap();
    let handle = runtime.handle();

    handle
        .start_combat(roster(), CombatOptions::default())
        .await
        .unwrap();

    // Manual advancement finds no real-time sessions and the hook never runs.
    assert_eq!(handle.advance_time(Duration::from_secs(5)).await.unwrap(), 0);
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    runtime.shutdown().await.unwrap();
}
