//! Minimal host integration: a strategy with simple formulas, one duel,
//! and an event subscriber printing what happens.
//!
//! Run with: `cargo run --example skirmish`

use combat_core::action::Action;
use combat_core::state::{
    AbilityId, CombatOptions, Participant, ParticipantId, ParticipantKind, ResourceMeter,
    StatBlock, Team,
};
use combat_core::strategy::{CombatStrategy, DamageOutcome, DamageRequest, DamageType};
use runtime::{CombatRuntime, Topic};

/// Attack minus half defense, doubled on crits the damage roll flagged.
struct SimpleRules;

impl CombatStrategy for SimpleRules {
    fn calculate_damage(&self, request: &DamageRequest<'_>) -> DamageOutcome {
        let attack = request.attacker.effective_stat("attack");
        let defense = request.defender.effective_stat("defense");
        let mut amount = (attack - defense / 2).max(1) as u32;
        if request.is_critical {
            amount *= 2;
        }
        DamageOutcome {
            amount,
            critical: request.is_critical,
            damage_type: DamageType::Physical,
            element: None,
            blocked: (defense / 2).max(0) as u32,
            absorbed: 0,
        }
    }

    fn calculate_healing(
        &self,
        healer: &Participant,
        _target: &Participant,
        _ability: &AbilityId,
    ) -> u32 {
        healer.effective_stat("magic_attack").max(0) as u32
    }

    fn critical_chance(&self, _attacker: &Participant, _defender: &Participant) -> Option<f64> {
        Some(0.15)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let runtime = CombatRuntime::builder().strategy(SimpleRules).build()?;
    let handle = runtime.handle();
    let mut actions = handle.subscribe(Topic::Action);

    let hero = Participant::new(
        ParticipantId(1),
        "Hero",
        ParticipantKind::Player,
        Team(0),
        ResourceMeter::full(120),
        ResourceMeter::full(40),
        StatBlock::new(14, 6, 8, 4, 15),
    );
    let goblin = Participant::new(
        ParticipantId(2),
        "Goblin",
        ParticipantKind::Hostile,
        Team(1),
        ResourceMeter::full(60),
        ResourceMeter::full(0),
        StatBlock::new(8, 2, 0, 0, 9),
    );

    let session = handle
        .start_combat(vec![hero, goblin], CombatOptions::default())
        .await?;
    println!("turn order: {:?}", session.turn_order);

    loop {
        let result = handle
            .perform_action(session.id, Action::attack(ParticipantId(1), ParticipantId(2)))
            .await?;
        while let Ok(event) = actions.try_recv() {
            println!("event: {event:?}");
        }
        if let Some(status) = result.ended {
            println!("combat over: {status}");
            break;
        }
        handle.advance_turn(session.id).await?;
        handle.advance_turn(session.id).await?;
    }

    runtime.shutdown().await?;
    Ok(())
}
