//! Deterministic combat resolution shared by every game module on the platform.
//!
//! `combat-core` defines the canonical encounter rules (sessions, participants,
//! actions, status effects) and exposes pure APIs that the async runtime and
//! offline tools both drive. Game-specific numbers never live here: damage,
//! healing, turn order, AI, and rewards are supplied by the host through the
//! [`strategy::CombatStrategy`] trait, and all state mutation flows through the
//! functions in [`engine`].
pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod rng;
pub mod state;
pub mod strategy;

pub use action::{Action, ActionEffect, ActionKind, ActionResult, FleeOutcome, TurnOutcome};
pub use config::{EngineConfig, FleeTuning};
pub use engine::{
    advance_time, advance_turn, attempt_flee, check_termination, effective_stat, end_session,
    perform_action, start_session,
};
pub use error::CombatError;
pub use rng::{FixedRandom, PcgRandom, RandomSource};
pub use state::{
    AbilityId, CombatLog, CombatMode, CombatOptions, CombatStatus, EffectDuration, GameId,
    LogEntry, LogEventKind, ModifierOp, Participant, ParticipantId, ParticipantKind,
    RealtimeState, ResourceMeter, Session, SessionId, StatBlock, StatModifier, StatusEffect,
    StatusEffects, Team, ThreatTable,
};
pub use strategy::{
    CombatStrategy, CombatSummary, DamageOutcome, DamageRequest, DamageType, ItemUse, RewardBundle,
};
