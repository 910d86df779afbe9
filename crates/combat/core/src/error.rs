use thiserror::Error;

/// Hard failures from session construction.
///
/// Gameplay-level problems (dead source, unknown target, inactive session)
/// are never errors; they come back as soft [`crate::action::ActionResult`]
/// values so message-layer callers branch instead of catching.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("combat requires at least one participant")]
    NoParticipants,

    #[error("strategy turn order is not a permutation of the living participants")]
    InvalidTurnOrder,
}
