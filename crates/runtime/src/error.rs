//! Unified error types surfaced by the runtime API.
//!
//! These cover infrastructure and registry-level failures. In-combat
//! validation problems (dead source, unknown target, inactive session) are
//! soft [`combat_core::ActionResult`] values, never errors.
use thiserror::Error;
use tokio::sync::oneshot;

use combat_core::{CombatError, ParticipantId, SessionId};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("combat session {0} not found")]
    SessionNotFound(SessionId),

    #[error("participant {0} is already engaged in another combat session")]
    ParticipantBusy(ParticipantId),

    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error("a combat strategy must be installed before the runtime is built")]
    MissingStrategy,

    #[error("session worker command channel closed")]
    CommandChannelClosed,

    #[error("session worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("session worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),
}
