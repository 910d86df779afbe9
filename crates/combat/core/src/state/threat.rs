//! Threat accumulation for AI targeting.
//!
//! Threat is a per-target ledger of damage received from each attacker. It
//! never decays; host-supplied AI action selection reads it to bias target
//! choice, and it is cleared only when the participant leaves the session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::common::ParticipantId;

/// Accumulated damage per attacker, tracked on the receiving participant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatTable {
    entries: HashMap<ParticipantId, u64>,
}

impl ThreatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` of damage to `attacker`.
    pub fn record(&mut self, attacker: ParticipantId, amount: u32) {
        *self.entries.entry(attacker).or_insert(0) += u64::from(amount);
    }

    pub fn get(&self, attacker: ParticipantId) -> u64 {
        self.entries.get(&attacker).copied().unwrap_or(0)
    }

    /// The attacker with the highest accumulated threat, if any.
    ///
    /// Ties break toward the lower participant id so AI targeting stays
    /// deterministic.
    pub fn highest(&self) -> Option<(ParticipantId, u64)> {
        self.entries
            .iter()
            .map(|(&id, &value)| (id, value))
            .max_by_key(|&(id, value)| (value, std::cmp::Reverse(id)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, u64)> + '_ {
        self.entries.iter().map(|(&id, &value)| (id, value))
    }
}
