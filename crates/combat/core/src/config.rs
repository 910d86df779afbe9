use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine tunables shared by the action processor and the runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The host's auto-attack cadence for real-time sessions. The shared
    /// tick driver runs at a finer period ([`EngineConfig::scheduler_period`])
    /// so tick hooks see sub-interval granularity.
    pub tick_interval: Duration,
    /// Cadence at which damage/heal-over-time effects apply in real time.
    pub effect_tick_interval: Duration,
    /// When set, sessions with no action for this long are force-ended with
    /// a `Timeout` status by the tick sweep. Off by default.
    pub idle_timeout: Option<Duration>,
    pub flee: FleeTuning,
}

impl EngineConfig {
    /// Upper bound on the shared tick driver period.
    pub const MAX_SCHEDULER_PERIOD: Duration = Duration::from_millis(500);

    pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_EFFECT_TICK_INTERVAL: Duration = Duration::from_secs(1);

    /// Effect id used by the built-in `Defend` action.
    pub const GUARD_EFFECT_ID: &'static str = "guard";
    /// Defense bonus (percent) granted while defending.
    pub const GUARD_DEFENSE_PERCENT: i32 = 50;

    /// Period of the shared tick driver: a quarter of the configured
    /// interval, capped so hosts always get at least 2 Hz resolution.
    pub fn scheduler_period(&self) -> Duration {
        (self.tick_interval / 4).min(Self::MAX_SCHEDULER_PERIOD)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Self::DEFAULT_TICK_INTERVAL,
            effect_tick_interval: Self::DEFAULT_EFFECT_TICK_INTERVAL,
            idle_timeout: None,
            flee: FleeTuning::default(),
        }
    }
}

/// Balance parameters for flee resolution.
///
/// Chance is `base_chance + (speed - avg_enemy_speed) * speed_factor`,
/// clamped to `[min_chance, max_chance]`; a failed attempt reports a
/// suggested penalty of `max_health / penalty_divisor`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FleeTuning {
    pub base_chance: f64,
    pub speed_factor: f64,
    pub min_chance: f64,
    pub max_chance: f64,
    pub penalty_divisor: u32,
}

impl Default for FleeTuning {
    fn default() -> Self {
        Self {
            base_chance: 0.5,
            speed_factor: 0.05,
            min_chance: 0.1,
            max_chance: 0.9,
            penalty_divisor: 10,
        }
    }
}
