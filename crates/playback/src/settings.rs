//! Runtime tuning for the engine

use crate::stale::StalePositionPolicy;
use std::time::Duration;

/// Timing and threshold settings shared by the controller and command layers
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Quiet period before a position update is persisted
    pub persist_debounce: Duration,
    /// Upper bound on waiting for the state gate
    pub gate_timeout: Duration,
    /// Upper bound on waiting for a media engine acknowledgement
    pub command_timeout: Duration,
    /// Minimum position delta considered a visible change
    pub significant_change_ms: u64,
    /// Distance from a chapter start treated as boundary jitter
    pub boundary_tolerance_ms: u64,
    /// Seeking back within this much of a chapter start goes to the previous chapter
    pub chapter_restart_window_ms: u64,
    pub stale_policy: StalePositionPolicy,
    /// Speed applied when a book is loaded
    pub default_speed: f32,
}

impl EngineSettings {
    pub fn with_persist_debounce(mut self, debounce: Duration) -> Self {
        self.persist_debounce = debounce;
        self
    }

    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePositionPolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn with_default_speed(mut self, speed: f32) -> Self {
        self.default_speed = speed;
        self
    }

    pub(crate) fn gate_timeout_ms(&self) -> u64 {
        self.gate_timeout.as_millis() as u64
    }

    pub(crate) fn command_timeout_ms(&self) -> u64 {
        self.command_timeout.as_millis() as u64
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            persist_debounce: Duration::from_secs(3),
            gate_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(5),
            significant_change_ms: 1000,
            boundary_tolerance_ms: 1500,
            chapter_restart_window_ms: 3000,
            stale_policy: StalePositionPolicy::default(),
            default_speed: 1.0,
        }
    }
}
