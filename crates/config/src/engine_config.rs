//! Playback engine configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storystream_core::PlaybackSpeed;
use storystream_playback::{EngineSettings, StalePositionPolicy};

/// Timing and threshold settings for the state engine
///
/// All durations are in milliseconds so the TOML stays flat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before a position update is persisted
    pub persist_debounce_ms: u64,

    /// Upper bound on waiting for the state gate
    pub gate_timeout_ms: u64,

    /// Upper bound on waiting for the media engine to acknowledge a command
    pub command_timeout_ms: u64,

    /// Position delta that counts as a visible change
    pub significant_change_ms: u64,

    /// Distance from a chapter start treated as boundary jitter
    pub boundary_tolerance_ms: u64,

    /// Skipping back within this window of a chapter start goes to the previous chapter
    pub chapter_restart_window_ms: u64,

    /// Drop feed positions that look like a stale read of a reset player
    pub stale_rejection_enabled: bool,

    /// Positions at or below this are "near zero"
    pub stale_near_zero_ms: u64,

    /// Only positions at or past this can be dropped to near zero as stale
    pub stale_min_drop_ms: u64,

    /// Speed applied when a book is loaded (0.5 - 3.0)
    pub default_speed: f32,
}

impl EngineConfig {
    /// Converts the section into runtime settings
    pub fn to_settings(&self) -> EngineSettings {
        let stale_policy = if self.stale_rejection_enabled {
            StalePositionPolicy::new(self.stale_near_zero_ms, self.stale_min_drop_ms)
        } else {
            StalePositionPolicy::disabled()
        };

        EngineSettings {
            persist_debounce: Duration::from_millis(self.persist_debounce_ms),
            gate_timeout: Duration::from_millis(self.gate_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            significant_change_ms: self.significant_change_ms,
            boundary_tolerance_ms: self.boundary_tolerance_ms,
            chapter_restart_window_ms: self.chapter_restart_window_ms,
            stale_policy,
            default_speed: self.default_speed,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persist_debounce_ms: 3_000,
            gate_timeout_ms: 2_000,
            command_timeout_ms: 5_000,
            significant_change_ms: 1_000,
            boundary_tolerance_ms: 1_500,
            chapter_restart_window_ms: 3_000,
            stale_rejection_enabled: true,
            stale_near_zero_ms: 1_000,
            stale_min_drop_ms: 5_000,
            default_speed: 1.0,
        }
    }
}

impl ConfigSection for EngineConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(
                self.persist_debounce_ms,
                0,
                600_000,
                "engine.persist_debounce_ms",
            ),
            Validator::in_range(self.gate_timeout_ms, 1, 60_000, "engine.gate_timeout_ms"),
            Validator::in_range(
                self.command_timeout_ms,
                1,
                120_000,
                "engine.command_timeout_ms",
            ),
            Validator::in_range(
                self.boundary_tolerance_ms,
                0,
                60_000,
                "engine.boundary_tolerance_ms",
            ),
            Validator::in_range(
                self.chapter_restart_window_ms,
                0,
                60_000,
                "engine.chapter_restart_window_ms",
            ),
            Validator::in_range(
                self.default_speed,
                PlaybackSpeed::MIN,
                PlaybackSpeed::MAX,
                "engine.default_speed",
            ),
        ];

        if self.stale_rejection_enabled {
            results.push(Validator::ordered(
                self.stale_near_zero_ms,
                self.stale_min_drop_ms,
                "engine.stale_near_zero_ms",
                "engine.stale_min_drop_ms",
            ));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "engine"
    }
}
