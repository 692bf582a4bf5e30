//! Engine-Konfiguration als JSON; jedes Feld hat einen Standardwert.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Duration;
use warnlern_feedback::{OutcomeThresholds, TrackerConfig};
use warnlern_policy::{ExplorationSchedule, LearnerConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub epsilon_start: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
    pub discount: f32,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub experience_capacity: usize,
    pub update_target_every: u64,
    /// Anzahl fokussierter Alarm-Aktionen (je ein bevorzugter Rohstoff).
    pub focus_slots: usize,
    pub outcome_window_hours: u32,
    pub pending_ttl_hours: u32,
    pub max_pending: usize,
    pub immediate_dismiss_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<PathBuf>,
    pub checkpoint_interval_secs: u64,
    /// Fester Seed für Exploration und Replay-Stichproben (Tests, Replays).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub thresholds: OutcomeThresholds,
    /// Auch "kein Alarm"-Entscheidungen verfolgen und daraus lernen.
    pub track_suppressed: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            discount: 0.95,
            learning_rate: 0.01,
            batch_size: 32,
            experience_capacity: 10_000,
            update_target_every: 10,
            focus_slots: 3,
            outcome_window_hours: 24,
            pending_ttl_hours: 48,
            max_pending: 10_000,
            immediate_dismiss_secs: 60,
            checkpoint_path: None,
            checkpoint_interval_secs: 3600,
            seed: None,
            thresholds: OutcomeThresholds::default(),
            track_suppressed: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn exploration(&self) -> ExplorationSchedule {
        ExplorationSchedule::new(self.epsilon_start, self.epsilon_min, self.epsilon_decay)
    }

    #[must_use]
    pub fn learner(&self) -> LearnerConfig {
        LearnerConfig {
            discount: self.discount,
            batch_size: self.batch_size,
            capacity: self.experience_capacity,
            update_target_every: self.update_target_every,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            outcome_window: Duration::hours(i64::from(self.outcome_window_hours)),
            pending_ttl: Duration::hours(i64::from(self.pending_ttl_hours)),
            max_pending: self.max_pending,
            immediate_dismiss: Duration::seconds(i64::from(self.immediate_dismiss_secs)),
            thresholds: self.thresholds,
        }
    }

    #[must_use]
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::seconds(i64::try_from(self.checkpoint_interval_secs).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{"batch_size": 4, "focus_slots": 1, "thresholds": {"missed_move": 3.0}}"#,
        )
        .expect("valid config");
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.focus_slots, 1);
        assert_eq!(config.pending_ttl_hours, 48);
        assert!((config.thresholds.missed_move - 3.0).abs() < f32::EPSILON);
        assert!((config.thresholds.neutral_move - 0.5).abs() < f32::EPSILON);
        assert!(!config.track_suppressed);
    }

    #[test]
    fn tracker_durations_follow_hours() {
        let tracker = EngineConfig::default().tracker();
        assert_eq!(tracker.outcome_window, Duration::hours(24));
        assert_eq!(tracker.pending_ttl, Duration::hours(48));
        assert_eq!(tracker.immediate_dismiss, Duration::seconds(60));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_path("/definitely/not/here.json").expect_err("missing file");
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
