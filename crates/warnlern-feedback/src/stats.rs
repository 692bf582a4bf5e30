//! Running reward statistics per action.

use serde::Serialize;
use std::collections::BTreeMap;

/// Minimum resolved predictions per action before it is judged.
const PATTERN_MIN_OUTCOMES_PER_ACTION: usize = 5;
/// Negative-reward share above which an action is flagged.
const PATTERN_HIGH_NEGATIVE_THRESHOLD: f32 = 0.6;

/// Statistics aggregated from resolved predictions.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RewardStatistics {
    /// Total number of outcomes (positive + non-positive).
    pub total: usize,
    pub positive: usize,
    pub non_positive: usize,
    pub total_reward: f32,
}

impl RewardStatistics {
    pub fn record(&mut self, reward: f32) {
        if !reward.is_finite() {
            return;
        }
        self.total += 1;
        if reward > 0.0 {
            self.positive += 1;
        } else {
            self.non_positive += 1;
        }
        self.total_reward += reward;
    }

    /// Share of outcomes with a positive reward (0.0 to 1.0).
    #[must_use]
    pub fn positive_rate(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.positive as f32 / self.total as f32
        }
    }

    #[must_use]
    pub fn average_reward(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_reward / self.total as f32
        }
    }
}

/// Reward statistics keyed by action name, plus an overall total.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RewardLedger {
    by_action: BTreeMap<String, RewardStatistics>,
    overall: RewardStatistics,
}

impl RewardLedger {
    pub fn record(&mut self, action: &str, reward: f32) {
        self.by_action
            .entry(action.to_string())
            .or_default()
            .record(reward);
        self.overall.record(reward);
    }

    #[must_use]
    pub fn action(&self, action: &str) -> Option<&RewardStatistics> {
        self.by_action.get(action)
    }

    #[must_use]
    pub fn overall(&self) -> &RewardStatistics {
        &self.overall
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RewardStatistics)> {
        self.by_action.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Human-readable notes on actions that mostly earn non-positive rewards.
    #[must_use]
    pub fn underperforming(&self) -> Vec<String> {
        self.by_action
            .iter()
            .filter(|(_, stats)| {
                stats.total >= PATTERN_MIN_OUTCOMES_PER_ACTION
                    && 1.0 - stats.positive_rate() > PATTERN_HIGH_NEGATIVE_THRESHOLD
            })
            .map(|(action, stats)| {
                format!(
                    "Action '{}' earned non-positive rewards in {:.1}% of {} outcomes (avg {:.2})",
                    action,
                    (1.0 - stats.positive_rate()) * 100.0,
                    stats.total,
                    stats.average_reward()
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_calculate_rates() {
        let mut stats = RewardStatistics::default();
        for r in [10.0, -5.0, 2.0, 0.0] {
            stats.record(r);
        }
        stats.record(f32::NAN);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.positive, 2);
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(stats.positive_rate(), 0.5);
            assert_eq!(stats.average_reward(), 1.75);
        }
    }

    #[test]
    fn empty_statistics_are_zero() {
        let stats = RewardStatistics::default();
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(stats.positive_rate(), 0.0);
            assert_eq!(stats.average_reward(), 0.0);
        }
    }

    #[test]
    fn ledger_flags_mostly_negative_actions() {
        let mut ledger = RewardLedger::default();
        for _ in 0..6 {
            ledger.record("alert_low", -5.0);
            ledger.record("no_alert", 2.0);
        }
        let notes = ledger.underperforming();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("alert_low"));
        assert_eq!(ledger.overall().total, 12);
        assert_eq!(ledger.action("no_alert").map(|s| s.positive), Some(6));
    }
}
