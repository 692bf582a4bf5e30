//! Reward computation for resolved predictions.
//!
//! The point schedule is part of the engine's contract with its operators; it
//! is additive and intentionally not clamped (in practice roughly [-13, +25]).

use serde::{Deserialize, Serialize};
use warnlern_core::{Action, Direction, NewsFeatures, Severity};

/// Alert sent, direction predicted correctly (actual move not neutral).
pub const CORRECT_DIRECTION: f32 = 10.0;
/// Alert sent, but the market did not move.
pub const FALSE_POSITIVE: f32 = -5.0;
/// Alert sent, market moved the other way.
pub const WRONG_DIRECTION: f32 = -3.0;
pub const SEVERITY_MATCH: f32 = 5.0;
pub const CLICKED: f32 = 3.0;
pub const HELPFUL: f32 = 5.0;
pub const DISMISSED_IMMEDIATELY: f32 = -3.0;
pub const MARKED_IRRELEVANT: f32 = -5.0;
pub const COMMODITY_MATCH: f32 = 2.0;
/// No alert sent, market moved more than the missed-move threshold.
pub const MISSED_MOVE: f32 = -8.0;
/// No alert sent, market stayed calm.
pub const CORRECT_RESTRAINT: f32 = 2.0;

/// Price-change thresholds (absolute percent) used to classify outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeThresholds {
    /// Below this the move counts as neutral.
    pub neutral_move: f32,
    /// At or above: medium severity.
    pub medium_move: f32,
    /// At or above: high severity.
    pub high_move: f32,
    /// Above this a suppressed alert counts as a missed move.
    pub missed_move: f32,
}

impl Default for OutcomeThresholds {
    fn default() -> Self {
        Self {
            neutral_move: 0.5,
            medium_move: 1.0,
            high_move: 2.5,
            missed_move: 2.0,
        }
    }
}

/// What the alert implied about the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedOutcome {
    pub direction: Direction,
    pub severity: Severity,
}

impl PredictedOutcome {
    #[must_use]
    pub fn from_news(news: &NewsFeatures) -> Self {
        Self {
            direction: news.sentiment_scores.dominant(),
            severity: news.severity,
        }
    }
}

/// What the market actually did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActualOutcome {
    pub direction: Direction,
    pub price_change_percent: f32,
    pub severity: Severity,
}

impl ActualOutcome {
    #[must_use]
    pub fn from_price_change(price_change_percent: f32, thresholds: &OutcomeThresholds) -> Self {
        let pct = if price_change_percent.is_finite() {
            price_change_percent
        } else {
            0.0
        };
        let magnitude = pct.abs();
        let direction = if magnitude < thresholds.neutral_move {
            Direction::Neutral
        } else if pct > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        };
        let severity = if magnitude >= thresholds.high_move {
            Severity::High
        } else if magnitude >= thresholds.medium_move {
            Severity::Medium
        } else {
            Severity::Low
        };
        Self {
            direction,
            price_change_percent: pct,
            severity,
        }
    }

    /// Substituted when no market outcome arrives in time.
    #[must_use]
    pub fn neutral_default() -> Self {
        Self {
            direction: Direction::Neutral,
            price_change_percent: 0.0,
            severity: Severity::Low,
        }
    }
}

/// Engagement merged from all feedback events for one alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFeedback {
    pub clicked: bool,
    pub found_helpful: bool,
    pub dismissed: bool,
    pub dismissed_immediately: bool,
    pub marked_irrelevant: bool,
}

/// Everything the reward depends on.
#[derive(Debug, Clone, Copy)]
pub struct RewardInput<'a> {
    pub action: Action,
    pub predicted: PredictedOutcome,
    pub actual: ActualOutcome,
    pub feedback: Option<&'a UserFeedback>,
    pub commodity_focus: Option<&'a str>,
    pub preferred_commodities: &'a [String],
}

/// Reward total plus the terms that produced it (for logging).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub total: f32,
    pub terms: Vec<(&'static str, f32)>,
}

impl RewardBreakdown {
    fn add(&mut self, name: &'static str, points: f32) {
        self.total += points;
        self.terms.push((name, points));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RewardCalculator {
    thresholds: OutcomeThresholds,
}

impl RewardCalculator {
    #[must_use]
    pub fn new(thresholds: OutcomeThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &OutcomeThresholds {
        &self.thresholds
    }

    #[must_use]
    pub fn compute(&self, input: &RewardInput<'_>) -> RewardBreakdown {
        let mut reward = RewardBreakdown {
            total: 0.0,
            terms: Vec::new(),
        };

        if !input.action.sends_alert() {
            if input.actual.price_change_percent.abs() > self.thresholds.missed_move {
                reward.add("missed_move", MISSED_MOVE);
            } else {
                reward.add("correct_restraint", CORRECT_RESTRAINT);
            }
            return reward;
        }

        match (input.predicted.direction, input.actual.direction) {
            (_, Direction::Neutral) => reward.add("false_positive", FALSE_POSITIVE),
            (p, a) if p == a => reward.add("correct_direction", CORRECT_DIRECTION),
            _ => reward.add("wrong_direction", WRONG_DIRECTION),
        }
        if input.predicted.severity == input.actual.severity {
            reward.add("severity_match", SEVERITY_MATCH);
        }

        if let Some(feedback) = input.feedback {
            if feedback.clicked {
                reward.add("clicked", CLICKED);
            }
            if feedback.found_helpful {
                reward.add("helpful", HELPFUL);
            }
            if feedback.dismissed_immediately {
                reward.add("dismissed_immediately", DISMISSED_IMMEDIATELY);
            }
            if feedback.marked_irrelevant {
                reward.add("marked_irrelevant", MARKED_IRRELEVANT);
            }
        }

        if let Some(focus) = input.commodity_focus {
            let focus = focus.trim();
            if input
                .preferred_commodities
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(focus))
            {
                reward.add("commodity_match", COMMODITY_MATCH);
            }
        }

        reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warnlern_core::Priority;

    fn high_up() -> PredictedOutcome {
        PredictedOutcome {
            direction: Direction::Up,
            severity: Severity::High,
        }
    }

    fn up_three_percent() -> ActualOutcome {
        ActualOutcome::from_price_change(3.0, &OutcomeThresholds::default())
    }

    #[test]
    fn classification_of_price_changes() {
        let t = OutcomeThresholds::default();
        let up = ActualOutcome::from_price_change(3.0, &t);
        assert_eq!(up.direction, Direction::Up);
        assert_eq!(up.severity, Severity::High);

        let down = ActualOutcome::from_price_change(-1.2, &t);
        assert_eq!(down.direction, Direction::Down);
        assert_eq!(down.severity, Severity::Medium);

        let flat = ActualOutcome::from_price_change(0.3, &t);
        assert_eq!(flat.direction, Direction::Neutral);
        assert_eq!(flat.severity, Severity::Low);

        let garbage = ActualOutcome::from_price_change(f32::NAN, &t);
        assert_eq!(garbage, ActualOutcome::neutral_default());
    }

    #[test]
    fn correct_high_alert_with_click_and_helpful_scores_23() {
        let feedback = UserFeedback {
            clicked: true,
            found_helpful: true,
            ..UserFeedback::default()
        };
        let reward = RewardCalculator::default().compute(&RewardInput {
            action: Action::Alert(Priority::High),
            predicted: high_up(),
            actual: up_three_percent(),
            feedback: Some(&feedback),
            commodity_focus: Some("gold"),
            preferred_commodities: &[],
        });
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(reward.total, 23.0);
        }
    }

    #[test]
    fn commodity_preference_adds_two() {
        let feedback = UserFeedback {
            clicked: true,
            found_helpful: true,
            ..UserFeedback::default()
        };
        let preferred = vec!["Gold".to_string()];
        let reward = RewardCalculator::default().compute(&RewardInput {
            action: Action::Alert(Priority::High),
            predicted: high_up(),
            actual: up_three_percent(),
            feedback: Some(&feedback),
            commodity_focus: Some("gold"),
            preferred_commodities: &preferred,
        });
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(reward.total, 25.0);
        }
        assert!(reward.terms.iter().any(|(name, _)| *name == "commodity_match"));
    }

    #[test]
    fn restraint_rewards() {
        let calc = RewardCalculator::default();
        let t = OutcomeThresholds::default();
        let calm = calc.compute(&RewardInput {
            action: Action::NoAlert,
            predicted: high_up(),
            actual: ActualOutcome::from_price_change(0.3, &t),
            feedback: None,
            commodity_focus: None,
            preferred_commodities: &[],
        });
        let missed = calc.compute(&RewardInput {
            action: Action::NoAlert,
            predicted: high_up(),
            actual: ActualOutcome::from_price_change(5.0, &t),
            feedback: None,
            commodity_focus: None,
            preferred_commodities: &[],
        });
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(calm.total, 2.0);
            assert_eq!(missed.total, -8.0);
        }
    }

    #[test]
    fn false_positive_with_immediate_dismissal() {
        let feedback = UserFeedback {
            dismissed: true,
            dismissed_immediately: true,
            ..UserFeedback::default()
        };
        let reward = RewardCalculator::default().compute(&RewardInput {
            action: Action::Alert(Priority::Low),
            predicted: PredictedOutcome {
                direction: Direction::Down,
                severity: Severity::Medium,
            },
            actual: ActualOutcome::neutral_default(),
            feedback: Some(&feedback),
            commodity_focus: None,
            preferred_commodities: &[],
        });
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(reward.total, -8.0);
        }
    }

    #[test]
    fn wrong_direction_marked_irrelevant() {
        let feedback = UserFeedback {
            marked_irrelevant: true,
            ..UserFeedback::default()
        };
        let reward = RewardCalculator::default().compute(&RewardInput {
            action: Action::Focused(0),
            predicted: high_up(),
            actual: ActualOutcome::from_price_change(-1.5, &OutcomeThresholds::default()),
            feedback: Some(&feedback),
            commodity_focus: Some("oil"),
            preferred_commodities: &["oil".to_string()],
        });
        // -3 wrong direction, -5 irrelevant, +2 commodity match
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(reward.total, -6.0);
        }
    }
}
