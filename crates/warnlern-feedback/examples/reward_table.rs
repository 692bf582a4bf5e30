//! Prints the reward breakdown for a handful of typical resolutions.
//!
//! Run with: cargo run -p warnlern-feedback --example reward_table

use warnlern_core::{Action, Direction, Priority, Severity};
use warnlern_feedback::{
    ActualOutcome, OutcomeThresholds, PredictedOutcome, RewardCalculator, RewardInput, UserFeedback,
};

fn main() {
    let calculator = RewardCalculator::default();
    let thresholds = OutcomeThresholds::default();
    let bullish_high = PredictedOutcome {
        direction: Direction::Up,
        severity: Severity::High,
    };
    let engaged = UserFeedback {
        clicked: true,
        found_helpful: true,
        ..UserFeedback::default()
    };
    let brushed_off = UserFeedback {
        dismissed: true,
        dismissed_immediately: true,
        ..UserFeedback::default()
    };
    let preferred = vec!["gold".to_string()];

    let scenarios: Vec<(&str, RewardInput<'_>)> = vec![
        (
            "correct high alert, clicked + helpful, preferred commodity",
            RewardInput {
                action: Action::Focused(0),
                predicted: bullish_high,
                actual: ActualOutcome::from_price_change(3.0, &thresholds),
                feedback: Some(&engaged),
                commodity_focus: Some("gold"),
                preferred_commodities: &preferred,
            },
        ),
        (
            "alert on a flat market, dismissed right away",
            RewardInput {
                action: Action::Alert(Priority::Low),
                predicted: bullish_high,
                actual: ActualOutcome::from_price_change(0.2, &thresholds),
                feedback: Some(&brushed_off),
                commodity_focus: Some("oil"),
                preferred_commodities: &preferred,
            },
        ),
        (
            "no alert, market stayed calm",
            RewardInput {
                action: Action::NoAlert,
                predicted: bullish_high,
                actual: ActualOutcome::from_price_change(-1.1, &thresholds),
                feedback: None,
                commodity_focus: None,
                preferred_commodities: &preferred,
            },
        ),
        (
            "no alert, market moved 4%",
            RewardInput {
                action: Action::NoAlert,
                predicted: bullish_high,
                actual: ActualOutcome::from_price_change(4.0, &thresholds),
                feedback: None,
                commodity_focus: None,
                preferred_commodities: &preferred,
            },
        ),
    ];

    for (label, input) in &scenarios {
        let reward = calculator.compute(input);
        println!("{label}: {:+.0}", reward.total);
        for (term, points) in &reward.terms {
            println!("    {term:<24} {points:+.0}");
        }
    }
}
