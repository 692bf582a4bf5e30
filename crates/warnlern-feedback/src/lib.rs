#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Closing the loop between recommendations and what happened afterwards.
//!
//! - [`reward`] scores a resolved prediction with a fixed point schedule.
//! - [`tracker`] holds recommendations until feedback and market outcome
//!   arrive and resolves each one exactly once.
//! - [`behavior`] aggregates per-user engagement for state building.
//! - [`stats`] keeps running reward statistics per action.

pub mod behavior;
pub mod reward;
pub mod stats;
pub mod tracker;

pub use behavior::{AlertFrequency, UserBehaviorAggregate, UserBehaviorRepository, UserInsights};
pub use reward::{
    ActualOutcome, OutcomeThresholds, PredictedOutcome, RewardBreakdown, RewardCalculator,
    RewardInput, UserFeedback,
};
pub use stats::{RewardLedger, RewardStatistics};
pub use tracker::{
    FeedbackReceipt, FeedbackStatus, MarketQuote, OutcomeTracker, PendingPrediction, Phase,
    Resolution, ResolvedPrediction, TrackerConfig,
};
