//! Registry of recommendations waiting for their feedback and market outcome.
//!
//! A record is `open` when created, `partially resolved` once either signal
//! arrived, and resolved exactly once: resolution removes it from the
//! registry under the lock, so concurrent triggers for the same tracking id
//! cannot both produce a learning transition.

use crate::reward::{ActualOutcome, OutcomeThresholds, PredictedOutcome, UserFeedback};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use warnlern_core::{
    Action, FeedbackEvent, FeedbackType, MarketContext, MarketOutcomeEvent, NewsFeatures,
    StateVector,
};

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Market outcomes attach to records created at most this long ago.
    pub outcome_window: Duration,
    /// Records older than this are force-resolved by [`OutcomeTracker::sweep_expired`].
    pub pending_ttl: Duration,
    /// Registry cap; the oldest record is force-resolved on overflow.
    pub max_pending: usize,
    /// Dismissals at or below this response time count as immediate.
    pub immediate_dismiss: Duration,
    pub thresholds: OutcomeThresholds,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            outcome_window: Duration::hours(24),
            pending_ttl: Duration::hours(48),
            max_pending: 10_000,
            immediate_dismiss: Duration::seconds(60),
            thresholds: OutcomeThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Open,
    PartiallyResolved,
}

/// One recommendation awaiting resolution.
#[derive(Debug, Clone)]
pub struct PendingPrediction {
    pub tracking_id: String,
    pub user_id: String,
    pub created_at: OffsetDateTime,
    pub news: NewsFeatures,
    /// Market context at decision time.
    pub market: MarketContext,
    pub state: StateVector,
    pub action: Action,
    pub action_id: usize,
    pub predicted: PredictedOutcome,
    /// Normalized news commodity; market outcomes are matched against it.
    pub commodity: Option<String>,
    pub commodity_focus: Option<String>,
    pub preferred_commodities: Vec<String>,
    pub actual: Option<ActualOutcome>,
    pub feedback: Option<UserFeedback>,
}

impl PendingPrediction {
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.actual.is_some() || self.feedback.is_some() {
            Phase::PartiallyResolved
        } else {
            Phase::Open
        }
    }
}

/// Why a record left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Feedback,
    MarketOutcome,
    Expired,
    Evicted,
}

impl Resolution {
    /// Forced resolutions end the episode.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Resolution::Expired | Resolution::Evicted)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPrediction {
    pub record: PendingPrediction,
    /// Market outcome, or the neutral default if none arrived.
    pub actual: ActualOutcome,
    pub resolution: Resolution,
    pub resolved_at: OffsetDateTime,
}

/// What the feedback did to the behavior counters' point of view.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackReceipt {
    pub user_id: String,
    pub feedback_type: FeedbackType,
    /// Focused commodity, else the news commodity.
    pub commodity: Option<String>,
    pub response_secs: f32,
    /// `false` for repeated clicks on the same alert.
    pub first_of_kind: bool,
}

#[derive(Debug, Clone)]
pub enum FeedbackStatus {
    /// Unknown or already resolved tracking id.
    NotFound,
    Recorded(FeedbackReceipt),
    Resolved(FeedbackReceipt, Box<ResolvedPrediction>),
}

/// Most recent move reported for a commodity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketQuote {
    pub price_change_percent: f32,
    pub timeframe: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

#[derive(Debug, Default)]
pub struct OutcomeTracker {
    config: TrackerConfig,
    registry: Mutex<HashMap<String, PendingPrediction>>,
    quotes: RwLock<HashMap<String, MarketQuote>>,
}

impl OutcomeTracker {
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config: TrackerConfig {
                max_pending: config.max_pending.max(1),
                ..config
            },
            registry: Mutex::new(HashMap::new()),
            quotes: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    #[must_use]
    pub fn phase(&self, tracking_id: &str) -> Option<Phase> {
        self.registry.lock().get(tracking_id).map(PendingPrediction::phase)
    }

    #[must_use]
    pub fn latest_quote(&self, commodity: &str) -> Option<MarketQuote> {
        self.quotes.read().get(&normalize(commodity)).cloned()
    }

    /// Registers a record. Returns records force-resolved to make room.
    pub fn open(&self, record: PendingPrediction, now: OffsetDateTime) -> Vec<ResolvedPrediction> {
        let mut evicted = Vec::new();
        {
            let mut registry = self.registry.lock();
            while registry.len() >= self.config.max_pending {
                let oldest = registry
                    .values()
                    .min_by(|a, b| {
                        a.created_at
                            .cmp(&b.created_at)
                            .then_with(|| a.tracking_id.cmp(&b.tracking_id))
                    })
                    .map(|r| r.tracking_id.clone());
                match oldest.and_then(|id| registry.remove(&id)) {
                    Some(old) => evicted.push(old),
                    None => break,
                }
            }
            tracing::debug!(
                tracking_id = %record.tracking_id,
                user_id = %record.user_id,
                action = %record.action.name(),
                "prediction opened"
            );
            if let Some(previous) = registry.insert(record.tracking_id.clone(), record) {
                tracing::warn!(
                    tracking_id = %previous.tracking_id,
                    "tracking id reused; replacing record"
                );
                evicted.push(previous);
            }
        }
        if !evicted.is_empty() {
            tracing::warn!(count = evicted.len(), "pending registry full; evicting oldest records");
        }
        evicted
            .into_iter()
            .map(|r| resolve(r, Resolution::Evicted, now))
            .collect()
    }

    /// Merges user feedback into the record. `helpful`, `not_helpful` and
    /// `dismissed` always resolve; a click resolves only if the market outcome
    /// is already attached or the outcome window has passed.
    pub fn record_feedback(&self, event: &FeedbackEvent, now: OffsetDateTime) -> FeedbackStatus {
        let mut registry = self.registry.lock();
        let Some(record) = registry.get_mut(&event.tracking_id) else {
            tracing::debug!(
                tracking_id = %event.tracking_id,
                "feedback for unknown or resolved prediction"
            );
            return FeedbackStatus::NotFound;
        };

        let elapsed = now - record.created_at;
        let response_secs = event
            .response_time_seconds()
            .unwrap_or_else(|| elapsed.as_seconds_f32().max(0.0));

        let feedback = record.feedback.get_or_insert_with(UserFeedback::default);
        let first_of_kind = match event.feedback_type {
            FeedbackType::Clicked => !std::mem::replace(&mut feedback.clicked, true),
            FeedbackType::Helpful => !std::mem::replace(&mut feedback.found_helpful, true),
            FeedbackType::NotHelpful => !std::mem::replace(&mut feedback.marked_irrelevant, true),
            FeedbackType::Dismissed => {
                let immediate = response_secs <= self.config.immediate_dismiss.as_seconds_f32();
                feedback.dismissed_immediately |= immediate;
                !std::mem::replace(&mut feedback.dismissed, true)
            }
        };

        let receipt = FeedbackReceipt {
            user_id: record.user_id.clone(),
            feedback_type: event.feedback_type,
            commodity: record.commodity_focus.clone().or_else(|| record.commodity.clone()),
            response_secs,
            first_of_kind,
        };

        let outcome_overdue = record.actual.is_none() && elapsed >= self.config.outcome_window;
        let complete = event.feedback_type.completes_prediction()
            || record.actual.is_some()
            || outcome_overdue;
        if !complete {
            return FeedbackStatus::Recorded(receipt);
        }

        let removed = registry.remove(&event.tracking_id);
        drop(registry);
        match removed {
            Some(record) => {
                let resolved = resolve(record, Resolution::Feedback, now);
                FeedbackStatus::Resolved(receipt, Box::new(resolved))
            }
            None => FeedbackStatus::NotFound,
        }
    }

    /// Attaches the outcome to every open record for the commodity created
    /// within the outcome window. Records that already carry feedback, or
    /// that never expect any (no alert sent), resolve immediately.
    pub fn record_market_outcome(
        &self,
        event: &MarketOutcomeEvent,
        now: OffsetDateTime,
    ) -> Vec<ResolvedPrediction> {
        let commodity = normalize(&event.commodity);
        let actual =
            ActualOutcome::from_price_change(event.price_change_percent, &self.config.thresholds);
        self.quotes.write().insert(
            commodity.clone(),
            MarketQuote {
                price_change_percent: actual.price_change_percent,
                timeframe: event.timeframe.clone(),
                at: now,
            },
        );

        let window_start = now - self.config.outcome_window;
        let mut completed = Vec::new();
        {
            let mut registry = self.registry.lock();
            let mut ready = Vec::new();
            for record in registry.values_mut() {
                if record.actual.is_some()
                    || record.created_at < window_start
                    || record.commodity.as_deref() != Some(commodity.as_str())
                {
                    continue;
                }
                record.actual = Some(actual);
                if record.feedback.is_some() || !record.action.sends_alert() {
                    ready.push(record.tracking_id.clone());
                }
            }
            for id in ready {
                if let Some(record) = registry.remove(&id) {
                    completed.push(record);
                }
            }
        }
        tracing::debug!(
            commodity = %commodity,
            resolved = completed.len(),
            "market outcome recorded"
        );
        completed
            .into_iter()
            .map(|r| resolve(r, Resolution::MarketOutcome, now))
            .collect()
    }

    /// Force-resolves every record older than the pending TTL.
    pub fn sweep_expired(&self, now: OffsetDateTime) -> Vec<ResolvedPrediction> {
        let cutoff = now - self.config.pending_ttl;
        let expired: Vec<PendingPrediction> = {
            let mut registry = self.registry.lock();
            let ids: Vec<String> = registry
                .values()
                .filter(|r| r.created_at <= cutoff)
                .map(|r| r.tracking_id.clone())
                .collect();
            ids.iter().filter_map(|id| registry.remove(id)).collect()
        };
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired pending predictions");
        }
        expired
            .into_iter()
            .map(|r| resolve(r, Resolution::Expired, now))
            .collect()
    }
}

fn resolve(
    record: PendingPrediction,
    resolution: Resolution,
    now: OffsetDateTime,
) -> ResolvedPrediction {
    ResolvedPrediction {
        actual: record.actual.unwrap_or_else(ActualOutcome::neutral_default),
        record,
        resolution,
        resolved_at: now,
    }
}

pub(crate) fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
