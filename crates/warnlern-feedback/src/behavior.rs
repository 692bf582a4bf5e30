//! Per-user engagement counters.
//!
//! Every user has exactly one aggregate. Counters only grow, and engagement
//! counters never exceed the number of alerts actually sent to the user.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;
use warnlern_core::BehaviorSnapshot;

/// Preferred commodities reported per user (declared ones first).
pub const PREFERRED_LIMIT: usize = 5;
/// Click-rate at or above which a user is considered to want frequent alerts.
const HIGH_FREQUENCY_CLICK_RATE: f32 = 0.5;
/// Click-rate below which a user is considered to want few alerts.
const LOW_FREQUENCY_CLICK_RATE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFrequency {
    Low,
    Medium,
    High,
}

/// Read-only summary of a user's engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInsights {
    pub total_alerts: u64,
    pub clicked_alerts: u64,
    pub click_rate: f32,
    /// Seconds; `0.0` while no response was observed.
    pub avg_response_time: f32,
    pub preferred_commodities: Vec<String>,
    pub preferred_alert_frequency: AlertFrequency,
    /// Share of clicks per commodity.
    pub commodity_interests: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserBehaviorAggregate {
    alerts_sent: u64,
    clicked: u64,
    dismissed: u64,
    helpful: u64,
    not_helpful: u64,
    total_response_secs: f64,
    responses: u64,
    commodity_clicks: BTreeMap<String, u64>,
    declared: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    last_alert_at: Option<OffsetDateTime>,
}

impl UserBehaviorAggregate {
    #[must_use]
    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent
    }

    #[must_use]
    pub fn clicked(&self) -> u64 {
        self.clicked
    }

    #[must_use]
    pub fn dismissed(&self) -> u64 {
        self.dismissed
    }

    #[must_use]
    pub fn helpful(&self) -> u64 {
        self.helpful
    }

    #[must_use]
    pub fn not_helpful(&self) -> u64 {
        self.not_helpful
    }

    #[must_use]
    pub fn last_alert_at(&self) -> Option<OffsetDateTime> {
        self.last_alert_at
    }

    #[must_use]
    pub fn avg_response_secs(&self) -> Option<f32> {
        if self.responses == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        {
            Some((self.total_response_secs / self.responses as f64) as f32)
        }
    }

    #[must_use]
    pub fn click_rate(&self) -> f32 {
        if self.alerts_sent == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.clicked as f32 / self.alerts_sent as f32
        }
    }

    /// Declared preferences first, then commodities by click count.
    #[must_use]
    pub fn preferred_commodities(&self) -> Vec<String> {
        let mut clicked: Vec<(&String, &u64)> = self.commodity_clicks.iter().collect();
        clicked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let mut preferred: Vec<String> = Vec::new();
        for commodity in self.declared.iter().chain(clicked.into_iter().map(|(c, _)| c)) {
            if preferred.len() >= PREFERRED_LIMIT {
                break;
            }
            if !preferred.contains(commodity) {
                preferred.push(commodity.clone());
            }
        }
        preferred
    }

    #[must_use]
    pub fn snapshot(&self) -> BehaviorSnapshot {
        BehaviorSnapshot {
            alerts_sent: self.alerts_sent,
            clicked: self.clicked,
            dismissed: self.dismissed,
            helpful: self.helpful,
            avg_response_secs: self.avg_response_secs(),
            commodity_clicks: self.commodity_clicks.clone(),
            preferred_commodities: self.preferred_commodities(),
        }
    }

    #[must_use]
    pub fn insights(&self) -> UserInsights {
        let click_rate = self.click_rate();
        let preferred_alert_frequency = if self.alerts_sent == 0 {
            AlertFrequency::Medium
        } else if click_rate >= HIGH_FREQUENCY_CLICK_RATE {
            AlertFrequency::High
        } else if click_rate < LOW_FREQUENCY_CLICK_RATE {
            AlertFrequency::Low
        } else {
            AlertFrequency::Medium
        };

        let total_clicks: u64 = self.commodity_clicks.values().sum();
        #[allow(clippy::cast_precision_loss)]
        let commodity_interests = self
            .commodity_clicks
            .iter()
            .map(|(c, n)| (c.clone(), *n as f32 / total_clicks.max(1) as f32))
            .collect();

        UserInsights {
            total_alerts: self.alerts_sent,
            clicked_alerts: self.clicked,
            click_rate,
            avg_response_time: self.avg_response_secs().unwrap_or(0.0),
            preferred_commodities: self.preferred_commodities(),
            preferred_alert_frequency,
            commodity_interests,
        }
    }

    fn add_response(&mut self, secs: Option<f32>) {
        if let Some(secs) = secs.filter(|s| s.is_finite() && *s >= 0.0) {
            self.total_response_secs += f64::from(secs);
            self.responses += 1;
        }
    }
}

/// Concurrent map from user id to [`UserBehaviorAggregate`].
///
/// Reads for state building take a shared lock; updates lock exclusively for
/// the duration of one counter change.
#[derive(Debug, Default)]
pub struct UserBehaviorRepository {
    users: RwLock<HashMap<String, UserBehaviorAggregate>>,
}

impl UserBehaviorRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Snapshot for state building. Unknown users get neutral defaults and
    /// are not inserted.
    #[must_use]
    pub fn snapshot(&self, user_id: &str) -> BehaviorSnapshot {
        self.users
            .read()
            .get(user_id)
            .map(UserBehaviorAggregate::snapshot)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn insights(&self, user_id: &str) -> Option<UserInsights> {
        self.users.read().get(user_id).map(UserBehaviorAggregate::insights)
    }

    #[must_use]
    pub fn aggregate(&self, user_id: &str) -> Option<UserBehaviorAggregate> {
        self.users.read().get(user_id).cloned()
    }

    pub fn record_alert_sent(&self, user_id: &str, at: OffsetDateTime) {
        let mut users = self.users.write();
        let agg = users.entry(user_id.to_string()).or_default();
        agg.alerts_sent += 1;
        agg.last_alert_at = Some(at);
    }

    /// Counts a click; ignored when it would exceed the alerts sent.
    pub fn record_click(&self, user_id: &str, commodity: Option<&str>, response_secs: Option<f32>) {
        let mut users = self.users.write();
        let Some(agg) = users.get_mut(user_id) else {
            tracing::debug!(user_id, "click for user without alerts ignored");
            return;
        };
        if agg.clicked >= agg.alerts_sent {
            tracing::debug!(user_id, "click count already equals alerts sent");
            return;
        }
        agg.clicked += 1;
        agg.add_response(response_secs);
        if let Some(c) = commodity.map(normalize).filter(|c| !c.is_empty()) {
            *agg.commodity_clicks.entry(c).or_insert(0) += 1;
        }
    }

    pub fn record_dismissal(&self, user_id: &str, response_secs: Option<f32>) {
        let mut users = self.users.write();
        if let Some(agg) = users.get_mut(user_id) {
            if agg.dismissed < agg.alerts_sent {
                agg.dismissed += 1;
                agg.add_response(response_secs);
            }
        }
    }

    pub fn record_helpfulness(&self, user_id: &str, helpful: bool) {
        let mut users = self.users.write();
        if let Some(agg) = users.get_mut(user_id) {
            let counter = if helpful {
                &mut agg.helpful
            } else {
                &mut agg.not_helpful
            };
            if *counter < agg.alerts_sent {
                *counter += 1;
            }
        }
    }

    /// Replaces the user's declared preferences (normalized, deduplicated).
    pub fn declare_preferences(&self, user_id: &str, commodities: &[String]) {
        let mut declared: Vec<String> = Vec::new();
        for c in commodities.iter().map(|c| normalize(c)).filter(|c| !c.is_empty()) {
            if !declared.contains(&c) {
                declared.push(c);
            }
        }
        self.users
            .write()
            .entry(user_id.to_string())
            .or_default()
            .declared = declared;
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_gets_neutral_snapshot() {
        let repo = UserBehaviorRepository::new();
        assert_eq!(repo.snapshot("nobody"), BehaviorSnapshot::default());
        assert!(repo.is_empty());
        assert!(repo.insights("nobody").is_none());
    }

    #[test]
    fn clicks_never_exceed_alerts_sent() {
        let repo = UserBehaviorRepository::new();
        repo.record_click("u", Some("gold"), None);
        assert!(repo.is_empty());

        repo.record_alert_sent("u", OffsetDateTime::UNIX_EPOCH);
        repo.record_click("u", Some("Gold"), Some(30.0));
        repo.record_click("u", Some("gold"), Some(30.0));

        let agg = repo.aggregate("u").expect("aggregate exists");
        assert_eq!(agg.alerts_sent(), 1);
        assert_eq!(agg.clicked(), 1);
        assert_eq!(agg.avg_response_secs(), Some(30.0));
        assert_eq!(repo.snapshot("u").commodity_clicks.get("gold"), Some(&1));
    }

    #[test]
    fn declared_preferences_come_first() {
        let repo = UserBehaviorRepository::new();
        for _ in 0..3 {
            repo.record_alert_sent("u", OffsetDateTime::UNIX_EPOCH);
        }
        repo.record_click("u", Some("oil"), None);
        repo.record_click("u", Some("oil"), None);
        repo.record_click("u", Some("copper"), None);
        let declared = [" Silver ".to_string(), "oil".to_string(), "silver".to_string()];
        repo.declare_preferences("u", &declared);

        assert_eq!(
            repo.snapshot("u").preferred_commodities,
            vec!["silver".to_string(), "oil".to_string(), "copper".to_string()]
        );
    }

    #[test]
    fn insights_summarize_engagement() {
        let repo = UserBehaviorRepository::new();
        for _ in 0..4 {
            repo.record_alert_sent("u", OffsetDateTime::UNIX_EPOCH);
        }
        repo.record_click("u", Some("gold"), Some(10.0));
        repo.record_click("u", Some("gold"), Some(20.0));
        repo.record_click("u", Some("oil"), None);
        repo.record_dismissal("u", Some(90.0));
        repo.record_helpfulness("u", true);

        let insights = repo.insights("u").expect("insights");
        assert_eq!(insights.total_alerts, 4);
        assert_eq!(insights.clicked_alerts, 3);
        assert!((insights.click_rate - 0.75).abs() < 1e-6);
        assert!((insights.avg_response_time - 40.0).abs() < 1e-4);
        assert_eq!(insights.preferred_alert_frequency, AlertFrequency::High);
        let gold = insights.commodity_interests.get("gold").copied().unwrap_or_default();
        assert!((gold - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(insights.preferred_commodities[0], "gold");
    }

    #[test]
    fn low_engagement_prefers_few_alerts() {
        let repo = UserBehaviorRepository::new();
        for _ in 0..10 {
            repo.record_alert_sent("u", OffsetDateTime::UNIX_EPOCH);
        }
        repo.record_click("u", None, None);
        let insights = repo.insights("u").expect("insights");
        assert_eq!(insights.preferred_alert_frequency, AlertFrequency::Low);
    }

    #[test]
    fn insights_serialize_frequency_lowercase() {
        let repo = UserBehaviorRepository::new();
        repo.record_alert_sent("u", OffsetDateTime::UNIX_EPOCH);
        let json = serde_json::to_value(repo.insights("u").expect("insights")).expect("json");
        assert_eq!(json["preferred_alert_frequency"], "low");
        assert_eq!(json["total_alerts"], 1);
    }
}
