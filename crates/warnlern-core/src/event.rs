//! Datenstrukturen für die beiden asynchronen Rückmeldungen, die eine
//! ausgesprochene Empfehlung abschließen.
//!
//! Nutzer-Feedback kommt über die App (Tracking-ID bekannt), Markt-Ergebnisse
//! kommen vom Kursdienst und kennen nur den Rohstoff. Beide Formate sind als
//! JSON-Austauschformat gedacht.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Art der Nutzer-Reaktion auf einen Alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Clicked,
    Dismissed,
    Helpful,
    NotHelpful,
}

impl FeedbackType {
    /// `helpful`, `not_helpful` und `dismissed` schließen einen offenen
    /// Eintrag ab; ein Klick allein nicht.
    #[must_use]
    pub fn completes_prediction(self) -> bool {
        !matches!(self, FeedbackType::Clicked)
    }
}

/// Rückmeldung eines Nutzers zu einem zugestellten Alarm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    /// Tracking-ID aus der [`Recommendation`](crate::Recommendation).
    pub tracking_id: String,
    pub feedback_type: FeedbackType,
    /// Zusätzliche Daten der App, z. B. `response_time_seconds`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<BTreeMap<String, Value>>,
}

impl FeedbackEvent {
    #[must_use]
    pub fn new(tracking_id: impl Into<String>, feedback_type: FeedbackType) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            feedback_type,
            extra: None,
        }
    }

    /// Vom Client gemeldete Reaktionszeit in Sekunden, sofern vorhanden und
    /// nicht negativ.
    #[must_use]
    pub fn response_time_seconds(&self) -> Option<f32> {
        #[allow(clippy::cast_possible_truncation)]
        self.extra
            .as_ref()?
            .get("response_time_seconds")?
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as f32)
    }
}

fn default_timeframe() -> String {
    "24h".to_string()
}

/// Tatsächliche Preisbewegung eines Rohstoffs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketOutcomeEvent {
    pub commodity: String,
    pub price_change_percent: f32,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feedback_event_from_json_fixture() {
        let json_data = json!({
            "tracking_id": "3f1c",
            "feedback_type": "not_helpful",
            "extra": {"response_time_seconds": 12.5}
        });

        let event: FeedbackEvent =
            serde_json::from_value(json_data).expect("Deserialization failed");
        assert_eq!(event.tracking_id, "3f1c");
        assert_eq!(event.feedback_type, FeedbackType::NotHelpful);
        assert_eq!(event.response_time_seconds(), Some(12.5));
        assert!(event.feedback_type.completes_prediction());
    }

    #[test]
    fn clicked_does_not_complete() {
        assert!(!FeedbackType::Clicked.completes_prediction());
        assert!(FeedbackType::Dismissed.completes_prediction());
        assert!(FeedbackType::Helpful.completes_prediction());
    }

    #[test]
    fn market_outcome_defaults_timeframe() {
        let event: MarketOutcomeEvent =
            serde_json::from_str(r#"{"commodity":"gold","price_change_percent":-2.4}"#)
                .expect("Deserialization failed");
        assert_eq!(event.timeframe, "24h");
        assert!((event.price_change_percent + 2.4).abs() < 1e-6);
    }

    #[test]
    fn negative_response_time_is_ignored() {
        let mut extra = BTreeMap::new();
        extra.insert("response_time_seconds".to_string(), json!(-3));
        let event = FeedbackEvent {
            tracking_id: "x".into(),
            feedback_type: FeedbackType::Dismissed,
            extra: Some(extra),
        };
        assert_eq!(event.response_time_seconds(), None);
    }
}
