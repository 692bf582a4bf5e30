//! Aufbau des Zustandsvektors.
//!
//! Layout (Indizes, Wertebereich):
//! ```text
//! [0-2]   Sentiment bullish / bearish / neutral                 [0,1]
//! [3]     Konfidenz der Klassifikation                          [0,1]
//! [4]     Schweregrad (low 1/3, medium 2/3, high 1)             [0,1]
//! [5]     Dringlichkeit (fehlt -> 0.5)                          [0,1]
//! [6-15]  Schlagwort-Flags, erste 10 Vokabular-Schlagwörter     {0,1}
//! [16-20] Rohstoff der Meldung, one-hot                         {0,1}
//! [21-25] bevorzugte Rohstoffe des Nutzers                      {0,1}
//! [26]    Klickrate (ohne Historie 0.5)                         [0,1]
//! [27]    Wegwisch-Rate (ohne Historie 0.5)                     [0,1]
//! [28]    "hilfreich"-Rate (ohne Historie 0.5)                  [0,1]
//! [29]    mittlere Reaktionszeit / 1 h                          [0,1]
//! [30]    gesendete Alarme / 100                                [0,1]
//! [31]    Interesse am Rohstoff der Meldung (Klickanteil)       [0,1]
//! [32]    Volatilitätsindex                                     [0,1]
//! [33]    Trendstärke                                           [-1,1]
//! [34]    Handelszeit                                           {0,1}
//! [35]    Wochentag / 6                                         [0,1]
//! [36]    letzte Preisänderung des Rohstoffs / 10 %             [-1,1]
//! [37-38] Tageszeit sin / cos                                   [-1,1]
//! [39]    Reserve (0)
//! ```

use crate::features::{MarketContext, NewsFeatures};
use crate::vocabulary::{normalize, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::sync::Arc;
use time::OffsetDateTime;

/// Feste Länge jedes Zustandsvektors.
pub const STATE_DIM: usize = 40;
pub const KEYWORD_SLOTS: usize = 10;
pub const COMMODITY_SLOTS: usize = 5;

const SENTIMENT: usize = 0;
const CONFIDENCE: usize = 3;
const SEVERITY: usize = 4;
const URGENCY: usize = 5;
const KEYWORDS: usize = 6;
const NEWS_COMMODITY: usize = KEYWORDS + KEYWORD_SLOTS;
const PREFERRED: usize = NEWS_COMMODITY + COMMODITY_SLOTS;
const CLICK_RATE: usize = PREFERRED + COMMODITY_SLOTS;
const DISMISS_RATE: usize = CLICK_RATE + 1;
const HELPFUL_RATE: usize = CLICK_RATE + 2;
const RESPONSE_TIME: usize = CLICK_RATE + 3;
const ALERT_VOLUME: usize = CLICK_RATE + 4;
const COMMODITY_INTEREST: usize = CLICK_RATE + 5;
const VOLATILITY: usize = COMMODITY_INTEREST + 1;
const TREND: usize = VOLATILITY + 1;
const TRADING_HOURS: usize = VOLATILITY + 2;
const WEEKDAY: usize = VOLATILITY + 3;
const RECENT_MOVE: usize = VOLATILITY + 4;
const TIME_SIN: usize = RECENT_MOVE + 1;
const TIME_COS: usize = RECENT_MOVE + 2;
const LAYOUT_END: usize = TIME_COS + 1;

const _: () = assert!(LAYOUT_END <= STATE_DIM, "state layout exceeds STATE_DIM");

const NEUTRAL_RATE: f32 = 0.5;
const RESPONSE_TIME_SCALE_SECS: f32 = 3600.0;
const ALERT_VOLUME_SCALE: f32 = 100.0;
const RECENT_MOVE_SCALE_PERCENT: f32 = 10.0;

/// Zustandsvektor fester Länge [`STATE_DIM`].
///
/// Jede Konstruktion füllt kürzere Eingaben mit Nullen auf, kürzt längere,
/// ersetzt NaN/Inf durch 0 und begrenzt alle Werte auf [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct StateVector(Vec<f32>);

impl StateVector {
    #[must_use]
    pub fn zeros() -> Self {
        Self(vec![0.0; STATE_DIM])
    }

    #[must_use]
    pub fn from_raw(mut values: Vec<f32>) -> Self {
        values.resize(STATE_DIM, 0.0);
        for v in &mut values {
            *v = if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        }
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for StateVector {
    fn from(values: Vec<f32>) -> Self {
        Self::from_raw(values)
    }
}

impl From<StateVector> for Vec<f32> {
    fn from(state: StateVector) -> Self {
        state.0
    }
}

/// Zählerstand eines Nutzers, wie ihn der Zustandsaufbau sieht.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSnapshot {
    pub alerts_sent: u64,
    pub clicked: u64,
    pub dismissed: u64,
    pub helpful: u64,
    pub avg_response_secs: Option<f32>,
    #[serde(default)]
    pub commodity_clicks: BTreeMap<String, u64>,
    /// Deklarierte und aus Klicks abgeleitete Lieblingsrohstoffe, wichtigste
    /// zuerst.
    #[serde(default)]
    pub preferred_commodities: Vec<String>,
}

impl BehaviorSnapshot {
    #[allow(clippy::cast_precision_loss)]
    fn rate(&self, count: u64) -> f32 {
        if self.alerts_sent == 0 {
            NEUTRAL_RATE
        } else {
            (count as f32 / self.alerts_sent as f32).min(1.0)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn interest_in(&self, commodity: &str) -> f32 {
        let total: u64 = self.commodity_clicks.values().sum();
        if total == 0 {
            return NEUTRAL_RATE;
        }
        let hits = self
            .commodity_clicks
            .get(&normalize(commodity))
            .copied()
            .unwrap_or(0);
        hits as f32 / total as f32
    }
}

/// Alles, was in einen Zustand einfließt.
#[derive(Debug, Clone, Copy)]
pub struct StateInput<'a> {
    pub news: &'a NewsFeatures,
    pub behavior: &'a BehaviorSnapshot,
    pub market: &'a MarketContext,
    pub at: OffsetDateTime,
}

/// Reine Funktion von [`StateInput`] auf [`StateVector`].
#[derive(Debug, Clone)]
pub struct StateBuilder {
    vocabulary: Arc<Vocabulary>,
}

impl StateBuilder {
    #[must_use]
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    #[must_use]
    pub fn build(&self, input: &StateInput<'_>) -> StateVector {
        let mut v = vec![0.0_f32; STATE_DIM];
        let news = input.news;
        let behavior = input.behavior;
        let market = input.market;

        v[SENTIMENT] = unit(news.sentiment_scores.bullish, 0.0);
        v[SENTIMENT + 1] = unit(news.sentiment_scores.bearish, 0.0);
        v[SENTIMENT + 2] = unit(news.sentiment_scores.neutral, 0.0);
        v[CONFIDENCE] = unit(news.confidence_score, NEUTRAL_RATE);
        v[SEVERITY] = news.severity.normalized();
        v[URGENCY] = news.urgency.map_or(NEUTRAL_RATE, |u| unit(u, NEUTRAL_RATE));

        for keyword in &news.keywords {
            if let Some(slot) = self.vocabulary.keyword_slot(keyword) {
                v[KEYWORDS + slot] = 1.0;
            }
        }

        if let Some(slot) = news
            .commodity
            .as_deref()
            .and_then(|c| self.vocabulary.commodity_slot(c))
        {
            v[NEWS_COMMODITY + slot] = 1.0;
        }
        for commodity in &behavior.preferred_commodities {
            if let Some(slot) = self.vocabulary.commodity_slot(commodity) {
                v[PREFERRED + slot] = 1.0;
            }
        }

        v[CLICK_RATE] = behavior.rate(behavior.clicked);
        v[DISMISS_RATE] = behavior.rate(behavior.dismissed);
        v[HELPFUL_RATE] = behavior.rate(behavior.helpful);
        v[RESPONSE_TIME] = behavior
            .avg_response_secs
            .map_or(NEUTRAL_RATE, |s| unit(s / RESPONSE_TIME_SCALE_SECS, NEUTRAL_RATE));
        #[allow(clippy::cast_precision_loss)]
        {
            v[ALERT_VOLUME] = (behavior.alerts_sent as f32 / ALERT_VOLUME_SCALE).min(1.0);
        }
        v[COMMODITY_INTEREST] = news
            .commodity
            .as_deref()
            .map_or(0.0, |c| behavior.interest_in(c));

        v[VOLATILITY] = unit(market.volatility_index, NEUTRAL_RATE);
        v[TREND] = signed(market.trend_strength);
        v[TRADING_HOURS] = if market.trading_hours { 1.0 } else { 0.0 };
        v[WEEKDAY] = f32::from(market.day_of_week.min(6)) / 6.0;
        v[RECENT_MOVE] = market
            .recent_move_percent
            .map_or(0.0, |pct| signed(pct / RECENT_MOVE_SCALE_PERCENT));

        let hour = f32::from(input.at.hour()) + f32::from(input.at.minute()) / 60.0;
        let angle = TAU * hour / 24.0;
        v[TIME_SIN] = angle.sin();
        v[TIME_COS] = angle.cos();

        StateVector::from_raw(v)
    }
}

fn unit(x: f32, fallback: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn signed(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::features::{SentimentScores, Severity};
    use time::macros::datetime;

    fn builder() -> StateBuilder {
        StateBuilder::new(Arc::new(Vocabulary::builtin()))
    }

    fn news() -> NewsFeatures {
        NewsFeatures {
            sentiment_scores: SentimentScores {
                bullish: 0.7,
                bearish: 0.2,
                neutral: 0.1,
            },
            confidence_score: 0.9,
            severity: Severity::High,
            keywords: vec!["OPEC cut".into(), "weather".into()],
            commodity: Some("oil".into()),
            urgency: None,
        }
    }

    #[test]
    fn raw_vectors_are_padded_truncated_and_clamped() {
        let short = StateVector::from_raw(vec![0.5, 2.0, f32::NAN, -7.0]);
        assert_eq!(short.as_slice().len(), STATE_DIM);
        assert_eq!(&short.as_slice()[..4], &[0.5, 1.0, 0.0, -1.0]);

        let long = StateVector::from_raw(vec![0.1; STATE_DIM + 9]);
        assert_eq!(long.as_slice().len(), STATE_DIM);
    }

    #[test]
    fn deserialization_goes_through_normalization() {
        let state: StateVector = serde_json::from_str("[3.0, -0.25]").expect("deserialize");
        assert_eq!(state.as_slice().len(), STATE_DIM);
        assert!((state.as_slice()[0] - 1.0).abs() < f32::EPSILON);
        assert!((state.as_slice()[1] + 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn build_sets_documented_slots() {
        let behavior = BehaviorSnapshot::default();
        let market = MarketContext {
            volatility_index: 0.8,
            trend_strength: -3.0,
            trading_hours: true,
            day_of_week: 3,
            recent_move_percent: Some(25.0),
        };
        let state = builder().build(&StateInput {
            news: &news(),
            behavior: &behavior,
            market: &market,
            at: datetime!(2026-03-04 06:00 UTC),
        });
        let v = state.as_slice();

        assert!((v[SENTIMENT] - 0.7).abs() < 1e-6);
        assert!((v[SEVERITY] - 1.0).abs() < 1e-6);
        assert!((v[URGENCY] - 0.5).abs() < 1e-6);
        assert!((v[KEYWORDS] - 1.0).abs() < 1e-6, "opec is keyword slot 0");
        assert!((v[NEWS_COMMODITY + 1] - 1.0).abs() < 1e-6, "oil is commodity slot 1");
        assert!((v[CLICK_RATE] - 0.5).abs() < 1e-6, "no history gives neutral rate");
        assert!((v[COMMODITY_INTEREST] - 0.5).abs() < 1e-6);
        assert!((v[TREND] + 1.0).abs() < 1e-6);
        assert!((v[TRADING_HOURS] - 1.0).abs() < 1e-6);
        assert!((v[WEEKDAY] - 0.5).abs() < 1e-6);
        assert!((v[RECENT_MOVE] - 1.0).abs() < 1e-6);
        assert!((v[TIME_SIN] - 1.0).abs() < 1e-5, "06:00 is a quarter turn");
        assert!(v.iter().all(|x| x.is_finite() && (-1.0..=1.0).contains(x)));
    }

    #[test]
    fn behavior_rates_and_preferences_flow_into_state() {
        let mut commodity_clicks = BTreeMap::new();
        commodity_clicks.insert("oil".to_string(), 3);
        commodity_clicks.insert("gold".to_string(), 1);
        let behavior = BehaviorSnapshot {
            alerts_sent: 10,
            clicked: 4,
            dismissed: 2,
            helpful: 1,
            avg_response_secs: Some(1800.0),
            commodity_clicks,
            preferred_commodities: vec!["oil".into(), "gold".into()],
        };
        let state = builder().build(&StateInput {
            news: &news(),
            behavior: &behavior,
            market: &MarketContext::default(),
            at: OffsetDateTime::UNIX_EPOCH,
        });
        let v = state.as_slice();

        assert!((v[CLICK_RATE] - 0.4).abs() < 1e-6);
        assert!((v[DISMISS_RATE] - 0.2).abs() < 1e-6);
        assert!((v[HELPFUL_RATE] - 0.1).abs() < 1e-6);
        assert!((v[RESPONSE_TIME] - 0.5).abs() < 1e-6);
        assert!((v[ALERT_VOLUME] - 0.1).abs() < 1e-6);
        assert!((v[COMMODITY_INTEREST] - 0.75).abs() < 1e-6);
        assert!((v[PREFERRED] - 1.0).abs() < 1e-6);
        assert!((v[PREFERRED + 1] - 1.0).abs() < 1e-6);
        assert!(v[PREFERRED + 2].abs() < 1e-6);
    }

    #[test]
    fn build_is_deterministic() {
        let news = news();
        let behavior = BehaviorSnapshot::default();
        let market = MarketContext::default();
        let input = StateInput {
            news: &news,
            behavior: &behavior,
            market: &market,
            at: OffsetDateTime::UNIX_EPOCH,
        };
        let b = builder();
        assert_eq!(b.build(&input), b.build(&input));
    }
}
