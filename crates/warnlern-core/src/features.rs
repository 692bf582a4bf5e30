//! Eingangsdaten der Feature-Extraktion und des Marktumfelds.
//!
//! Die Engine rechnet keine Sentiments selbst aus; sie übernimmt das Ergebnis
//! der vorgelagerten Klassifikation als [`NewsFeatures`]. Fehlende Felder
//! werden beim Deserialisieren mit neutralen Werten belegt.

use serde::{Deserialize, Serialize};

/// Richtung einer (erwarteten oder tatsächlichen) Preisbewegung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

/// Schweregrad einer Meldung bzw. einer Marktbewegung.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    /// Stufe 1..=3, wie sie von der Klassifikation geliefert wird.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
        }
    }

    /// Stufe skaliert auf (0, 1].
    #[must_use]
    pub fn normalized(self) -> f32 {
        f32::from(self.level()) / 3.0
    }
}

/// Sentiment-Tripel; die Werte summieren sich ungefähr zu 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    #[serde(default)]
    pub bullish: f32,
    #[serde(default)]
    pub bearish: f32,
    #[serde(default)]
    pub neutral: f32,
}

impl Default for SentimentScores {
    fn default() -> Self {
        Self {
            bullish: 0.0,
            bearish: 0.0,
            neutral: 1.0,
        }
    }
}

impl SentimentScores {
    /// Vorhergesagte Richtung: das dominante Sentiment. Gleichstand oder ein
    /// dominantes `neutral` ergeben [`Direction::Neutral`].
    #[must_use]
    pub fn dominant(&self) -> Direction {
        if self.bullish > self.bearish && self.bullish > self.neutral {
            Direction::Up
        } else if self.bearish > self.bullish && self.bearish > self.neutral {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }
}

fn default_confidence() -> f32 {
    0.5
}

/// Ausgabe der Feature-Extraktion für eine einzelne Meldung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsFeatures {
    #[serde(default)]
    pub sentiment_scores: SentimentScores,
    #[serde(default = "default_confidence")]
    pub confidence_score: f32,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commodity: Option<String>,
    /// Dringlichkeit in [0, 1]; fehlt sie, wird 0.5 angenommen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<f32>,
}

impl Default for NewsFeatures {
    fn default() -> Self {
        Self {
            sentiment_scores: SentimentScores::default(),
            confidence_score: default_confidence(),
            severity: Severity::default(),
            keywords: Vec::new(),
            commodity: None,
            urgency: None,
        }
    }
}

fn default_volatility() -> f32 {
    0.5
}

/// Momentaufnahme des Marktumfelds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    #[serde(default = "default_volatility")]
    pub volatility_index: f32,
    #[serde(default)]
    pub trend_strength: f32,
    #[serde(default)]
    pub trading_hours: bool,
    /// 0 = Montag … 6 = Sonntag.
    #[serde(default)]
    pub day_of_week: u8,
    /// Letzte bekannte Preisänderung (Prozent) des Rohstoffs der Meldung;
    /// wird von der Engine aus dem Markt-Cache befüllt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_move_percent: Option<f32>,
}

impl Default for MarketContext {
    fn default() -> Self {
        Self {
            volatility_index: default_volatility(),
            trend_strength: 0.0,
            trading_hours: false,
            day_of_week: 0,
            recent_move_percent: None,
        }
    }
}
