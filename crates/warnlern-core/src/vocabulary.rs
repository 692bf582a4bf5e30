//! Domänen-Vokabular (Schlagwörter, Rohstoffe) als Konfigurationsdaten.
//!
//! Das Vokabular wird beim Start geladen und danach nicht mehr verändert. Die
//! Reihenfolge bestimmt die Slots im Zustandsvektor: nur die ersten
//! [`KEYWORD_SLOTS`](crate::state::KEYWORD_SLOTS) Schlagwörter und
//! [`COMMODITY_SLOTS`](crate::state::COMMODITY_SLOTS) Rohstoffe bekommen einen
//! eigenen Eintrag.

use crate::state::{COMMODITY_SLOTS, KEYWORD_SLOTS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const BUILTIN: &str = include_str!("../vocabulary.json");

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid vocabulary JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub commodities: Vec<String>,
}

impl Vocabulary {
    /// Das mitgelieferte Standard-Vokabular.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN).unwrap_or_default()
    }

    /// Parst ein Vokabular aus JSON und normalisiert alle Einträge
    /// (getrimmt, kleingeschrieben, leere Einträge entfernt).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Vocabulary = serde_json::from_str(json)?;
        Ok(raw.normalized())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        let clean = |items: Vec<String>| -> Vec<String> {
            items
                .into_iter()
                .map(|s| normalize(&s))
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            keywords: clean(self.keywords),
            commodities: clean(self.commodities),
        }
    }

    /// Slot des ersten Vokabular-Schlagworts, das im Schlagwort der Meldung
    /// vorkommt.
    #[must_use]
    pub fn keyword_slot(&self, keyword: &str) -> Option<usize> {
        let keyword = normalize(keyword);
        if keyword.is_empty() {
            return None;
        }
        self.keywords
            .iter()
            .take(KEYWORD_SLOTS)
            .position(|k| keyword.contains(k.as_str()))
    }

    #[must_use]
    pub fn commodity_slot(&self, commodity: &str) -> Option<usize> {
        let commodity = normalize(commodity);
        self.commodities
            .iter()
            .take(COMMODITY_SLOTS)
            .position(|c| *c == commodity)
    }
}

pub(crate) fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
