//! Diskreter Aktionsraum und die daraus abgeleitete Empfehlung.
//!
//! Der Aktionsraum ist beim Start fest: "kein Alarm", drei Prioritätsstufen
//! und pro Präferenz-Slot ein fokussierter Alarm mit hoher Priorität.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Eine Aktion der Policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NoAlert,
    Alert(Priority),
    /// Alarm mit hoher Priorität, fokussiert auf den n-ten bevorzugten
    /// Rohstoff des Nutzers.
    Focused(usize),
}

impl Action {
    #[must_use]
    pub fn sends_alert(self) -> bool {
        !matches!(self, Action::NoAlert)
    }

    #[must_use]
    pub fn priority(self) -> Option<Priority> {
        match self {
            Action::NoAlert => None,
            Action::Alert(p) => Some(p),
            Action::Focused(_) => Some(Priority::High),
        }
    }

    /// Name für Logs.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Action::NoAlert => "no_alert".into(),
            Action::Alert(Priority::Low) => "alert.low".into(),
            Action::Alert(Priority::Medium) => "alert.medium".into(),
            Action::Alert(Priority::High) => "alert.high".into(),
            Action::Focused(slot) => format!("alert.focus_{slot}"),
        }
    }
}

/// Abbildung zwischen Aktions-Index und [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    focus_slots: usize,
}

impl ActionSpace {
    /// Anzahl der Aktionen ohne Fokus-Slots.
    pub const BASE_ACTIONS: usize = 4;

    #[must_use]
    pub fn new(focus_slots: usize) -> Self {
        Self { focus_slots }
    }

    #[must_use]
    pub fn focus_slots(&self) -> usize {
        self.focus_slots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        Self::BASE_ACTIONS + self.focus_slots
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn action(&self, id: usize) -> Option<Action> {
        match id {
            0 => Some(Action::NoAlert),
            1 => Some(Action::Alert(Priority::Low)),
            2 => Some(Action::Alert(Priority::Medium)),
            3 => Some(Action::Alert(Priority::High)),
            n if n < self.len() => Some(Action::Focused(n - Self::BASE_ACTIONS)),
            _ => None,
        }
    }

    #[must_use]
    pub fn id(&self, action: Action) -> Option<usize> {
        match action {
            Action::NoAlert => Some(0),
            Action::Alert(Priority::Low) => Some(1),
            Action::Alert(Priority::Medium) => Some(2),
            Action::Alert(Priority::High) => Some(3),
            Action::Focused(slot) if slot < self.focus_slots => Some(Self::BASE_ACTIONS + slot),
            Action::Focused(_) => None,
        }
    }
}

/// Strukturierte Empfehlung für den Benachrichtigungs-Dienst.
///
/// `confidence` ist der normierte Abstand zwischen bester und zweitbester
/// Aktion, keine Wahrscheinlichkeit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub send_alert: bool,
    pub priority: Option<Priority>,
    pub commodity_focus: Option<String>,
    pub confidence: f32,
    pub action_id: usize,
    pub user_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Gesetzt, sobald für die Empfehlung ein offener Eintrag angelegt wurde.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub explored: bool,
}
