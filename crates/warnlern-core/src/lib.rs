//! Kern-Typen und -Traits für warnlern.
//!
//! Die Crate beschreibt alles, was zwischen Zustandsaufbau, Policy und
//! Lernschleife ausgetauscht wird: Zustandsvektoren, Aktionen, Empfehlungen,
//! Feedback- und Markt-Events sowie das [`ValueFunction`]-Trait, hinter dem
//! beliebige Schätzer (linear, kleines Netz, Tabelle) austauschbar sind.

#![warn(clippy::unwrap_used, clippy::expect_used)]

use serde_json::Value;
use thiserror::Error;

pub mod action;
pub mod clock;
pub mod event;
pub mod experience;
pub mod features;
pub mod state;
pub mod vocabulary;

pub use action::{Action, ActionSpace, Priority, Recommendation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{FeedbackEvent, FeedbackType, MarketOutcomeEvent};
pub use experience::Experience;
pub use features::{Direction, MarketContext, NewsFeatures, SentimentScores, Severity};
pub use state::{BehaviorSnapshot, StateBuilder, StateInput, StateVector, STATE_DIM};
pub use vocabulary::{Vocabulary, VocabularyError};

/// Fehler beim Wiederherstellen eines Gewichts-Snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Snapshot shape mismatch for {what}: expected {expected}, found {found}")]
    Shape {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Snapshot contains non-finite weights")]
    NonFinite,
}

pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;

/// Bewertet jeden Zustand mit einem Score pro diskreter Aktion.
///
/// Die Lernschleife berechnet die Bootstrap-Ziele selbst (mit einer
/// eingefrorenen Zielkopie) und übergibt sie zusammen mit dem Batch; die
/// Implementierung muss nur den Abstand zwischen `scores(state)[action]` und
/// dem Ziel verkleinern.
pub trait ValueFunction: Send + Sync {
    fn num_actions(&self) -> usize;
    fn state_dim(&self) -> usize;
    fn scores(&self, state: &StateVector) -> Vec<f32>;
    /// Ein Update-Schritt. `targets[i]` gehört zu `batch[i]`; Rückgabe ist der
    /// mittlere Verlust vor dem Update.
    fn train_batch(&mut self, batch: &[Experience], targets: &[f32]) -> f32;
    fn snapshot(&self) -> Value;
    fn load(&mut self, snapshot: Value) -> Result<()>;
    fn boxed_clone(&self) -> Box<dyn ValueFunction>;
}
