//! Online lernende Entscheidungs-Engine für Rohstoff-Alarme.
//!
//! [`AlertEngine`] verbindet Zustandsaufbau, ε-greedy Policy,
//! Nachverfolgung offener Empfehlungen und die Lernschleife. Alle Methoden
//! nehmen `&self` und dürfen parallel aufgerufen werden.

#![warn(clippy::unwrap_used, clippy::expect_used)]

pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;

pub use checkpoint::{Checkpoint, CheckpointManager, CHECKPOINT_VERSION};
pub use config::EngineConfig;
pub use dispatch::{DispatchReceiver, Dispatcher};
pub use engine::{ActionStats, AlertEngine, EngineStats, FeedbackOutcome, LearningOutcome};
pub use error::{EngineError, Result};
