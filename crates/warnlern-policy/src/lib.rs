//! Policies und Lernschleife für warnlern.
//!
//! [`EpsilonGreedy`] wählt Aktionen über einer beliebigen
//! [`ValueFunction`](warnlern_core::ValueFunction);
//! [`LinearValueFunction`] ist die mitgelieferte Implementierung. Der
//! [`Learner`] hält Replay-Speicher, Online- und Zielkopie und ist der einzige
//! Schreiber auf die Gewichte.

#![warn(clippy::unwrap_used, clippy::expect_used)]

pub mod epsilon;
pub mod error;
pub mod learner;
pub mod linear;
pub mod replay;

pub use epsilon::{greedy, EpsilonGreedy, ExplorationSchedule, Selection};
pub use error::{PolicyError, Result};
pub use learner::{Learner, LearnerConfig, PolicyState, StepReport};
pub use linear::LinearValueFunction;
pub use replay::ExperienceStore;
