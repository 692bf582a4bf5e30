//! Lernschleife mit Experience Replay und eingefrorener Zielkopie.
//!
//! Der Learner ist der einzige Schreiber auf die trainierte Wertfunktion. Pro
//! abgeschlossener Vorhersage nimmt er einen Übergang auf, zieht einen Batch,
//! berechnet `r + γ · max_a' Q_target(s', a') · (1 - terminal)` und macht einen
//! Update-Schritt.

use crate::error::{PolicyError, Result};
use crate::replay::{ExperienceStore, DEFAULT_CAPACITY};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warnlern_core::{Experience, ValueFunction, STATE_DIM};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    pub discount: f32,
    pub batch_size: usize,
    pub capacity: usize,
    /// Zielkopie alle n abgeschlossenen Batches neu kopieren.
    pub update_target_every: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            discount: 0.95,
            batch_size: 32,
            capacity: DEFAULT_CAPACITY,
            update_target_every: 10,
        }
    }
}

/// Prozessweiter Policy-Zustand, wie er in Checkpoints landet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyState {
    pub exploration_rate: f32,
    pub training_steps: u64,
}

/// Ergebnis von [`Learner::observe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// `None`, wenn noch kein voller Batch vorlag.
    pub loss: Option<f32>,
    pub training_steps: u64,
    pub target_synced: bool,
    pub stored: usize,
}

impl StepReport {
    #[must_use]
    pub fn trained(&self) -> bool {
        self.loss.is_some()
    }
}

pub struct Learner {
    online: Box<dyn ValueFunction>,
    target: Box<dyn ValueFunction>,
    store: ExperienceStore,
    config: LearnerConfig,
    training_steps: u64,
    rng: StdRng,
}

impl std::fmt::Debug for Learner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Learner")
            .field("config", &self.config)
            .field("training_steps", &self.training_steps)
            .field("stored", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl Learner {
    /// Die Wertfunktion muss genau [`STATE_DIM`] Eingänge haben.
    pub fn new(
        online: Box<dyn ValueFunction>,
        config: LearnerConfig,
        seed: Option<u64>,
    ) -> Result<Self> {
        if online.state_dim() != STATE_DIM {
            return Err(PolicyError::Shape(format!(
                "value function expects {} inputs, state vectors have {}",
                online.state_dim(),
                STATE_DIM
            )));
        }
        if online.num_actions() == 0 {
            return Err(PolicyError::Shape("value function has no actions".into()));
        }
        let target = online.boxed_clone();
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            online,
            target,
            store: ExperienceStore::new(config.capacity),
            config: LearnerConfig {
                batch_size: config.batch_size.max(1),
                update_target_every: config.update_target_every.max(1),
                ..config
            },
            training_steps: 0,
            rng,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    #[must_use]
    pub fn online(&self) -> &dyn ValueFunction {
        self.online.as_ref()
    }

    #[must_use]
    pub fn target(&self) -> &dyn ValueFunction {
        self.target.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &ExperienceStore {
        &self.store
    }

    #[must_use]
    pub fn training_steps(&self) -> u64 {
        self.training_steps
    }

    /// Nimmt einen Übergang auf und trainiert, sobald ein voller Batch
    /// gezogen werden kann.
    pub fn observe(&mut self, experience: Experience) -> Result<StepReport> {
        let num_actions = self.online.num_actions();
        if experience.action >= num_actions {
            return Err(PolicyError::InvalidAction {
                action: experience.action,
                num_actions,
            });
        }
        self.store.append(experience);

        let Some(batch) = self.store.sample(self.config.batch_size, &mut self.rng) else {
            return Ok(StepReport {
                loss: None,
                training_steps: self.training_steps,
                target_synced: false,
                stored: self.store.len(),
            });
        };

        let targets: Vec<f32> = batch
            .iter()
            .map(|exp| {
                let continuation = if exp.terminal { 0.0 } else { 1.0 };
                let bootstrap = self
                    .target
                    .scores(&exp.next_state)
                    .into_iter()
                    .filter(|s| s.is_finite())
                    .fold(f32::NEG_INFINITY, f32::max);
                let bootstrap = if bootstrap.is_finite() { bootstrap } else { 0.0 };
                exp.reward + self.config.discount * bootstrap * continuation
            })
            .collect();

        let loss = self.online.train_batch(&batch, &targets);
        self.training_steps += 1;

        let target_synced = self.training_steps % self.config.update_target_every == 0;
        if target_synced {
            self.target = self.online.boxed_clone();
            tracing::debug!(training_steps = self.training_steps, "target network synced");
        }

        Ok(StepReport {
            loss: Some(loss),
            training_steps: self.training_steps,
            target_synced,
            stored: self.store.len(),
        })
    }

    /// Gewichte von Online- und Zielkopie als JSON.
    #[must_use]
    pub fn snapshot(&self) -> (Value, Value) {
        (self.online.snapshot(), self.target.snapshot())
    }

    /// Stellt Gewichte und Schrittzähler wieder her. Ohne eigene Zielgewichte
    /// wird die Zielkopie aus den Online-Gewichten erzeugt.
    pub fn restore(
        &mut self,
        online: Value,
        target: Option<Value>,
        training_steps: u64,
    ) -> Result<()> {
        let mut restored = self.online.boxed_clone();
        restored.load(online)?;
        let restored_target = match target {
            Some(weights) => {
                let mut t = self.target.boxed_clone();
                t.load(weights)?;
                t
            }
            None => restored.boxed_clone(),
        };
        self.online = restored;
        self.target = restored_target;
        self.training_steps = training_steps;
        Ok(())
    }
}
