//! Lineare Wertfunktion: ein Gewichtsvektor plus Bias pro Aktion.
//!
//! Trainiert per SGD auf dem halben quadratischen Fehler; der TD-Fehler wird
//! vor dem Gradientenschritt auf `±td_clip` begrenzt.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Deserialize;
use serde_json::{json, Value};
use warnlern_core::{Experience, SnapshotError, StateVector, ValueFunction};

const DEFAULT_LEARNING_RATE: f32 = 0.01;
const DEFAULT_TD_CLIP: f32 = 10.0;
const INIT_SCALE: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct LinearValueFunction {
    state_dim: usize,
    num_actions: usize,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    learning_rate: f32,
    td_clip: f32,
}

#[derive(Deserialize)]
struct LinearSnapshot {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    #[serde(default)]
    learning_rate: Option<f32>,
}

impl LinearValueFunction {
    /// Alle Gewichte null; bis zum ersten Update gewinnt bei Gleichstand
    /// Aktion 0 ("kein Alarm").
    #[must_use]
    pub fn new(state_dim: usize, num_actions: usize) -> Self {
        Self {
            state_dim,
            num_actions,
            weights: vec![vec![0.0; state_dim]; num_actions],
            bias: vec![0.0; num_actions],
            learning_rate: DEFAULT_LEARNING_RATE,
            td_clip: DEFAULT_TD_CLIP,
        }
    }

    /// Kleine, reproduzierbar zufällige Startgewichte.
    #[must_use]
    pub fn seeded(state_dim: usize, num_actions: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut vf = Self::new(state_dim, num_actions);
        for row in &mut vf.weights {
            for w in row.iter_mut() {
                *w = rng.gen_range(-INIT_SCALE..INIT_SCALE);
            }
        }
        vf
    }

    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        if learning_rate.is_finite() && learning_rate > 0.0 {
            self.learning_rate = learning_rate;
        }
        self
    }

    #[must_use]
    pub fn with_td_clip(mut self, td_clip: f32) -> Self {
        if td_clip.is_finite() && td_clip > 0.0 {
            self.td_clip = td_clip;
        }
        self
    }

    fn q(&self, action: usize, state: &[f32]) -> f32 {
        self.weights[action]
            .iter()
            .zip(state)
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + self.bias[action]
    }
}

impl ValueFunction for LinearValueFunction {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn scores(&self, state: &StateVector) -> Vec<f32> {
        let x = state.as_slice();
        (0..self.num_actions).map(|a| self.q(a, x)).collect()
    }

    fn train_batch(&mut self, batch: &[Experience], targets: &[f32]) -> f32 {
        let mut loss = 0.0;
        let mut n = 0_u32;
        for (exp, target) in batch.iter().zip(targets) {
            if exp.action >= self.num_actions || !target.is_finite() {
                continue;
            }
            let x = exp.state.as_slice();
            let error = self.q(exp.action, x) - target;
            loss += 0.5 * error * error;
            n += 1;

            let step = self.learning_rate * error.clamp(-self.td_clip, self.td_clip);
            for (w, xi) in self.weights[exp.action].iter_mut().zip(x) {
                *w -= step * xi;
            }
            self.bias[exp.action] -= step;
        }
        if n == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                loss / n as f32
            }
        }
    }

    fn snapshot(&self) -> Value {
        json!({
            "kind": "linear",
            "state_dim": self.state_dim,
            "num_actions": self.num_actions,
            "learning_rate": self.learning_rate,
            "weights": self.weights,
            "bias": self.bias,
        })
    }

    fn load(&mut self, snapshot: Value) -> Result<(), SnapshotError> {
        let snap: LinearSnapshot = serde_json::from_value(snapshot)?;
        if snap.weights.len() != self.num_actions {
            return Err(SnapshotError::Shape {
                what: "weight rows",
                expected: self.num_actions,
                found: snap.weights.len(),
            });
        }
        if snap.bias.len() != self.num_actions {
            return Err(SnapshotError::Shape {
                what: "bias",
                expected: self.num_actions,
                found: snap.bias.len(),
            });
        }
        if let Some(row) = snap.weights.iter().find(|r| r.len() != self.state_dim) {
            return Err(SnapshotError::Shape {
                what: "weight columns",
                expected: self.state_dim,
                found: row.len(),
            });
        }
        let all_finite = snap
            .weights
            .iter()
            .flatten()
            .chain(&snap.bias)
            .all(|w| w.is_finite());
        if !all_finite {
            return Err(SnapshotError::NonFinite);
        }
        self.weights = snap.weights;
        self.bias = snap.bias;
        if let Some(lr) = snap.learning_rate.filter(|lr| lr.is_finite() && *lr > 0.0) {
            self.learning_rate = lr;
        }
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn ValueFunction> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use warnlern_core::STATE_DIM;

    fn state(first: f32) -> StateVector {
        let mut raw = vec![0.0; STATE_DIM];
        raw[0] = first;
        raw[1] = 1.0;
        StateVector::from_raw(raw)
    }

    fn experience(action: usize) -> Experience {
        Experience {
            state: state(0.5),
            action,
            reward: 0.0,
            next_state: state(0.5),
            terminal: true,
        }
    }

    #[test]
    fn training_moves_score_towards_target() {
        let mut vf = LinearValueFunction::new(STATE_DIM, 3).with_learning_rate(0.1);
        let batch = vec![experience(2)];
        let before = vf.scores(&state(0.5))[2];
        let first_loss = vf.train_batch(&batch, &[5.0]);
        let after = vf.scores(&state(0.5))[2];
        assert!(after > before);
        assert!((first_loss - 12.5).abs() < 1e-4);

        for _ in 0..200 {
            vf.train_batch(&batch, &[5.0]);
        }
        assert!((vf.scores(&state(0.5))[2] - 5.0).abs() < 0.05);
        // other actions untouched
        assert!(vf.scores(&state(0.5))[0].abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_actions_and_bad_targets_are_skipped() {
        let mut vf = LinearValueFunction::new(STATE_DIM, 2);
        let loss = vf.train_batch(&[experience(5), experience(1)], &[1.0, f32::NAN]);
        assert!(loss.abs() < f32::EPSILON);
        assert!(vf.scores(&state(0.5)).iter().all(|s| s.abs() < f32::EPSILON));
    }

    #[test]
    fn snapshot_roundtrip_restores_scores() {
        let mut vf = LinearValueFunction::seeded(STATE_DIM, 4, 42);
        vf.train_batch(&[experience(3)], &[2.0]);
        let mut restored = LinearValueFunction::new(STATE_DIM, 4);
        restored.load(vf.snapshot()).expect("load should succeed");
        assert_eq!(restored.scores(&state(0.3)), vf.scores(&state(0.3)));
    }

    #[test]
    fn load_rejects_wrong_shape() {
        let vf = LinearValueFunction::new(STATE_DIM, 4);
        let mut other = LinearValueFunction::new(STATE_DIM, 5);
        let err = other.load(vf.snapshot()).expect_err("shape mismatch");
        assert!(matches!(err, SnapshotError::Shape { .. }));

        let mut narrow = LinearValueFunction::new(3, 4);
        assert!(narrow.load(vf.snapshot()).is_err());
    }
}
