//! ε-greedy Aktionswahl über den Scores einer [`ValueFunction`].
//!
//! Mit Wahrscheinlichkeit `epsilon` wird (nur im Explorationsmodus) eine
//! zufällige Aktion gezogen, sonst die Aktion mit dem höchsten Score. Im
//! Auslieferungsmodus ist die Wahl eine reine Funktion von Gewichten und
//! Zustand.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use warnlern_core::{StateVector, ValueFunction};

const DEFAULT_EPSILON: f32 = 1.0;
const DEFAULT_EPSILON_MIN: f32 = 0.01;
const DEFAULT_DECAY: f32 = 0.995;

/// Explorationsrate mit multiplikativem Zerfall bis zu einem Boden.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSchedule {
    epsilon: f32,
    epsilon_min: f32,
    decay: f32,
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON, DEFAULT_EPSILON_MIN, DEFAULT_DECAY)
    }
}

impl ExplorationSchedule {
    /// Ungültige Werte werden auf [0, 1] begrenzt; ein Start unterhalb des
    /// Bodens beginnt am Boden.
    #[must_use]
    pub fn new(epsilon: f32, epsilon_min: f32, decay: f32) -> Self {
        let epsilon_min = finite_unit(epsilon_min, DEFAULT_EPSILON_MIN);
        let decay = finite_unit(decay, DEFAULT_DECAY);
        let epsilon = finite_unit(epsilon, DEFAULT_EPSILON).max(epsilon_min);
        Self {
            epsilon,
            epsilon_min,
            decay,
        }
    }

    #[must_use]
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    #[must_use]
    pub fn epsilon_min(&self) -> f32 {
        self.epsilon_min
    }

    /// Ein Zerfallsschritt; `epsilon` fällt nie unter `epsilon_min`.
    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * self.decay).max(self.epsilon_min);
    }

    /// Setzt `epsilon` (z. B. aus einem Checkpoint), begrenzt auf
    /// [`epsilon_min`, 1].
    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = finite_unit(epsilon, self.epsilon).max(self.epsilon_min);
    }
}

fn finite_unit(x: f32, fallback: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Ergebnis einer Aktionswahl.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub action: usize,
    /// Normierter Abstand zwischen bester und zweitbester Aktion in [0, 1];
    /// keine Wahrscheinlichkeit.
    pub confidence: f32,
    pub explored: bool,
}

/// Argmax über `scores` (bei Gleichstand der kleinste Index) samt Konfidenz.
///
/// Die Konfidenz ist `(best - second) / (|best| + |second| + 1e-6)`, begrenzt
/// auf [0, 1]. Ein Aktionsraum mit nur einer Aktion liefert 1.
#[must_use]
pub fn greedy(scores: &[f32]) -> Selection {
    let mut best = 0;
    for (i, s) in scores.iter().enumerate() {
        if *s > scores[best] || (!scores[best].is_finite() && s.is_finite()) {
            best = i;
        }
    }
    let confidence = match scores.len() {
        0 => 0.0,
        1 => 1.0,
        _ => {
            let top = scores[best];
            let second = scores
                .iter()
                .enumerate()
                .filter(|(i, s)| *i != best && s.is_finite())
                .map(|(_, s)| *s)
                .fold(f32::NEG_INFINITY, f32::max);
            let gap = (top - second) / (top.abs() + second.abs() + 1e-6);
            if gap.is_finite() {
                gap.clamp(0.0, 1.0)
            } else {
                0.0
            }
        }
    };
    Selection {
        action: best,
        confidence,
        explored: false,
    }
}

/// ε-greedy Policy über einer austauschbaren Wertfunktion.
#[derive(Debug)]
pub struct EpsilonGreedy {
    schedule: ExplorationSchedule,
    rng: StdRng,
}

impl EpsilonGreedy {
    /// Ohne `seed` wird aus der Systementropie gesät.
    #[must_use]
    pub fn new(schedule: ExplorationSchedule, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { schedule, rng }
    }

    #[must_use]
    pub fn schedule(&self) -> &ExplorationSchedule {
        &self.schedule
    }

    #[must_use]
    pub fn epsilon(&self) -> f32 {
        self.schedule.epsilon()
    }

    pub fn decay(&mut self) {
        self.schedule.decay();
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.schedule.set_epsilon(epsilon);
    }

    /// Wählt eine Aktion. Mit `explore = false` wird kein Zufall gezogen.
    pub fn select(
        &mut self,
        value_fn: &dyn ValueFunction,
        state: &StateVector,
        explore: bool,
    ) -> Selection {
        let scores = value_fn.scores(state);
        self.select_from_scores(&scores, explore)
    }

    pub fn select_from_scores(&mut self, scores: &[f32], explore: bool) -> Selection {
        let greedy = greedy(scores);
        if !explore || scores.is_empty() {
            return greedy;
        }
        if self.rng.gen::<f32>() >= self.schedule.epsilon() {
            return greedy;
        }
        let action = self.rng.gen_range(0..scores.len());
        Selection {
            action,
            confidence: if action == greedy.action {
                greedy.confidence
            } else {
                0.0
            },
            explored: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn greedy_picks_argmax_with_lowest_index_on_ties() {
        let s = greedy(&[0.1, 0.9, 0.9, -2.0]);
        assert_eq!(s.action, 1);
        assert!(s.confidence.abs() < 1e-6);

        let s = greedy(&[f32::NAN, 0.2, 0.1]);
        assert_eq!(s.action, 1);
    }

    #[test]
    fn confidence_is_normalized_gap() {
        let s = greedy(&[1.0, 3.0, 2.0]);
        assert_eq!(s.action, 1);
        assert!((s.confidence - 0.2).abs() < 1e-4);

        let single = greedy(&[-4.0]);
        assert!((single.confidence - 1.0).abs() < f32::EPSILON);

        let opposite = greedy(&[5.0, -5.0]);
        assert!((0.0..=1.0).contains(&opposite.confidence));
    }

    #[test]
    fn epsilon_never_drops_below_floor_and_never_increases() {
        let mut schedule = ExplorationSchedule::new(1.0, 0.05, 0.9);
        let mut last = schedule.epsilon();
        for _ in 0..500 {
            schedule.decay();
            assert!(schedule.epsilon() >= 0.05);
            assert!(schedule.epsilon() <= last);
            last = schedule.epsilon();
        }
        assert!((schedule.epsilon() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn schedule_sanitizes_inputs() {
        let schedule = ExplorationSchedule::new(f32::NAN, 0.2, 7.0);
        assert!((schedule.epsilon() - 1.0).abs() < f32::EPSILON);
        let below_floor = ExplorationSchedule::new(0.0, 0.1, 0.5);
        assert!((below_floor.epsilon() - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn serving_mode_ignores_exploration() {
        let mut policy = EpsilonGreedy::new(ExplorationSchedule::new(1.0, 1.0, 1.0), Some(7));
        for _ in 0..50 {
            let s = policy.select_from_scores(&[0.0, 0.0, 4.0], false);
            assert_eq!(s.action, 2);
            assert!(!s.explored);
        }
    }

    #[test]
    fn full_exploration_visits_every_action() {
        let mut policy = EpsilonGreedy::new(ExplorationSchedule::new(1.0, 1.0, 1.0), Some(11));
        let mut seen = [false; 4];
        for _ in 0..400 {
            let s = policy.select_from_scores(&[0.0, 1.0, 2.0, 3.0], true);
            assert!(s.explored);
            seen[s.action] = true;
        }
        assert!(seen.iter().all(|v| *v));
    }
}
