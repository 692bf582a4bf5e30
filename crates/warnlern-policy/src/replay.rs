//! Replay-Speicher: Ringpuffer fester Kapazität für abgeschlossene Übergänge.

use rand::seq::index;
use rand::Rng;
use std::collections::VecDeque;
use warnlern_core::Experience;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct ExperienceStore {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl Default for ExperienceStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ExperienceStore {
    /// Kapazität 0 wird als 1 behandelt.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Hängt an; ist der Puffer voll, fällt der älteste Eintrag heraus.
    pub fn append(&mut self, experience: Experience) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buffer.iter()
    }

    /// Gleichverteilte Stichprobe ohne Zurücklegen. `None`, solange weniger
    /// als `batch_size` Einträge vorhanden sind.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Option<Vec<Experience>> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return None;
        }
        let picked = index::sample(rng, self.buffer.len(), batch_size);
        Some(picked.iter().map(|i| self.buffer[i].clone()).collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use warnlern_core::StateVector;

    fn make_exp(reward: f32) -> Experience {
        Experience {
            state: StateVector::zeros(),
            action: 0,
            reward,
            next_state: StateVector::zeros(),
            terminal: false,
        }
    }

    #[test]
    fn fifo_eviction_after_capacity_plus_one() {
        let mut store = ExperienceStore::new(3);
        for r in 1..=4 {
            store.append(make_exp(r as f32));
        }
        assert_eq!(store.len(), 3);
        let rewards: Vec<f32> = store.iter().map(|e| e.reward).collect();
        assert!(!rewards.contains(&1.0), "oldest entry must be evicted");
        assert_eq!(rewards.last().copied(), Some(4.0));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut store = ExperienceStore::new(5);
        for r in 0..100 {
            store.append(make_exp(r as f32));
            assert!(store.len() <= store.capacity());
        }
    }

    #[test]
    fn sample_requires_enough_entries() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut store = ExperienceStore::new(10);
        store.append(make_exp(1.0));
        assert!(store.sample(2, &mut rng).is_none());
        assert!(store.sample(0, &mut rng).is_none());
        store.append(make_exp(2.0));
        assert_eq!(store.sample(2, &mut rng).map(|b| b.len()), Some(2));
    }

    #[test]
    fn sample_is_without_replacement() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut store = ExperienceStore::new(50);
        for r in 0..50 {
            store.append(make_exp(r as f32));
        }
        let batch = store.sample(50, &mut rng).expect("full batch");
        let distinct: HashSet<u32> = batch.iter().map(|e| e.reward as u32).collect();
        assert_eq!(distinct.len(), 50);
    }
}
