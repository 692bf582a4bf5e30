use crate::state::StateVector;
use serde::{Deserialize, Serialize};

/// Ein abgeschlossener Übergang (s, a, r, s', terminal).
///
/// Unveränderlich, sobald er im Replay-Speicher liegt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: StateVector,
    pub action: usize,
    pub reward: f32,
    pub next_state: StateVector,
    pub terminal: bool,
}
