//! Reads news features (JSON) from stdin and prints the greedy selection of a
//! freshly seeded linear value function together with the state vector.
//!
//! Run with:
//!
//! ```text
//! echo '{"severity":"high","commodity":"gold"}' \
//!     | cargo run -p warnlern-policy --example decide
//! ```

use std::io::{self, Read};
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use warnlern_core::{
    ActionSpace, BehaviorSnapshot, MarketContext, NewsFeatures, StateBuilder, StateInput,
    ValueFunction, Vocabulary, STATE_DIM,
};
use warnlern_policy::{EpsilonGreedy, ExplorationSchedule, LinearValueFunction};

#[derive(Serialize)]
struct DecisionRecord {
    action: String,
    action_id: usize,
    confidence: f32,
    scores: Vec<f32>,
    state: Vec<f32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let news: NewsFeatures = if input.trim().is_empty() {
        NewsFeatures::default()
    } else {
        serde_json::from_str(&input)?
    };

    let actions = ActionSpace::new(3);
    let value_fn = LinearValueFunction::seeded(STATE_DIM, actions.len(), 7);
    let states = StateBuilder::new(Arc::new(Vocabulary::builtin()));
    let state = states.build(&StateInput {
        news: &news,
        behavior: &BehaviorSnapshot::default(),
        market: &MarketContext::default(),
        at: OffsetDateTime::now_utc(),
    });

    let mut policy = EpsilonGreedy::new(ExplorationSchedule::default(), Some(7));
    let selection = policy.select(&value_fn, &state, false);

    let record = DecisionRecord {
        action: actions
            .action(selection.action)
            .map_or_else(|| "unknown".to_string(), |a| a.name()),
        action_id: selection.action,
        confidence: selection.confidence,
        scores: value_fn.scores(&state),
        state: state.as_slice().to_vec(),
    };

    serde_json::to_writer_pretty(io::stdout(), &record)?;
    println!();

    Ok(())
}
