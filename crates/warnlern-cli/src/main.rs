//! CLI for warnlern.
//!
//! Serves single recommendations from a checkpoint, replays recorded event
//! streams through a learning engine, and inspects checkpoint files. All
//! results go to stdout as JSON; logs go to stderr (`RUST_LOG`, default `warn`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use warnlern_core::{
    FeedbackEvent, FeedbackType, ManualClock, MarketContext, MarketOutcomeEvent, NewsFeatures,
    Vocabulary,
};
use warnlern_engine::{
    checkpoint, AlertEngine, EngineConfig, EngineStats, FeedbackOutcome, LearningOutcome,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serving-mode recommendation for one news item
    Recommend {
        /// User id
        #[arg(long)]
        user: String,

        /// News features as JSON
        #[arg(long)]
        news: String,

        /// Market context as JSON
        #[arg(long)]
        market: Option<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Feed a JSONL event stream through an exploring engine
    Replay {
        /// Input file path (one event per line)
        #[arg(long)]
        path: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Print checkpoint metadata
    Inspect {
        /// Checkpoint file
        #[arg(long)]
        checkpoint: PathBuf,
    },
}

#[derive(clap::Args)]
struct EngineArgs {
    /// Checkpoint file; loaded if present, written by `replay`
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keyword/commodity vocabulary (JSON)
    #[arg(long)]
    vocabulary: Option<PathBuf>,
}

/// One line of a replay file. `at` moves the replay clock forward.
#[derive(Deserialize, Debug)]
struct ReplayLine {
    #[serde(default, with = "time::serde::rfc3339::option")]
    at: Option<OffsetDateTime>,
    #[serde(flatten)]
    event: ReplayEvent,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayEvent {
    News {
        user: String,
        /// Label later feedback lines use instead of the generated tracking id
        #[serde(default, rename = "ref")]
        label: Option<String>,
        news: NewsFeatures,
        #[serde(default)]
        market: Option<MarketContext>,
    },
    Feedback {
        #[serde(rename = "ref")]
        label: String,
        feedback_type: FeedbackType,
        #[serde(default)]
        extra: Option<BTreeMap<String, Value>>,
    },
    MarketOutcome(MarketOutcomeEvent),
    MarketContext(MarketContext),
    Preferences {
        user: String,
        commodities: Vec<String>,
    },
    Sweep,
}

#[derive(Serialize, Debug, Default)]
struct ReplaySummary {
    events: u64,
    recommendations: u64,
    alerts: u64,
    feedback_not_found: u64,
    resolved: u64,
    total_reward: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<EngineStats>,
    notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint: Option<PathBuf>,
}

impl ReplaySummary {
    fn add(&mut self, learned: &LearningOutcome) {
        self.resolved += 1;
        self.total_reward += learned.reward;
    }
}

#[derive(Serialize, Debug)]
struct CheckpointInfo {
    path: PathBuf,
    version: u32,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    exploration_rate: f32,
    training_steps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_actions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_dim: Option<u64>,
    has_target: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_engine(args: &EngineArgs, clock: Option<Arc<ManualClock>>) -> Result<AlertEngine> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &args.checkpoint {
        config.checkpoint_path = Some(path.clone());
    }

    let mut engine = AlertEngine::new(config).context("Failed to build engine")?;
    if let Some(path) = &args.vocabulary {
        let vocabulary = Vocabulary::from_path(path)
            .with_context(|| format!("Failed to load vocabulary from {}", path.display()))?;
        engine = engine.with_vocabulary(vocabulary);
    }
    if let Some(clock) = clock {
        engine = engine.with_clock(clock);
    }
    if engine.config().checkpoint_path.is_some() {
        let restored = engine.restore_latest().context("Failed to restore checkpoint")?;
        tracing::info!(restored, "engine ready");
    }
    Ok(engine)
}

fn recommend(user: &str, news: &str, market: Option<&str>, args: &EngineArgs) -> Result<()> {
    let news: NewsFeatures = serde_json::from_str(news).context("Invalid --news JSON")?;
    let market: Option<MarketContext> = market
        .map(serde_json::from_str)
        .transpose()
        .context("Invalid --market JSON")?;
    let engine = build_engine(args, None)?;
    let recommendation = engine.recommend(user, &news, market.as_ref(), false);
    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}

fn replay(path: &Path, args: &EngineArgs) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
    let engine = build_engine(args, Some(Arc::clone(&clock)))?;

    let mut labels: HashMap<String, String> = HashMap::new();
    let mut summary = ReplaySummary::default();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ReplayLine = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", idx + 1))?;
        if let Some(at) = parsed.at {
            clock.set(at);
        }
        summary.events += 1;

        match parsed.event {
            ReplayEvent::News {
                user,
                label,
                news,
                market,
            } => {
                let rec = engine.recommend(&user, &news, market.as_ref(), true);
                summary.recommendations += 1;
                if rec.send_alert {
                    summary.alerts += 1;
                }
                if let (Some(label), Some(id)) = (label, rec.tracking_id) {
                    labels.insert(label, id);
                }
            }
            ReplayEvent::Feedback {
                label,
                feedback_type,
                extra,
            } => {
                // unknown labels (e.g. suppressed alerts) count as not found
                let tracking_id = labels.get(&label).cloned().unwrap_or(label);
                let event = FeedbackEvent {
                    tracking_id,
                    feedback_type,
                    extra,
                };
                match engine.record_feedback(&event) {
                    FeedbackOutcome::NotFound => summary.feedback_not_found += 1,
                    FeedbackOutcome::Recorded => {}
                    FeedbackOutcome::Resolved(learned) => summary.add(&learned),
                }
            }
            ReplayEvent::MarketOutcome(event) => {
                for learned in engine.record_market_outcome(&event) {
                    summary.add(&learned);
                }
            }
            ReplayEvent::MarketContext(context) => engine.update_market_context(context),
            ReplayEvent::Preferences { user, commodities } => {
                engine.declare_preferences(&user, &commodities);
            }
            ReplayEvent::Sweep => {
                for learned in engine.sweep_expired() {
                    summary.add(&learned);
                }
            }
        }
    }

    if let Some(path) = &engine.config().checkpoint_path {
        engine
            .save_checkpoint()
            .with_context(|| format!("Failed to save checkpoint to {}", path.display()))?;
        summary.checkpoint = Some(path.clone());
    }
    summary.notes = engine.underperforming_actions();
    summary.stats = Some(engine.stats());

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let Some(ckpt) = checkpoint::load_from(path)
        .with_context(|| format!("Failed to read checkpoint {}", path.display()))?
    else {
        bail!("No checkpoint found at {}", path.display());
    };
    let info = CheckpointInfo {
        path: path.to_path_buf(),
        version: ckpt.version,
        created_at: ckpt.created_at,
        exploration_rate: ckpt.policy.exploration_rate,
        training_steps: ckpt.policy.training_steps,
        value_function: ckpt.value_function.get("kind").and_then(Value::as_str).map(String::from),
        num_actions: ckpt.value_function.get("num_actions").and_then(Value::as_u64),
        state_dim: ckpt.value_function.get("state_dim").and_then(Value::as_u64),
        has_target: ckpt.target_function.is_some(),
    };
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Recommend {
            user,
            news,
            market,
            engine,
        } => recommend(&user, &news, market.as_deref(), &engine),
        Commands::Replay { path, engine } => replay(&path, &engine),
        Commands::Inspect { checkpoint } => inspect(&checkpoint),
    }
}
