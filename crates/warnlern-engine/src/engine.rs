//! Die Engine: Empfehlung, Nachverfolgung und Lernen hinter einem Objekt.
//!
//! Sperrreihenfolge: Learner → Policy → Serving. Die Registry des
//! [`OutcomeTracker`] wird nie gehalten, während der Learner gesperrt wird;
//! Empfehlungen lesen die Serving-Gewichte über einen geklonten `Arc` und
//! warten daher nie auf das Training. Einträge, die `recommend` wegen der
//! Registry-Grenze verdrängt, landen in einer Warteschlange und werden vom
//! nächsten `record_*`- oder `sweep_expired`-Aufruf gelernt.

use crate::checkpoint::{Checkpoint, CheckpointManager, CHECKPOINT_VERSION};
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use warnlern_core::{
    Action, ActionSpace, Clock, Experience, FeedbackEvent, FeedbackType, MarketContext,
    MarketOutcomeEvent, NewsFeatures, Recommendation, StateBuilder, StateInput, SystemClock,
    ValueFunction, Vocabulary, STATE_DIM,
};
use warnlern_feedback::{
    FeedbackReceipt, FeedbackStatus, OutcomeTracker, PendingPrediction, PredictedOutcome,
    ResolvedPrediction, RewardCalculator, RewardInput, RewardLedger, UserBehaviorRepository,
    UserInsights,
};
use warnlern_policy::{EpsilonGreedy, Learner, LinearValueFunction, PolicyState};

/// Ergebnis eines abgeschlossenen Eintrags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningOutcome {
    pub tracking_id: String,
    pub user_id: String,
    pub action: String,
    pub reward: f32,
    /// `None`, solange der Replay-Speicher noch keinen vollen Batch hält.
    pub loss: Option<f32>,
    pub training_steps: u64,
    pub terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    /// Unbekannte oder bereits abgeschlossene Tracking-ID; nichts geändert.
    NotFound,
    Recorded,
    Resolved(LearningOutcome),
}

impl FeedbackOutcome {
    #[must_use]
    pub fn found(&self) -> bool {
        !matches!(self, FeedbackOutcome::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionStats {
    pub count: usize,
    pub average_reward: f32,
    pub positive_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub actions: BTreeMap<String, ActionStats>,
    pub resolved: usize,
    pub pending: usize,
    pub experiences: usize,
    pub training_steps: u64,
    pub epsilon: f32,
    pub users: usize,
}

pub struct AlertEngine {
    config: EngineConfig,
    actions: ActionSpace,
    states: StateBuilder,
    clock: Arc<dyn Clock>,
    serving: RwLock<Arc<dyn ValueFunction>>,
    learner: Mutex<Learner>,
    policy: Mutex<EpsilonGreedy>,
    tracker: OutcomeTracker,
    /// Verdrängte Einträge, die noch gelernt werden müssen.
    deferred: Mutex<Vec<ResolvedPrediction>>,
    behavior: UserBehaviorRepository,
    rewards: RewardCalculator,
    ledger: Mutex<RewardLedger>,
    market: RwLock<MarketContext>,
    dispatcher: Dispatcher,
    checkpoints: Option<CheckpointManager>,
}

impl std::fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEngine")
            .field("actions", &self.actions)
            .field("pending", &self.tracker.len())
            .field("learner", &*self.learner.lock())
            .finish_non_exhaustive()
    }
}

impl AlertEngine {
    /// Engine mit linearer Wertfunktion (alle Gewichte null).
    pub fn new(config: EngineConfig) -> Result<Self> {
        let actions = ActionSpace::new(config.focus_slots);
        let value_fn = LinearValueFunction::new(STATE_DIM, actions.len())
            .with_learning_rate(config.learning_rate);
        Self::with_value_function(config, Box::new(value_fn))
    }

    /// Die Wertfunktion muss [`STATE_DIM`] Eingänge und genau eine Ausgabe pro
    /// Aktion haben, sonst [`EngineError::Shape`].
    pub fn with_value_function(
        config: EngineConfig,
        value_fn: Box<dyn ValueFunction>,
    ) -> Result<Self> {
        let actions = ActionSpace::new(config.focus_slots);
        if value_fn.state_dim() != STATE_DIM {
            return Err(EngineError::Shape(format!(
                "expected {STATE_DIM} inputs, value function has {}",
                value_fn.state_dim()
            )));
        }
        if value_fn.num_actions() != actions.len() {
            return Err(EngineError::Shape(format!(
                "expected {} actions, value function has {}",
                actions.len(),
                value_fn.num_actions()
            )));
        }

        let serving: Arc<dyn ValueFunction> = Arc::from(value_fn.boxed_clone());
        let learner = Learner::new(value_fn, config.learner(), config.seed)?;
        let policy =
            EpsilonGreedy::new(config.exploration(), config.seed.map(|s| s.wrapping_add(1)));
        let checkpoints = config
            .checkpoint_path
            .as_ref()
            .map(|path| CheckpointManager::new(path.clone(), config.checkpoint_interval()));

        Ok(Self {
            actions,
            states: StateBuilder::new(Arc::new(Vocabulary::builtin())),
            clock: Arc::new(SystemClock),
            serving: RwLock::new(serving),
            learner: Mutex::new(learner),
            policy: Mutex::new(policy),
            tracker: OutcomeTracker::new(config.tracker()),
            deferred: Mutex::new(Vec::new()),
            behavior: UserBehaviorRepository::new(),
            rewards: RewardCalculator::new(config.thresholds),
            ledger: Mutex::new(RewardLedger::default()),
            market: RwLock::new(MarketContext::default()),
            dispatcher: Dispatcher::disabled(),
            checkpoints,
            config,
        })
    }

    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.states = StateBuilder::new(Arc::new(vocabulary));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn actions(&self) -> &ActionSpace {
        &self.actions
    }

    #[must_use]
    pub fn epsilon(&self) -> f32 {
        self.policy.lock().epsilon()
    }

    #[must_use]
    pub fn policy_state(&self) -> PolicyState {
        let learner = self.learner.lock();
        let policy = self.policy.lock();
        PolicyState {
            exploration_rate: policy.epsilon(),
            training_steps: learner.training_steps(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Empfehlung für eine Meldung. Ohne `market` gilt der zuletzt per
    /// [`update_market_context`](Self::update_market_context) gesetzte
    /// Kontext. Mit `explore = false` ist die Aktionswahl deterministisch.
    ///
    /// Jeder Alarm (und mit `track_suppressed` auch jedes "kein Alarm") legt
    /// einen offenen Eintrag unter einer neuen Tracking-ID an.
    pub fn recommend(
        &self,
        user_id: &str,
        news: &NewsFeatures,
        market: Option<&MarketContext>,
        explore: bool,
    ) -> Recommendation {
        let now = self.clock.now();
        let behavior = self.behavior.snapshot(user_id);
        let market = self.market_for(news, market);
        let state = self.states.build(&StateInput {
            news,
            behavior: &behavior,
            market: &market,
            at: now,
        });

        let value_fn = Arc::clone(&*self.serving.read());
        let scores = value_fn.scores(&state);
        let selection = self.policy.lock().select_from_scores(&scores, explore);
        let action = self.actions.action(selection.action).unwrap_or(Action::NoAlert);

        let news_commodity = news
            .commodity
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        let commodity_focus = match action {
            Action::NoAlert => None,
            Action::Alert(_) => news_commodity.clone(),
            Action::Focused(slot) => behavior
                .preferred_commodities
                .get(slot)
                .cloned()
                .or_else(|| news_commodity.clone()),
        };

        let mut recommendation = Recommendation {
            send_alert: action.sends_alert(),
            priority: action.priority(),
            commodity_focus: commodity_focus.clone(),
            confidence: selection.confidence,
            action_id: selection.action,
            user_id: user_id.to_string(),
            timestamp: now,
            tracking_id: None,
            explored: selection.explored,
        };

        if action.sends_alert() || self.config.track_suppressed {
            let tracking_id = Uuid::new_v4().to_string();
            let evicted = self.tracker.open(
                PendingPrediction {
                    tracking_id: tracking_id.clone(),
                    user_id: user_id.to_string(),
                    created_at: now,
                    predicted: PredictedOutcome::from_news(news),
                    news: news.clone(),
                    market,
                    state,
                    action,
                    action_id: selection.action,
                    commodity: news_commodity,
                    commodity_focus,
                    preferred_commodities: behavior.preferred_commodities,
                    actual: None,
                    feedback: None,
                },
                now,
            );
            if action.sends_alert() {
                self.behavior.record_alert_sent(user_id, now);
            }
            if !evicted.is_empty() {
                tracing::debug!(count = evicted.len(), "evicted records deferred");
                self.deferred.lock().extend(evicted);
            }
            recommendation.tracking_id = Some(tracking_id);
        }

        tracing::debug!(
            user_id,
            action = %action.name(),
            confidence = recommendation.confidence,
            explored = recommendation.explored,
            tracking_id = recommendation.tracking_id.as_deref().unwrap_or("-"),
            "recommendation"
        );

        if recommendation.send_alert {
            self.dispatcher.publish(&recommendation);
        }
        recommendation
    }

    /// Nutzer-Feedback zu einer Tracking-ID. Unbekannte IDs ändern nichts.
    pub fn record_feedback(&self, event: &FeedbackEvent) -> FeedbackOutcome {
        let now = self.clock.now();
        let status = self.tracker.record_feedback(event, now);
        let deferred = self.learn_all(Vec::new());
        let outcome = match status {
            FeedbackStatus::NotFound => FeedbackOutcome::NotFound,
            FeedbackStatus::Recorded(receipt) => {
                self.apply_receipt(&receipt);
                FeedbackOutcome::Recorded
            }
            FeedbackStatus::Resolved(receipt, resolved) => {
                self.apply_receipt(&receipt);
                match self.learn(*resolved) {
                    Some(outcome) => FeedbackOutcome::Resolved(outcome),
                    None => FeedbackOutcome::Recorded,
                }
            }
        };
        if !deferred.is_empty() || matches!(outcome, FeedbackOutcome::Resolved(_)) {
            self.checkpoint_if_due();
        }
        outcome
    }

    /// Tatsächliche Kursbewegung eines Rohstoffs; schließt alle passenden
    /// Einträge ab, die bereits Feedback tragen.
    pub fn record_market_outcome(&self, event: &MarketOutcomeEvent) -> Vec<LearningOutcome> {
        let now = self.clock.now();
        let resolved = self.tracker.record_market_outcome(event, now);
        let learned = self.learn_all(resolved);
        if !learned.is_empty() {
            self.checkpoint_if_due();
        }
        learned
    }

    /// Schließt alle Einträge ab, die älter als die TTL sind.
    pub fn sweep_expired(&self) -> Vec<LearningOutcome> {
        let now = self.clock.now();
        let resolved = self.tracker.sweep_expired(now);
        let learned = self.learn_all(resolved);
        if !learned.is_empty() {
            self.checkpoint_if_due();
        }
        learned
    }

    pub fn update_market_context(&self, context: MarketContext) {
        *self.market.write() = context;
    }

    pub fn declare_preferences(&self, user_id: &str, commodities: &[String]) {
        self.behavior.declare_preferences(user_id, commodities);
    }

    #[must_use]
    pub fn user_insights(&self, user_id: &str) -> Option<UserInsights> {
        self.behavior.insights(user_id)
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let (experiences, training_steps) = {
            let learner = self.learner.lock();
            (learner.store().len(), learner.training_steps())
        };
        let ledger = self.ledger.lock();
        EngineStats {
            actions: ledger
                .iter()
                .map(|(name, s)| {
                    (
                        name.to_string(),
                        ActionStats {
                            count: s.total,
                            average_reward: s.average_reward(),
                            positive_rate: s.positive_rate(),
                        },
                    )
                })
                .collect(),
            resolved: ledger.overall().total,
            pending: self.tracker.len(),
            experiences,
            training_steps,
            epsilon: self.epsilon(),
            users: self.behavior.len(),
        }
    }

    /// Hinweise auf Aktionen, die überwiegend nicht-positive Belohnungen
    /// erhalten.
    #[must_use]
    pub fn underperforming_actions(&self) -> Vec<String> {
        self.ledger.lock().underperforming()
    }

    /// Momentaufnahme von Gewichten und Policy-Zustand.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        let (policy, (value_function, target_function)) = {
            let learner = self.learner.lock();
            let policy = self.policy.lock();
            (
                PolicyState {
                    exploration_rate: policy.epsilon(),
                    training_steps: learner.training_steps(),
                },
                learner.snapshot(),
            )
        };
        Checkpoint {
            version: CHECKPOINT_VERSION,
            created_at: self.clock.now(),
            policy,
            value_function,
            target_function: Some(target_function),
        }
    }

    /// Stellt Gewichte, Schrittzähler und Explorationsrate wieder her.
    pub fn restore(&self, checkpoint: &Checkpoint) -> Result<()> {
        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(EngineError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        let mut learner = self.learner.lock();
        learner.restore(
            checkpoint.value_function.clone(),
            checkpoint.target_function.clone(),
            checkpoint.policy.training_steps,
        )?;
        self.policy.lock().set_epsilon(checkpoint.policy.exploration_rate);
        *self.serving.write() = Arc::from(learner.online().boxed_clone());
        tracing::info!(
            training_steps = checkpoint.policy.training_steps,
            epsilon = checkpoint.policy.exploration_rate,
            "checkpoint restored"
        );
        Ok(())
    }

    /// Lädt den Checkpoint vom konfigurierten Pfad, falls vorhanden.
    pub fn restore_latest(&self) -> Result<bool> {
        let manager = self.checkpoints.as_ref().ok_or(EngineError::NoCheckpointPath)?;
        match manager.load()? {
            Some(checkpoint) => {
                self.restore(&checkpoint)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn save_checkpoint(&self) -> Result<()> {
        let manager = self.checkpoints.as_ref().ok_or(EngineError::NoCheckpointPath)?;
        manager.save(&self.checkpoint())
    }

    /// Speichert, wenn das Intervall abgelaufen ist. Fehler werden nur
    /// geloggt; der nächste Aufruf versucht es erneut.
    ///
    /// Wird nach jedem Lernschritt aufgerufen, außerhalb der Learner-Sperre.
    pub fn checkpoint_if_due(&self) -> bool {
        let Some(manager) = &self.checkpoints else {
            return false;
        };
        if !manager.is_due(self.clock.now()) {
            return false;
        }
        match manager.save(&self.checkpoint()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %manager.path().display(),
                    "checkpoint write failed"
                );
                false
            }
        }
    }

    /// Zuerst die verdrängten Einträge, dann `resolved`.
    fn learn_all(&self, resolved: Vec<ResolvedPrediction>) -> Vec<LearningOutcome> {
        let deferred = std::mem::take(&mut *self.deferred.lock());
        deferred
            .into_iter()
            .chain(resolved)
            .filter_map(|resolved| self.learn(resolved))
            .collect()
    }

    fn market_for(&self, news: &NewsFeatures, market: Option<&MarketContext>) -> MarketContext {
        let mut context = market.cloned().unwrap_or_else(|| self.market.read().clone());
        if context.recent_move_percent.is_none() {
            let window = self.tracker.config().outcome_window;
            let now = self.clock.now();
            context.recent_move_percent = news
                .commodity
                .as_deref()
                .and_then(|c| self.tracker.latest_quote(c))
                .filter(|q| now - q.at <= window)
                .map(|q| q.price_change_percent);
        }
        context
    }

    fn apply_receipt(&self, receipt: &FeedbackReceipt) {
        if !receipt.first_of_kind {
            return;
        }
        let user = receipt.user_id.as_str();
        match receipt.feedback_type {
            FeedbackType::Clicked => {
                self.behavior.record_click(
                    user,
                    receipt.commodity.as_deref(),
                    Some(receipt.response_secs),
                );
            }
            FeedbackType::Dismissed => {
                self.behavior.record_dismissal(user, Some(receipt.response_secs));
            }
            FeedbackType::Helpful => self.behavior.record_helpfulness(user, true),
            FeedbackType::NotHelpful => self.behavior.record_helpfulness(user, false),
        }
    }

    /// Belohnung berechnen, Übergang aufnehmen, ggf. trainieren und die neuen
    /// Gewichte veröffentlichen.
    fn learn(&self, resolved: ResolvedPrediction) -> Option<LearningOutcome> {
        let now = self.clock.now();
        let record = &resolved.record;
        let reward = self.rewards.compute(&RewardInput {
            action: record.action,
            predicted: record.predicted,
            actual: resolved.actual,
            feedback: record.feedback.as_ref(),
            commodity_focus: record.commodity_focus.as_deref(),
            preferred_commodities: &record.preferred_commodities,
        });

        let behavior = self.behavior.snapshot(&record.user_id);
        let market = self.market_for(&record.news, None);
        let next_state = self.states.build(&StateInput {
            news: &record.news,
            behavior: &behavior,
            market: &market,
            at: now,
        });
        let terminal = resolved.resolution.is_terminal();
        let experience = Experience {
            state: record.state.clone(),
            action: record.action_id,
            reward: reward.total,
            next_state,
            terminal,
        };

        let mut learner = self.learner.lock();
        let step = match learner.observe(experience) {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!(
                    tracking_id = %record.tracking_id,
                    error = %e,
                    "experience rejected"
                );
                return None;
            }
        };
        if step.trained() {
            let epsilon = {
                let mut policy = self.policy.lock();
                policy.decay();
                policy.epsilon()
            };
            *self.serving.write() = Arc::from(learner.online().boxed_clone());
            tracing::debug!(
                training_steps = step.training_steps,
                loss = step.loss.unwrap_or_default(),
                target_synced = step.target_synced,
                epsilon,
                "learning step"
            );
        }
        drop(learner);

        let action = record.action.name();
        self.ledger.lock().record(&action, reward.total);
        tracing::info!(
            tracking_id = %record.tracking_id,
            user_id = %record.user_id,
            action = %action,
            reward = reward.total,
            resolution = ?resolved.resolution,
            "prediction resolved"
        );

        Some(LearningOutcome {
            tracking_id: record.tracking_id.clone(),
            user_id: record.user_id.clone(),
            action,
            reward: reward.total,
            loss: step.loss,
            training_steps: step.training_steps,
            terminal,
        })
    }
}
