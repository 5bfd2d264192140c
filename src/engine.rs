//! The bootstrapping engine.
//!
//! [`Engine`] owns all state for one instance: phase controller, knowledge
//! store, entanglement state, personality, and emotional history. Every
//! dependency (scaffold, providers, snapshot store, randomness) is injected.
//! Calls must be serialized per instance; `process` takes `&mut self`.

use crate::affect::{
    EmotionSummary, EmotionalHistory, EmotionalMapping, EmotionalReading, PersonalityVector,
    PrimaryEmotions,
};
use crate::collapse::collapse;
use crate::config::{EngineConfig, KnowledgeVariant};
use crate::error::{Error, GenerationError, ProcessingError, Result};
use crate::generator::{Candidate, SimulationParams, generate_from_exemplars, simulate};
use crate::health::{FaultKind, HealthMonitor, HealthStatus};
use crate::incentive::{IncentiveSummary, IncentiveSystem, Penalty, Reward};
use crate::knowledge::{KnowledgeBase, Observation};
use crate::metrics::{Metrics, MetricsEvaluator};
use crate::monitor::{InputDiversity, PerformanceHistory};
use crate::phase::{Phase, PhaseController, Thresholds, Transition, parity_ratio};
use crate::providers::{Classification, ProviderOutcome, ProviderStatus, Providers};
use crate::quantum::{EntanglementSummary, QuantumState};
use crate::random::{RandomSource, SeededRandom};
use crate::scaffold::{ScaffoldAdapter, ScaffoldSlot};
use crate::snapshot::{SNAPSHOT_FORMAT_VERSION, Snapshot, SnapshotStore};
use crate::text;
use crate::truth;

use chrono::Utc;
use serde::Serialize;

use std::sync::Arc;

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub phase: Phase,
    pub metrics: Metrics,
    pub overall_score: f64,
    pub iterations: u64,
    pub knowledge_size: usize,
    pub knowledge_variant: KnowledgeVariant,
    pub scaffold_active: bool,
    pub personality_vector: Vec<f64>,
    pub verification_counter: u32,
    pub entanglement: Option<EntanglementSummary>,
    pub providers: ProviderStatus,
    pub performance_trend: f64,
    pub emotions: EmotionSummary,
    pub incentives: IncentiveSummary,
    pub health: HealthStatus,
    pub live_candidates: usize,
}

/// Persistent state, rebuilt from scratch on reset.
#[derive(Debug, Clone)]
struct EngineState {
    controller: PhaseController,
    iterations: u64,
    metrics: Metrics,
    knowledge: KnowledgeBase,
    quantum: Option<QuantumState>,
    personality: PersonalityVector,
    emotional_history: EmotionalHistory,
    primary_emotions: PrimaryEmotions,
    performance: PerformanceHistory,
    input_diversity: InputDiversity,
    incentives: IncentiveSystem,
    health: HealthMonitor,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            controller: PhaseController::new(),
            iterations: 0,
            metrics: Metrics::default(),
            knowledge: KnowledgeBase::new(config),
            quantum: new_quantum(config),
            personality: PersonalityVector::default(),
            emotional_history: EmotionalHistory::new(config.emotional_history_cap),
            primary_emotions: PrimaryEmotions::default(),
            performance: PerformanceHistory::default(),
            input_diversity: InputDiversity::default(),
            incentives: IncentiveSystem::default(),
            health: HealthMonitor::default(),
        }
    }
}

/// Stability below which the primary emotions count as imbalanced.
const IMBALANCE_STABILITY: f64 = -25.0;
/// Reward magnitude for an input not seen in the diversity window.
const CURIOSITY_MAGNITUDE: f64 = 0.1;

fn new_quantum(config: &EngineConfig) -> Option<QuantumState> {
    (config.variant == KnowledgeVariant::Graph)
        .then(|| QuantumState::new(config.entanglement_dims, config.collapse_history_cap))
}

/// Output of one phase step.
struct StepOutcome {
    output: String,
    metrics: Metrics,
    /// Internal/scaffold score ratio, when both were scored this step.
    parity: Option<f64>,
}

pub struct Engine {
    config: EngineConfig,
    thresholds: Thresholds,
    scaffold: ScaffoldSlot,
    evaluator: MetricsEvaluator,
    store: Arc<dyn SnapshotStore>,
    random: Box<dyn RandomSource>,
    state: EngineState,
    live_candidates: Vec<Candidate>,
    last_exchange: Option<String>,
    initialized: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        scaffold: Arc<dyn ScaffoldAdapter>,
        providers: Providers,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            thresholds: Thresholds::from(&config),
            scaffold: ScaffoldSlot::new(scaffold, config.scaffold.clone()),
            evaluator: MetricsEvaluator::new(providers, config.variant),
            store,
            random: Box::new(SeededRandom::from_optional_seed(config.rng_seed)),
            state: EngineState::new(&config),
            live_candidates: Vec::new(),
            last_exchange: None,
            initialized: false,
            config,
        })
    }

    /// Replace the randomness source.
    pub fn with_random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.controller.current()
    }

    /// Candidates from the most recent simulation. Never persisted.
    pub fn live_candidates(&self) -> &[Candidate] {
        &self.live_candidates
    }

    pub fn transition_history(&self) -> Vec<Transition> {
        self.state.controller.history().cloned().collect()
    }

    /// Restore the last snapshot if one exists, otherwise bring the scaffold
    /// up and enter Scaffolding. Idempotent.
    pub async fn initialize(&mut self) -> Result<()> {
        self.bring_up(true).await
    }

    async fn bring_up(&mut self, load_snapshot: bool) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        if load_snapshot {
            match self.store.load().await {
                Ok(Some(snapshot)) => {
                    if let Err(error) = self.restore(snapshot).await {
                        tracing::warn!(%error, "discarding unusable snapshot, starting fresh");
                        self.state = EngineState::new(&self.config);
                        self.state
                            .health
                            .record(FaultKind::SnapshotDiscarded, error.to_string());
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%error, "failed to load snapshot, starting fresh");
                    self.state
                        .health
                        .record(FaultKind::PersistenceFailure, error.to_string());
                }
            }
        }

        let phase = self.phase();
        if !phase.is_terminal() {
            self.scaffold
                .ensure_ready()
                .await
                .map_err(Error::Initialization)?;
        }
        if let Some(transition) = self.state.controller.scaffold_ready(self.state.iterations) {
            self.apply_transition(transition).await;
        }

        self.initialized = true;
        tracing::info!(
            phase = %self.phase(),
            variant = %self.config.variant,
            knowledge = self.state.knowledge.len(),
            iterations = self.state.iterations,
            "engine initialized"
        );
        Ok(())
    }

    /// Handle one input and return the emitted output.
    pub async fn process(&mut self, input: &str) -> Result<String> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        let novel = !self.state.input_diversity.has_seen(input);
        if self.state.input_diversity.record(input) {
            tracing::warn!(
                ratio = self.state.input_diversity.ratio(),
                "input diversity is low"
            );
            let state = &mut self.state;
            state
                .incentives
                .penalize(Penalty::Stagnation, 1.0, &mut state.primary_emotions);
        }
        if novel {
            let state = &mut self.state;
            state
                .incentives
                .reward(Reward::Curiosity, CURIOSITY_MAGNITUDE, &mut state.primary_emotions);
        }

        if let Some(transition) = self
            .state
            .controller
            .check_verification(&self.thresholds, self.state.iterations)
        {
            self.apply_transition(transition).await;
        }

        let phase = self.phase();
        let step = match phase {
            Phase::Initialization => {
                return Err(Error::InvalidPhase(
                    "initialized engine is still in initialization".into(),
                ));
            }
            Phase::Scaffolding => self.scaffolding_step(input).await?,
            Phase::SelfEmulation => self.self_emulation_step(input).await?,
            Phase::Verification => self.verification_step(input).await?,
            Phase::Independent => self.independent_step(input).await?,
        };

        self.state.iterations += 1;
        self.record_emission(&step).await;
        self.tend();

        let transition = self.state.controller.check_progress(
            &self.thresholds,
            self.state.iterations,
            self.state.knowledge.len(),
            step.parity,
        );
        match transition {
            Some(transition) => self.apply_transition(transition).await,
            None if self.state.iterations % self.config.snapshot_interval == 0 => {
                self.persist().await;
            }
            None => {}
        }

        self.last_exchange = Some(format!("{input} {}", step.output));
        Ok(step.output)
    }

    /// Advance one phase regardless of guards. From Initialization this
    /// initializes the engine; from Independent it does nothing.
    pub async fn force_next_phase(&mut self) -> Result<Phase> {
        if !self.initialized {
            self.initialize().await?;
            return Ok(self.phase());
        }
        if let Some(transition) = self.state.controller.force_next(self.state.iterations) {
            self.apply_transition(transition).await;
        }
        Ok(self.phase())
    }

    /// Clear durable storage, rebuild empty state, and initialize again.
    pub async fn reset(&mut self) -> Result<()> {
        if let Err(error) = self.store.clear().await {
            tracing::warn!(%error, "failed to clear snapshot store during reset");
        }
        self.state = EngineState::new(&self.config);
        self.live_candidates.clear();
        self.last_exchange = None;
        self.initialized = false;
        tracing::info!("engine reset");
        self.bring_up(false).await
    }

    pub fn status(&self) -> EngineStatus {
        let state = &self.state;
        EngineStatus {
            phase: state.controller.current(),
            overall_score: state.metrics.overall_score(),
            metrics: state.metrics.clone(),
            iterations: state.iterations,
            knowledge_size: state.knowledge.len(),
            knowledge_variant: state.knowledge.variant(),
            scaffold_active: self.scaffold.is_active(),
            personality_vector: state.personality.values().to_vec(),
            verification_counter: state.controller.verification_counter(),
            entanglement: state.quantum.as_ref().map(QuantumState::summary),
            providers: self.evaluator.providers().status(),
            performance_trend: state.performance.trend(),
            emotions: state.primary_emotions.summary(),
            incentives: state.incentives.summary(),
            health: state.health.status(),
            live_candidates: self.live_candidates.len(),
        }
    }

    /// Capture the persistent state.
    pub fn snapshot(&self) -> Snapshot {
        let state = &self.state;
        Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            phase: state.controller.current(),
            verification_counter: state.controller.verification_counter(),
            iterations: state.iterations,
            metrics: state.metrics.clone(),
            knowledge: state.knowledge.clone(),
            quantum: state.quantum.clone(),
            scaffold_active: self.scaffold.is_active(),
            personality: state.personality.clone(),
            emotional_history: state.emotional_history.clone(),
            primary_emotions: state.primary_emotions.clone(),
            performance: state.performance.clone(),
            input_diversity: state.input_diversity.clone(),
            incentives: state.incentives.clone(),
            health: state.health.clone(),
        }
    }

    /// Save a snapshot now, propagating store failures.
    pub async fn checkpoint(&self) -> Result<()> {
        self.store.save(&self.snapshot()).await?;
        Ok(())
    }

    /// Replace the persistent state with `snapshot`. Transient candidates are
    /// dropped. A terminal snapshot releases the scaffold; a non-terminal one
    /// brings it back up when the engine is already initialized.
    pub async fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        if snapshot.knowledge.variant() != self.config.variant {
            return Err(Error::Config(format!(
                "snapshot holds {} knowledge but engine is configured for {}",
                snapshot.knowledge.variant(),
                self.config.variant
            )));
        }

        self.state = EngineState {
            controller: PhaseController::restore(
                snapshot.phase,
                snapshot.verification_counter,
                snapshot.iterations,
            ),
            iterations: snapshot.iterations,
            metrics: snapshot.metrics,
            knowledge: snapshot.knowledge,
            quantum: snapshot.quantum.or_else(|| new_quantum(&self.config)),
            personality: snapshot.personality,
            emotional_history: snapshot.emotional_history,
            primary_emotions: snapshot.primary_emotions,
            performance: snapshot.performance,
            input_diversity: snapshot.input_diversity,
            incentives: snapshot.incentives,
            health: snapshot.health,
        };
        self.live_candidates.clear();
        self.last_exchange = None;

        if snapshot.phase.is_terminal() {
            self.scaffold.release().await;
        } else if self.initialized {
            self.scaffold
                .ensure_ready()
                .await
                .map_err(Error::Initialization)?;
        }
        tracing::debug!(
            phase = %snapshot.phase,
            iterations = self.state.iterations,
            knowledge = self.state.knowledge.len(),
            "snapshot restored"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Phase steps
    // -----------------------------------------------------------------------

    async fn scaffolding_step(&mut self, input: &str) -> Result<StepOutcome> {
        let output = self
            .scaffold
            .generate(input)
            .await
            .map_err(ProcessingError::from)?;
        let metrics = self.evaluate(input, &output).await;
        self.absorb(input, &output, metrics.clone()).await;
        Ok(StepOutcome {
            output,
            metrics,
            parity: None,
        })
    }

    async fn self_emulation_step(&mut self, input: &str) -> Result<StepOutcome> {
        let scaffold_output = self
            .scaffold
            .generate(input)
            .await
            .map_err(ProcessingError::from)?;
        let scaffold_metrics = self.evaluate(input, &scaffold_output).await;

        let internal_output = match self.generate_internal(input).await {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!(
                    phase = %Phase::SelfEmulation,
                    %error,
                    "internal generation failed, falling back to scaffold"
                );
                self.record_fallback(&error);
                self.absorb(input, &scaffold_output, scaffold_metrics.clone())
                    .await;
                return Ok(StepOutcome {
                    output: scaffold_output,
                    metrics: scaffold_metrics,
                    parity: None,
                });
            }
        };
        let internal_metrics = self.evaluate(input, &internal_output).await;

        let scaffold_score = scaffold_metrics.overall_score();
        let internal_score = internal_metrics.overall_score();
        if scaffold_score > internal_score {
            let state = &mut self.state;
            state.incentives.reward(
                Reward::Cooperation,
                scaffold_score - internal_score,
                &mut state.primary_emotions,
            );
            self.absorb(input, &scaffold_output, scaffold_metrics).await;
            let adjustments = self
                .state
                .personality
                .learn_from_comparison(&scaffold_output, &internal_output);
            tracing::debug!(
                adjustments = adjustments.len(),
                scaffold_score,
                internal_score,
                "personality nudged toward scaffold"
            );
        } else {
            let state = &mut self.state;
            state
                .incentives
                .reward(Reward::Innovation, internal_score, &mut state.primary_emotions);
        }

        let share = (self.state.iterations as f64 / self.config.max_iterations as f64)
            .min(self.config.blend_cap);
        let output = blend(
            &internal_output,
            &scaffold_output,
            share,
            self.random.as_mut(),
        );
        let metrics = self.evaluate(input, &output).await;

        Ok(StepOutcome {
            output,
            metrics,
            parity: Some(parity_ratio(internal_score, scaffold_score)),
        })
    }

    async fn verification_step(&mut self, input: &str) -> Result<StepOutcome> {
        let (output, from_scaffold) = self
            .internal_or_fallback(input, Phase::Verification)
            .await?;
        let metrics = self.evaluate(input, &output).await;

        let passed =
            !from_scaffold && metrics.overall_score() >= self.config.verification_quality_threshold;
        let counter = self.state.controller.record_verification(passed);
        if passed {
            let state = &mut self.state;
            state.incentives.reward(
                Reward::Efficiency,
                metrics.overall_score(),
                &mut state.primary_emotions,
            );
        }
        tracing::debug!(
            passed,
            counter,
            score = metrics.overall_score(),
            "verification outcome"
        );

        Ok(StepOutcome {
            output,
            metrics,
            parity: None,
        })
    }

    async fn independent_step(&mut self, input: &str) -> Result<StepOutcome> {
        let (output, _) = self
            .internal_or_fallback(input, Phase::Independent)
            .await?;
        let metrics = self.evaluate(input, &output).await;
        Ok(StepOutcome {
            output,
            metrics,
            parity: None,
        })
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Internal output, or the scaffold's when internal generation fails and
    /// the scaffold is still active. The flag is true for scaffold output.
    async fn internal_or_fallback(&mut self, input: &str, phase: Phase) -> Result<(String, bool)> {
        match self.generate_internal(input).await {
            Ok(output) => Ok((output, false)),
            Err(source) if self.scaffold.is_active() => {
                tracing::warn!(
                    %phase,
                    error = %source,
                    "internal generation failed, falling back to scaffold"
                );
                self.record_fallback(&source);
                let state = &mut self.state;
                state
                    .incentives
                    .penalize(Penalty::ResourceWaste, 0.5, &mut state.primary_emotions);
                let output = self
                    .scaffold
                    .generate(input)
                    .await
                    .map_err(ProcessingError::from)?;
                Ok((output, true))
            }
            Err(source) => Err(ProcessingError::Generation { phase, source }.into()),
        }
    }

    async fn generate_internal(&mut self, input: &str) -> std::result::Result<String, GenerationError> {
        let params = SimulationParams::from(&self.config);
        let mut candidates = match &mut self.state.knowledge {
            KnowledgeBase::Basic(log) => {
                return generate_from_exemplars(log, input, self.random.as_mut());
            }
            KnowledgeBase::Graph(store) => {
                let quantum = self.state.quantum.get_or_insert_with(|| {
                    QuantumState::new(
                        self.config.entanglement_dims,
                        self.config.collapse_history_cap,
                    )
                });
                simulate(
                    store,
                    quantum,
                    &self.state.emotional_history,
                    input,
                    params,
                    self.random.as_mut(),
                )?
            }
        };

        for candidate in &mut candidates {
            candidate.emotional_resonance = self
                .evaluator
                .emotional_resonance(&candidate.text, &self.state.personality)
                .await;
            candidate.truth_compliance = truth::is_compliant(&candidate.text);
        }

        let selection = collapse(&candidates).ok_or(GenerationError::NoCandidates)?;
        if selection.degraded {
            let state = &mut self.state;
            state.health.record(
                FaultKind::ComplianceDegraded,
                format!("{} candidates, none compliant", candidates.len()),
            );
            state
                .incentives
                .penalize(Penalty::Conflict, 0.5, &mut state.primary_emotions);
        }
        let chosen = &candidates[selection.index];
        if let Some(quantum) = &mut self.state.quantum {
            quantum.record_collapse(chosen.id.clone());
        }
        tracing::debug!(
            candidates = candidates.len(),
            chosen = %chosen.id,
            weight = selection.weight,
            degraded = selection.degraded,
            "collapsed candidate set"
        );
        let output = chosen.text.clone();
        self.live_candidates = candidates;
        Ok(output)
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    async fn evaluate(&self, input: &str, output: &str) -> Metrics {
        self.evaluator
            .evaluate(
                input,
                output,
                self.last_exchange.as_deref(),
                &self.state.personality,
            )
            .await
    }

    async fn classify(&self, output: &str) -> Option<Classification> {
        match self.evaluator.providers().classify(output).await {
            ProviderOutcome::Available(classification) => Some(classification),
            ProviderOutcome::Unavailable | ProviderOutcome::Failed(_) => None,
        }
    }

    /// Grow the knowledge store (and entanglement state) from one exchange.
    async fn absorb(&mut self, input: &str, output: &str, metrics: Metrics) {
        let emotion = match self.state.knowledge.variant() {
            KnowledgeVariant::Graph => self
                .classify(output)
                .await
                .map(|classification| EmotionalMapping::from_classification(output, &classification))
                .unwrap_or_else(EmotionalMapping::neutral),
            KnowledgeVariant::Basic => EmotionalMapping::neutral(),
        };

        self.state.knowledge.absorb(Observation {
            input,
            output,
            metrics,
            emotion,
        });

        if let Some(quantum) = &mut self.state.quantum {
            let tokens: Vec<String> = text::tokenize(input)
                .into_iter()
                .chain(text::tokenize(output))
                .collect();
            quantum.update(&tokens);
        }
    }

    /// Record the emitted output's score and emotional reading.
    async fn record_emission(&mut self, step: &StepOutcome) {
        let reading = match self.classify(&step.output).await {
            Some(classification) => {
                EmotionalReading::from_classification(&step.output, &classification)
            }
            None => EmotionalReading::from_text(&step.output),
        };
        self.state.emotional_history.push(reading);
        self.state.primary_emotions.absorb_reading(&reading);
        self.state.performance.record(step.metrics.overall_score());
        self.state.metrics = step.metrics.clone();
    }

    fn record_fallback(&mut self, error: &GenerationError) {
        let state = &mut self.state;
        state
            .health
            .record(FaultKind::GenerationFallback, error.to_string());
        state
            .incentives
            .penalize(Penalty::Error, 1.0, &mut state.primary_emotions);
    }

    /// Adapt incentives to the performance trend, then diagnose and heal.
    fn tend(&mut self) {
        let state = &mut self.state;
        state.incentives.adapt(state.performance.trend());

        let stability = state.primary_emotions.stability();
        if stability < IMBALANCE_STABILITY {
            state.health.record(
                FaultKind::EmotionalImbalance,
                format!("stability {stability:.1}"),
            );
        }
        state.health.heal(&mut state.primary_emotions);
    }

    async fn apply_transition(&mut self, transition: Transition) {
        if transition.to.is_terminal() {
            self.scaffold.release().await;
        }
        self.persist().await;
    }

    /// Save a snapshot. Failures are logged and recorded as faults.
    async fn persist(&mut self) {
        if let Err(error) = self.checkpoint().await {
            tracing::warn!(%error, "failed to persist snapshot, continuing in memory");
            self.state
                .health
                .record(FaultKind::PersistenceFailure, error.to_string());
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("phase", &self.phase())
            .field("iterations", &self.state.iterations)
            .field("knowledge", &self.state.knowledge.len())
            .field("scaffold", &self.scaffold)
            .finish_non_exhaustive()
    }
}

/// Sentence-wise mix of two outputs. Position `i` takes the internal
/// sentence with probability `share` and the scaffold sentence otherwise,
/// falling back to whichever side has a sentence at that position.
pub fn blend(internal: &str, scaffold: &str, share: f64, rng: &mut dyn RandomSource) -> String {
    let internal_sentences = text::split_sentences(internal);
    let scaffold_sentences = text::split_sentences(scaffold);
    let positions = internal_sentences.len().max(scaffold_sentences.len());
    if positions == 0 {
        return scaffold.to_string();
    }

    let mut blended = Vec::with_capacity(positions);
    for position in 0..positions {
        let take_internal = rng.chance(share);
        let (first, second) = if take_internal {
            (&internal_sentences, &scaffold_sentences)
        } else {
            (&scaffold_sentences, &internal_sentences)
        };
        if let Some(sentence) = first.get(position).or_else(|| second.get(position)) {
            blended.push(*sentence);
        }
    }
    blended.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaffoldConfig;
    use crate::error::{PersistenceError, ScaffoldError};
    use crate::health::HealthArea;
    use crate::knowledge::{ExemplarLog, KnowledgeUnit};
    use crate::random::ScriptedRandom;
    use crate::scaffold::ScaffoldHandle;
    use crate::snapshot::MemorySnapshotStore;

    use futures::future::BoxFuture;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockScaffold {
        initialized: AtomicUsize,
        generated: AtomicUsize,
        released: AtomicUsize,
        unavailable: bool,
        /// Fixed answer; when unset the prompt is echoed in a template.
        reply: Option<&'static str>,
    }

    impl MockScaffold {
        fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    impl ScaffoldAdapter for MockScaffold {
        fn initialize<'a>(
            &'a self,
            _config: &'a ScaffoldConfig,
        ) -> BoxFuture<'a, std::result::Result<ScaffoldHandle, ScaffoldError>> {
            Box::pin(async move {
                if self.unavailable {
                    return Err(ScaffoldError::Unavailable("offline".into()));
                }
                self.initialized.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ScaffoldError>(ScaffoldHandle::new("mock"))
            })
        }

        fn generate<'a>(
            &'a self,
            _handle: &'a ScaffoldHandle,
            prompt: &'a str,
            _temperature: f64,
            _max_tokens: u32,
        ) -> BoxFuture<'a, std::result::Result<String, ScaffoldError>> {
            Box::pin(async move {
                self.generated.fetch_add(1, Ordering::SeqCst);
                let answer = match self.reply {
                    Some(reply) => reply.to_string(),
                    None => format!(
                        "You asked about {prompt}. I think {prompt} matters because people care about it."
                    ),
                };
                Ok::<_, ScaffoldError>(answer)
            })
        }

        fn release<'a>(&'a self, _handle: ScaffoldHandle) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.released.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    struct FailingStore;

    impl SnapshotStore for FailingStore {
        fn save<'a>(
            &'a self,
            _snapshot: &'a Snapshot,
        ) -> BoxFuture<'a, std::result::Result<(), PersistenceError>> {
            Box::pin(async { Err::<(), _>(PersistenceError::Other(anyhow::anyhow!("disk full"))) })
        }

        fn load<'a>(&'a self) -> BoxFuture<'a, std::result::Result<Option<Snapshot>, PersistenceError>> {
            Box::pin(async {
                Err::<Option<Snapshot>, _>(PersistenceError::Other(anyhow::anyhow!("unreadable")))
            })
        }

        fn clear<'a>(&'a self) -> BoxFuture<'a, std::result::Result<(), PersistenceError>> {
            Box::pin(async { Ok::<_, PersistenceError>(()) })
        }
    }

    fn seeded(config: EngineConfig) -> EngineConfig {
        EngineConfig {
            rng_seed: Some(7),
            ..config
        }
    }

    fn engine_with(
        config: EngineConfig,
        scaffold: &Arc<MockScaffold>,
        store: &Arc<MemorySnapshotStore>,
    ) -> Engine {
        Engine::new(seeded(config), scaffold.clone(), Providers::none(), store.clone()).unwrap()
    }

    fn basic_config() -> EngineConfig {
        EngineConfig {
            variant: KnowledgeVariant::Basic,
            ..EngineConfig::default()
        }
    }

    /// Snapshot in `phase` holding the given exemplars.
    fn basic_snapshot(phase: Phase, counter: u32, pairs: &[(&str, &str)]) -> Snapshot {
        let config = basic_config();
        let mut log = ExemplarLog::new(config.exemplar_capacity);
        for (input, output) in pairs {
            log.push(KnowledgeUnit::new(input, output, Metrics::default()));
        }
        Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            phase,
            verification_counter: counter,
            iterations: 300,
            metrics: Metrics::default(),
            knowledge: KnowledgeBase::Basic(log),
            quantum: None,
            scaffold_active: true,
            personality: PersonalityVector::default(),
            emotional_history: EmotionalHistory::new(config.emotional_history_cap),
            primary_emotions: PrimaryEmotions::default(),
            performance: PerformanceHistory::default(),
            input_diversity: InputDiversity::default(),
            incentives: IncentiveSystem::default(),
            health: HealthMonitor::default(),
        }
    }

    const SKY_INPUT: &str = "why is the sky blue";
    const SKY_OUTPUT: &str =
        "The sky is blue because air scatters blue light. Therefore the sky looks blue when the sun is high.";

    #[tokio::test]
    async fn process_requires_initialize() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let mut engine = engine_with(EngineConfig::default(), &scaffold, &store);
        assert!(matches!(engine.process("hello").await, Err(Error::NotInitialized)));
    }

    #[tokio::test]
    async fn unavailable_scaffold_fails_initialize() {
        let scaffold = Arc::new(MockScaffold {
            unavailable: true,
            ..MockScaffold::default()
        });
        let store = Arc::new(MemorySnapshotStore::new());
        let mut engine = engine_with(EngineConfig::default(), &scaffold, &store);
        assert!(matches!(engine.initialize().await, Err(Error::Initialization(_))));
        assert_eq!(engine.phase(), Phase::Initialization);
    }

    #[tokio::test]
    async fn first_input_comes_from_scaffold() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let mut engine = engine_with(EngineConfig::default(), &scaffold, &store);
        engine.initialize().await.unwrap();
        assert_eq!(engine.phase(), Phase::Scaffolding);

        let output = engine.process("hello").await.unwrap();
        assert_eq!(
            output,
            "You asked about hello. I think hello matters because people care about it."
        );
        let status = engine.status();
        assert_eq!(status.knowledge_size, 1);
        assert_eq!(status.iterations, 1);
        assert!(status.scaffold_active);
        assert!(status.entanglement.is_some());
        assert_eq!(MockScaffold::count(&scaffold.generated), 1);
    }

    #[tokio::test]
    async fn fiftieth_exchange_enters_self_emulation() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let mut engine = engine_with(EngineConfig::default(), &scaffold, &store);
        engine.initialize().await.unwrap();

        for index in 0..49 {
            engine.process(&format!("topic number {index}")).await.unwrap();
        }
        assert_eq!(engine.status().knowledge_size, 49);
        assert_eq!(engine.phase(), Phase::Scaffolding);

        engine.process("one more topic").await.unwrap();
        assert_eq!(engine.phase(), Phase::SelfEmulation);
        assert!(!store.is_empty().await, "transition must persist a snapshot");
    }

    #[tokio::test]
    async fn verification_completes_on_next_call() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::Verification, 9, &[(SKY_INPUT, SKY_OUTPUT)]))
            .await
            .unwrap();
        let mut engine = engine_with(basic_config(), &scaffold, &store);
        engine.initialize().await.unwrap();
        assert_eq!(engine.phase(), Phase::Verification);
        assert!(engine.status().scaffold_active);

        let output = engine.process(SKY_INPUT).await.unwrap();
        assert_eq!(output, SKY_OUTPUT);
        assert_eq!(engine.status().verification_counter, 10);
        assert_eq!(engine.phase(), Phase::Verification);

        engine.process(SKY_INPUT).await.unwrap();
        assert_eq!(engine.phase(), Phase::Independent);
        assert!(!engine.status().scaffold_active);
        assert_eq!(MockScaffold::count(&scaffold.released), 1);
        assert_eq!(MockScaffold::count(&scaffold.generated), 0);
    }

    #[tokio::test]
    async fn weak_output_resets_verification_counter() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::Verification, 5, &[("status", "ok")]))
            .await
            .unwrap();
        let mut engine = engine_with(basic_config(), &scaffold, &store);
        engine.initialize().await.unwrap();

        let output = engine.process("status").await.unwrap();
        assert_eq!(output, "ok");
        assert_eq!(engine.status().verification_counter, 0);
    }

    #[tokio::test]
    async fn force_from_verification_releases_once() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::Verification, 0, &[(SKY_INPUT, SKY_OUTPUT)]))
            .await
            .unwrap();
        let mut engine = engine_with(basic_config(), &scaffold, &store);
        engine.initialize().await.unwrap();

        assert_eq!(engine.force_next_phase().await.unwrap(), Phase::Independent);
        assert_eq!(engine.force_next_phase().await.unwrap(), Phase::Independent);
        assert_eq!(MockScaffold::count(&scaffold.released), 1);

        engine.process(SKY_INPUT).await.unwrap();
        assert_eq!(MockScaffold::count(&scaffold.generated), 0);
    }

    #[tokio::test]
    async fn force_from_initialization_initializes() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let mut engine = engine_with(EngineConfig::default(), &scaffold, &store);
        assert_eq!(engine.force_next_phase().await.unwrap(), Phase::Scaffolding);
        assert_eq!(MockScaffold::count(&scaffold.initialized), 1);
    }

    #[tokio::test]
    async fn generation_failure_falls_back_while_scaffold_active() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::Verification, 4, &[]))
            .await
            .unwrap();
        let mut engine = engine_with(basic_config(), &scaffold, &store);
        engine.initialize().await.unwrap();

        let output = engine.process("anything").await.unwrap();
        assert!(output.starts_with("You asked about anything."));
        let status = engine.status();
        assert_eq!(status.verification_counter, 0);
        assert_eq!(status.health.unhealed_faults, 1);
        assert_eq!(status.health.areas[&HealthArea::GenerationQuality], 95.0);
        assert!(status.incentives.total < 0.0);

        engine.force_next_phase().await.unwrap();
        let error = engine.process("anything").await.unwrap_err();
        assert!(matches!(
            error,
            Error::Processing(ProcessingError::Generation {
                phase: Phase::Independent,
                source: GenerationError::EmptyKnowledge,
            })
        ));
    }

    #[tokio::test]
    async fn phases_only_advance() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let config = EngineConfig {
            self_emulation_threshold: 3,
            verification_knowledge_threshold: 3,
            emulation_parity_ratio: 0.0,
            verification_quality_threshold: 0.0,
            verification_required: 2,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, &scaffold, &store);
        engine.initialize().await.unwrap();

        let mut phases = vec![engine.phase()];
        for index in 0..12 {
            engine.process(&format!("question {index} about gardens")).await.unwrap();
            phases.push(engine.phase());
        }
        assert!(phases.windows(2).all(|pair| pair[0] <= pair[1]), "{phases:?}");
        assert_eq!(engine.phase(), Phase::Independent);
        assert_eq!(MockScaffold::count(&scaffold.released), 1);

        let targets: Vec<_> = engine
            .transition_history()
            .into_iter()
            .map(|transition| transition.to)
            .collect();
        assert_eq!(
            targets,
            vec![
                Phase::Scaffolding,
                Phase::SelfEmulation,
                Phase::Verification,
                Phase::Independent
            ]
        );
    }

    #[tokio::test]
    async fn iteration_limit_forces_independence() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let config = EngineConfig {
            max_iterations: 3,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, &scaffold, &store);
        engine.initialize().await.unwrap();
        for index in 0..3 {
            engine.process(&format!("input {index}")).await.unwrap();
        }
        assert_eq!(engine.phase(), Phase::Independent);
        assert!(!engine.status().scaffold_active);
        assert_eq!(MockScaffold::count(&scaffold.released), 1);

        // Graph knowledge from scaffolding keeps answering on its own.
        let generated = MockScaffold::count(&scaffold.generated);
        engine.process("input 1").await.unwrap();
        assert_eq!(MockScaffold::count(&scaffold.generated), generated);
        assert!(!engine.live_candidates().is_empty());
    }

    #[tokio::test]
    async fn snapshot_round_trip_drops_live_candidates() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let config = EngineConfig {
            self_emulation_threshold: 5,
            ..EngineConfig::default()
        };

        let mut first = engine_with(config.clone(), &scaffold, &store);
        first.initialize().await.unwrap();
        for index in 0..10 {
            first.process(&format!("tell me about rivers {index}")).await.unwrap();
        }
        assert_eq!(first.phase(), Phase::SelfEmulation);
        assert!(!first.live_candidates().is_empty());
        let before = first.status();

        let mut second = engine_with(config, &scaffold, &store);
        second.initialize().await.unwrap();
        let after = second.status();
        assert_eq!(after.phase, before.phase);
        assert_eq!(after.iterations, 10);
        assert_eq!(after.knowledge_size, before.knowledge_size);
        for (restored, original) in after
            .personality_vector
            .iter()
            .zip(&before.personality_vector)
        {
            assert!((restored - original).abs() < 1e-9);
        }
        assert!(second.live_candidates().is_empty());
        assert_eq!(after.live_candidates, 0);
    }

    #[tokio::test]
    async fn terminal_snapshot_keeps_scaffold_released() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::Independent, 0, &[(SKY_INPUT, SKY_OUTPUT)]))
            .await
            .unwrap();
        let mut engine = engine_with(basic_config(), &scaffold, &store);
        engine.initialize().await.unwrap();

        assert_eq!(engine.phase(), Phase::Independent);
        assert!(!engine.status().scaffold_active);
        assert_eq!(MockScaffold::count(&scaffold.initialized), 0);
        assert_eq!(engine.process(SKY_INPUT).await.unwrap(), SKY_OUTPUT);
    }

    #[tokio::test]
    async fn reset_clears_store_and_restarts() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let mut engine = engine_with(EngineConfig::default(), &scaffold, &store);
        engine.initialize().await.unwrap();
        for index in 0..10 {
            engine.process(&format!("item {index}")).await.unwrap();
        }
        assert!(!store.is_empty().await);

        engine.reset().await.unwrap();
        let status = engine.status();
        assert_eq!(status.phase, Phase::Scaffolding);
        assert_eq!(status.iterations, 0);
        assert_eq!(status.knowledge_size, 0);
        assert!(status.scaffold_active);
    }

    #[tokio::test]
    async fn mismatched_snapshot_variant_starts_fresh() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::Verification, 3, &[(SKY_INPUT, SKY_OUTPUT)]))
            .await
            .unwrap();
        let mut engine = engine_with(EngineConfig::default(), &scaffold, &store);
        engine.initialize().await.unwrap();
        assert_eq!(engine.phase(), Phase::Scaffolding);
        assert_eq!(engine.status().knowledge_size, 0);
    }

    #[tokio::test]
    async fn restoring_earlier_phase_brings_scaffold_back() {
        let scaffold = Arc::new(MockScaffold::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let mut engine = engine_with(basic_config(), &scaffold, &store);
        engine.initialize().await.unwrap();
        let early = engine.snapshot();

        for _ in 0..3 {
            engine.force_next_phase().await.unwrap();
        }
        assert_eq!(engine.phase(), Phase::Independent);
        assert!(!engine.status().scaffold_active);

        engine.restore(early).await.unwrap();
        assert_eq!(engine.phase(), Phase::Scaffolding);
        assert!(engine.status().scaffold_active);
        assert_eq!(MockScaffold::count(&scaffold.initialized), 2);

        let output = engine.process("hello").await.unwrap();
        assert!(output.starts_with("You asked about hello."));
        assert_eq!(engine.status().knowledge_size, 1);
    }

    /// Config where one exemplar is enough knowledge for Verification, so
    /// only the parity ratio gates the move.
    fn parity_gated_config() -> EngineConfig {
        EngineConfig {
            self_emulation_threshold: 1,
            verification_knowledge_threshold: 1,
            ..basic_config()
        }
    }

    #[tokio::test]
    async fn stronger_scaffold_answer_is_learned() {
        let scaffold = Arc::new(MockScaffold {
            reply: Some(
                "Status reports matter because they show progress. Therefore every team should share a status update each week.",
            ),
            ..MockScaffold::default()
        });
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::SelfEmulation, 0, &[("status", "ok")]))
            .await
            .unwrap();
        let mut engine = engine_with(parity_gated_config(), &scaffold, &store);
        engine.initialize().await.unwrap();
        let before = engine.status();

        engine.process("status").await.unwrap();
        let after = engine.status();
        assert_eq!(after.knowledge_size, before.knowledge_size + 1);
        assert_ne!(after.personality_vector, before.personality_vector);
        assert_eq!(after.phase, Phase::SelfEmulation, "parity stays below 0.8");
        assert_eq!(MockScaffold::count(&scaffold.generated), 1);
    }

    #[tokio::test]
    async fn stronger_internal_answer_is_not_relearned() {
        let scaffold = Arc::new(MockScaffold {
            reply: Some("ok."),
            ..MockScaffold::default()
        });
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(&basic_snapshot(Phase::SelfEmulation, 0, &[(SKY_INPUT, SKY_OUTPUT)]))
            .await
            .unwrap();
        let mut engine = engine_with(parity_gated_config(), &scaffold, &store);
        engine.initialize().await.unwrap();
        let before = engine.status();

        engine.process(SKY_INPUT).await.unwrap();
        let after = engine.status();
        assert_eq!(after.knowledge_size, before.knowledge_size);
        assert_eq!(after.personality_vector, before.personality_vector);
        assert_eq!(after.phase, Phase::Verification);
        assert!(after.incentives.total > 0.0);
    }

    #[tokio::test]
    async fn persistence_failures_are_logged_as_faults() {
        let scaffold = Arc::new(MockScaffold::default());
        let mut engine = Engine::new(
            seeded(EngineConfig::default()),
            scaffold.clone(),
            Providers::none(),
            Arc::new(FailingStore),
        )
        .unwrap();
        engine.initialize().await.unwrap();
        assert_eq!(engine.phase(), Phase::Scaffolding);

        let health = engine.status().health;
        assert_eq!(health.logged_faults, 2);
        assert_eq!(health.areas[&HealthArea::PersistenceReliability], 80.0);

        assert!(matches!(engine.checkpoint().await, Err(Error::Persistence(_))));
        engine.process("still works").await.unwrap();
    }

    #[test]
    fn blend_keeps_sentence_order() {
        let internal = "I one. I two. I three.";
        let scaffold = "S one. S two.";

        let mut all_internal = ScriptedRandom::new(vec![0.0]);
        assert_eq!(blend(internal, scaffold, 0.8, &mut all_internal), internal);

        let mut all_scaffold = ScriptedRandom::new(vec![0.9]);
        assert_eq!(
            blend(internal, scaffold, 0.8, &mut all_scaffold),
            "S one. S two. I three."
        );

        let mut alternating = ScriptedRandom::new(vec![0.1, 0.9, 0.1]);
        assert_eq!(
            blend(internal, scaffold, 0.5, &mut alternating),
            "I one. S two. I three."
        );
    }

    #[test]
    fn blend_of_empty_outputs_is_scaffold_text() {
        let mut rng = ScriptedRandom::new(vec![0.0]);
        assert_eq!(blend("", "...", 0.5, &mut rng), "...");
    }
}
