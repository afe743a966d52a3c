//! # Core Orchestrator
//!
//! `LucaCore` coordinates the three collaborators into a single processing
//! pipeline: ingest data into the memory mesh, evolve a candidate solution
//! with the genome engine, interpret the result, and link successful
//! interpretations back into memory.
//!
//! ## Operations
//!
//! - [`LucaCore::initialize`] / [`LucaCore::shutdown`]: lifecycle
//!   bracketing over all three collaborators, in a fixed order
//! - [`LucaCore::process`]: the single-item pipeline
//!   (store -> evolve -> interpret -> aggregate)
//! - [`LucaCore::learn`]: a lazy, cancellable stream driving `process`
//!   over a data stream, feeding results back into memory and the genome
//! - [`LucaCore::query`]: ranked retrieval fanning out to memory search
//!   and query interpretation, ranked by the genome engine
//! - [`LucaCore::snapshot`] / [`LucaCore::restore`]: state aggregation for
//!   a caller-supplied persistence mechanism
//!
//! ## Concurrency
//!
//! The lifecycle record is the single shared mutable value; it sits behind
//! one lock that is never held across an await. Collaborator calls are the
//! only suspension points. Within one operation, calls are issued
//! concurrently only where no data dependency exists (the two fan-out legs
//! of `query`); the `process` pipeline is strictly sequential.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::stream::Stream;
use futures::{stream, try_join};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::collaborator::{
    AnalysisSubject, Collaborator, CollaboratorError, EvolutionOutcome, GenomeEngine,
    Interpretation, Interpreter, MemoryMesh, MemoryNode, NodeId,
};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, PipelineStage};
use crate::state::{LifecycleStage, LifecycleState};

/// Outcome of a single `process` call. Immutable once returned; the core
/// retains nothing of it beyond the lifecycle counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub memory_node_id: NodeId,
    pub genome_result: EvolutionOutcome,
    pub interpretation: Interpretation,
    pub timestamp: DateTime<Utc>,
    /// Derived: `interpretation.confidence >= interpretation_threshold`.
    pub success: bool,
}

/// Outcome of a single `query` call. Ephemeral; not persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Echo of the input query.
    pub query: String,
    /// Ranked candidates, most relevant first, in the exact order produced
    /// by the genome engine.
    pub results: Vec<MemoryNode>,
    /// Confidence of interpreting the query itself, not of any candidate.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated statistics: the core's own lifecycle counters plus each
/// collaborator's opaque stats record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    pub initialized: bool,
    pub learning: bool,
    pub total_processed: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub memory: Value,
    pub genome: Value,
    pub interpreter: Value,
}

/// Aggregate state record produced by `snapshot` and consumed by
/// `restore`. The sub-states are opaque blobs owned by their collaborators;
/// the core is pure pass-through. Persistence of the record is the
/// caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotState {
    pub config: CoreConfig,
    pub stats: SystemStats,
    pub memory_state: Value,
    pub genome_state: Value,
    pub interpreter_state: Value,
    pub saved_at: DateTime<Utc>,
}

/// The orchestration core.
///
/// Holds the immutable configuration, the lifecycle record and one
/// reference to each collaborator. Cloning is cheap and shares all of
/// them.
#[derive(Clone)]
pub struct LucaCore {
    config: Arc<CoreConfig>,
    memory: Arc<dyn MemoryMesh>,
    genome: Arc<dyn GenomeEngine>,
    interpreter: Arc<dyn Interpreter>,
    state: Arc<Mutex<LifecycleState>>,
}

impl LucaCore {
    /// Creates a core over the given collaborators. The configuration is
    /// validated here and is immutable afterwards.
    pub fn new(
        config: CoreConfig,
        memory: Arc<dyn MemoryMesh>,
        genome: Arc<dyn GenomeEngine>,
        interpreter: Arc<dyn Interpreter>,
    ) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            memory,
            genome,
            interpreter,
            state: Arc::new(Mutex::new(LifecycleState::new())),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // The lock is never held across an await.
    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().expect("lifecycle state lock poisoned")
    }

    fn ensure_ready(&self) -> CoreResult<()> {
        if self.lock_state().stage != LifecycleStage::Ready {
            return Err(CoreError::NotInitialized);
        }
        Ok(())
    }

    /// Initializes the collaborators in order: memory mesh, genome engine,
    /// interpreter. Later stages may assume earlier ones are ready.
    ///
    /// Valid only from `Uninitialized`; a second call without an
    /// intervening shutdown is rejected. On any collaborator failure the
    /// core stays `Uninitialized` and nothing is retained as ready.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> CoreResult<()> {
        {
            let mut state = self.lock_state();
            if state.stage == LifecycleStage::Ready {
                return Err(CoreError::AlreadyInitialized);
            }
            state.transition_to(LifecycleStage::Initializing)?;
        }
        info!("initializing core");

        if let Err(e) = self.initialize_collaborators().await {
            self.lock_state().reset();
            return Err(CoreError::Initialization(e));
        }

        let mut state = self.lock_state();
        state.transition_to(LifecycleStage::Ready)?;
        state.stamp();
        info!("core ready");
        Ok(())
    }

    async fn initialize_collaborators(&self) -> Result<(), CollaboratorError> {
        self.memory.initialize().await?;
        debug!("memory mesh initialized");
        self.genome.initialize().await?;
        debug!("genome engine initialized");
        self.interpreter.initialize().await?;
        debug!("interpreter initialized");
        Ok(())
    }

    /// Runs one item through the pipeline: store, evolve, interpret,
    /// aggregate.
    ///
    /// Exactly one memory node is created per call regardless of the
    /// success flag; no linking happens here (linking belongs to the
    /// learning loop). The first failing collaborator call aborts the
    /// pipeline and leaves `total_processed` untouched.
    #[instrument(skip(self, data))]
    pub async fn process(&self, data: Value) -> CoreResult<ProcessResult> {
        self.ensure_ready()?;

        let node = self
            .memory
            .add_node(data.clone())
            .await
            .map_err(|e| CoreError::Processing {
                stage: PipelineStage::MemoryStorage,
                source: e.into(),
            })?;
        debug!(node_id = %node.id, "memory node created");

        let genome_result = self
            .genome
            .evolve(data)
            .await
            .map_err(|e| CoreError::Processing {
                stage: PipelineStage::GenomeEvolution,
                source: e.into(),
            })?;
        debug!(fitness = genome_result.fitness, "genome evolution complete");

        let interpretation = self
            .interpreter
            .analyze(AnalysisSubject::Individual(
                genome_result.best_individual.clone(),
            ))
            .await
            .map_err(|e| CoreError::Processing {
                stage: PipelineStage::Interpretation,
                source: e.into(),
            })?;
        debug!(
            confidence = interpretation.confidence,
            "interpretation complete"
        );

        let success = interpretation.confidence >= self.config.interpretation_threshold;
        let timestamp = Utc::now();
        {
            let mut state = self.lock_state();
            state.total_processed += 1;
            state.last_update = Some(timestamp);
        }

        Ok(ProcessResult {
            memory_node_id: node.id,
            genome_result,
            interpretation,
            timestamp,
            success,
        })
    }

    /// Starts a learning cycle over a data stream, returning a lazy
    /// sequence of processing results.
    ///
    /// Preconditions are checked here, at call time: the core must be
    /// ready, and at most one learning cycle may exist at a time. The
    /// returned stream performs all work inside `poll_next`, so it is
    /// consumed at the caller's pace and never runs ahead of the consumer.
    ///
    /// Per item: run the pipeline; on success link the stored node to the
    /// interpretation's related concepts (only when the success flag is
    /// set) and feed the confidence back to the genome engine
    /// unconditionally, both best-effort; then yield the result. A
    /// pipeline failure ends the cycle: the error is yielded as the final
    /// item and earlier results stand.
    ///
    /// Dropping the stream is the cancellation signal; the learning flag
    /// is released as soon as the stream is dropped, fails or is
    /// exhausted. A shutdown underneath an outstanding stream makes it
    /// stale: it ends without touching the flag of any cycle started
    /// after the core was re-initialized.
    pub fn learn<S>(&self, data_stream: S) -> CoreResult<LearningStream>
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        let epoch = {
            let mut state = self.lock_state();
            if state.stage != LifecycleStage::Ready {
                return Err(CoreError::NotInitialized);
            }
            if state.learning {
                return Err(CoreError::AlreadyLearning);
            }
            state.learning = true;
            state.epoch
        };
        info!("learning cycle started");

        let cycle = LearnCycle {
            core: self.clone(),
            source: Box::pin(data_stream),
            guard: Some(LearningGuard {
                state: Arc::clone(&self.state),
                epoch,
            }),
            epoch,
            failed: false,
        };
        let inner = stream::unfold(cycle, |mut cycle| async move {
            if cycle.failed {
                return None;
            }
            // A shutdown since the cycle started makes it stale; stop
            // rather than drive items through a rebuilt core.
            if cycle.core.lock_state().epoch != cycle.epoch {
                return None;
            }
            let Some(item) = cycle.source.next().await else {
                return None;
            };
            match cycle.core.learn_step(item).await {
                Ok(result) => Some((Ok(result), cycle)),
                Err(e) => {
                    // Release the learning flag before the error reaches
                    // the caller; earlier yielded results stand.
                    cycle.failed = true;
                    cycle.guard.take();
                    Some((Err(e), cycle))
                }
            }
        });
        Ok(LearningStream {
            inner: Box::pin(inner),
        })
    }

    async fn learn_step(&self, item: Value) -> CoreResult<ProcessResult> {
        let result = self.process(item).await?;

        if result.success {
            if let Err(e) = self
                .memory
                .link_nodes(
                    &result.memory_node_id,
                    &result.interpretation.related_concepts,
                )
                .await
            {
                warn!(node_id = %result.memory_node_id, error = %e, "node linking failed, continuing");
            }
        }

        if let Err(e) = self
            .genome
            .update_fitness(result.interpretation.confidence)
            .await
        {
            warn!(error = %e, "fitness feedback failed, continuing");
        }

        Ok(result)
    }

    /// Ranked retrieval: memory search and query interpretation fan out
    /// concurrently, then the genome engine ranks the combined candidates.
    ///
    /// The returned confidence is the query's own interpretation
    /// confidence, not a per-candidate score. Any failing step aborts the
    /// query; no partial ranking is returned.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str) -> CoreResult<QueryResult> {
        self.ensure_ready()?;

        let search = async {
            self.memory
                .search(query)
                .await
                .map_err(CollaboratorError::from)
        };
        let analyze = async {
            self.interpreter
                .analyze(AnalysisSubject::Query(query.to_string()))
                .await
                .map_err(CollaboratorError::from)
        };
        let (candidates, interpretation) = try_join!(search, analyze).map_err(CoreError::Query)?;
        debug!(
            candidates = candidates.len(),
            confidence = interpretation.confidence,
            "query fan-out complete"
        );

        let results = self
            .genome
            .select_best(candidates, &interpretation)
            .await
            .map_err(|e| CoreError::Query(e.into()))?;

        Ok(QueryResult {
            query: query.to_string(),
            results,
            confidence: interpretation.confidence,
            timestamp: Utc::now(),
        })
    }

    /// Aggregates the core's lifecycle counters with each collaborator's
    /// own stats record.
    pub async fn stats(&self) -> SystemStats {
        let (stage, learning, total_processed, last_update) = {
            let state = self.lock_state();
            (
                state.stage,
                state.learning,
                state.total_processed,
                state.last_update,
            )
        };
        SystemStats {
            initialized: stage == LifecycleStage::Ready,
            learning,
            total_processed,
            last_update,
            memory: self.memory.stats().await,
            genome: self.genome.stats().await,
            interpreter: self.interpreter.stats().await,
        }
    }

    /// Gathers configuration, stats and each collaborator's exported state
    /// into one aggregate record. Nothing is written anywhere; persistence
    /// is the caller's concern.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> CoreResult<SnapshotState> {
        self.ensure_ready()?;

        let stats = self.stats().await;
        let memory_state = self
            .memory
            .export_state()
            .await
            .map_err(CoreError::Snapshot)?;
        let genome_state = self
            .genome
            .export_state()
            .await
            .map_err(CoreError::Snapshot)?;
        let interpreter_state = self
            .interpreter
            .export_state()
            .await
            .map_err(CoreError::Snapshot)?;

        info!("snapshot assembled");
        Ok(SnapshotState {
            config: self.config.as_ref().clone(),
            stats,
            memory_state,
            genome_state,
            interpreter_state,
            saved_at: Utc::now(),
        })
    }

    /// Rebuilds the core from a snapshot: initializes the collaborators in
    /// the usual order, then delegates each sub-state to the owning
    /// collaborator's import routine. Valid only from `Uninitialized`; on
    /// failure the core stays `Uninitialized`.
    #[instrument(skip(self, snapshot))]
    pub async fn restore(&self, snapshot: SnapshotState) -> CoreResult<()> {
        snapshot.config.validate()?;
        {
            let mut state = self.lock_state();
            if state.stage == LifecycleStage::Ready {
                return Err(CoreError::AlreadyInitialized);
            }
            state.transition_to(LifecycleStage::Initializing)?;
        }
        info!("restoring core state");

        let total_processed = snapshot.stats.total_processed;
        if let Err(e) = self.restore_collaborators(snapshot).await {
            self.lock_state().reset();
            return Err(CoreError::Restore(e));
        }

        let mut state = self.lock_state();
        state.transition_to(LifecycleStage::Ready)?;
        state.total_processed = total_processed;
        state.stamp();
        info!("core state restored");
        Ok(())
    }

    async fn restore_collaborators(&self, snapshot: SnapshotState) -> Result<(), CollaboratorError> {
        self.initialize_collaborators().await?;
        self.memory.import_state(snapshot.memory_state).await?;
        self.genome.import_state(snapshot.genome_state).await?;
        self.interpreter
            .import_state(snapshot.interpreter_state)
            .await?;
        Ok(())
    }

    /// Shuts the collaborators down in order: memory mesh, genome engine,
    /// interpreter. Valid from any stage; an active learning cycle is
    /// forced off first.
    ///
    /// A failing collaborator does not stop the remaining shutdowns. The
    /// first error is surfaced to the caller, but the core lands on
    /// `Uninitialized` regardless: the system is defined as unusable after
    /// a failed shutdown attempt.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> CoreResult<()> {
        {
            let mut state = self.lock_state();
            if state.learning {
                warn!("shutting down while a learning cycle is active");
            }
            // Shutdown is permitted from every stage.
            state.learning = false;
            state.stage = LifecycleStage::ShuttingDown;
        }
        info!("shutting down core");

        let mut first_error: Option<CollaboratorError> = None;
        if let Err(e) = self.memory.shutdown().await {
            warn!(error = %e, "memory mesh shutdown failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.genome.shutdown().await {
            warn!(error = %e, "genome engine shutdown failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.interpreter.shutdown().await {
            warn!(error = %e, "interpreter shutdown failed");
            first_error.get_or_insert(e);
        }

        {
            let mut state = self.lock_state();
            state.reset();
            state.stamp();
        }

        match first_error {
            Some(e) => Err(CoreError::Shutdown(e)),
            None => {
                info!("core shutdown complete");
                Ok(())
            }
        }
    }
}

/// Lazy, single-pass learning sequence returned by [`LucaCore::learn`].
///
/// All work happens inside `poll_next`: the next source item is not pulled
/// before the consumer asks for the next result. Dropping the stream is
/// the cancellation signal and releases the learning flag immediately.
pub struct LearningStream {
    inner: Pin<Box<dyn Stream<Item = CoreResult<ProcessResult>> + Send>>,
}

impl Stream for LearningStream {
    type Item = CoreResult<ProcessResult>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct LearnCycle {
    core: LucaCore,
    source: Pin<Box<dyn Stream<Item = Value> + Send>>,
    guard: Option<LearningGuard>,
    epoch: u64,
    failed: bool,
}

/// Releases the learning flag when the cycle ends for any reason:
/// exhaustion, pipeline failure, or the consumer dropping the stream.
///
/// The flag belongs to the epoch the cycle started under. A guard that
/// outlives a shutdown is stale and must not release a newer cycle's
/// flag.
struct LearningGuard {
    state: Arc<Mutex<LifecycleState>>,
    epoch: u64,
}

impl Drop for LearningGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if state.epoch == self.epoch {
                state.learning = false;
                state.stamp();
                info!("learning cycle finished");
            }
        }
    }
}
