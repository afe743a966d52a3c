//! End-to-end tests of the orchestration core against scripted
//! collaborator doubles that record every call they receive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_stream::StreamExt;

use luca_core::{
    AnalysisSubject, Collaborator, CollaboratorResult, CoreConfig, CoreError, EvolutionError,
    EvolutionOutcome, GenomeEngine, Interpretation, InterpretationError, Interpreter, LucaCore,
    MemoryError, MemoryMesh, MemoryNode, NodeId, PipelineStage,
};

/// Memory double: mints sequential node ids and records links and imports.
#[derive(Default)]
struct StubMemory {
    added: AtomicUsize,
    searches: AtomicUsize,
    links: Mutex<Vec<(NodeId, Vec<String>)>>,
    search_results: Mutex<Vec<MemoryNode>>,
    imported: Mutex<Option<Value>>,
}

#[async_trait]
impl Collaborator for StubMemory {
    async fn initialize(&self) -> CollaboratorResult<()> {
        Ok(())
    }

    async fn export_state(&self) -> CollaboratorResult<Value> {
        Ok(json!({"mesh": "export"}))
    }

    async fn import_state(&self, blob: Value) -> CollaboratorResult<()> {
        *self.imported.lock().unwrap() = Some(blob);
        Ok(())
    }

    async fn stats(&self) -> Value {
        json!({"nodes": self.added.load(Ordering::SeqCst)})
    }

    async fn shutdown(&self) -> CollaboratorResult<()> {
        Ok(())
    }
}

#[async_trait]
impl MemoryMesh for StubMemory {
    async fn add_node(&self, payload: Value) -> Result<MemoryNode, MemoryError> {
        let n = self.added.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MemoryNode {
            id: NodeId::new(format!("node-{n}")),
            payload,
        })
    }

    async fn link_nodes(&self, id: &NodeId, concepts: &[String]) -> Result<(), MemoryError> {
        self.links
            .lock()
            .unwrap()
            .push((id.clone(), concepts.to_vec()));
        Ok(())
    }

    async fn search(&self, _query: &str) -> Result<Vec<MemoryNode>, MemoryError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_results.lock().unwrap().clone())
    }
}

/// Genome double: echoes the input back as the best individual and can be
/// scripted to fail at a specific evolve call.
#[derive(Default)]
struct StubGenome {
    evolved: AtomicUsize,
    fail_evolve_at: Option<usize>,
    fitness_updates: Mutex<Vec<f64>>,
    imported: Mutex<Option<Value>>,
}

#[async_trait]
impl Collaborator for StubGenome {
    async fn initialize(&self) -> CollaboratorResult<()> {
        Ok(())
    }

    async fn export_state(&self) -> CollaboratorResult<Value> {
        Ok(json!({"population": "export"}))
    }

    async fn import_state(&self, blob: Value) -> CollaboratorResult<()> {
        *self.imported.lock().unwrap() = Some(blob);
        Ok(())
    }

    async fn stats(&self) -> Value {
        json!({"evolved": self.evolved.load(Ordering::SeqCst)})
    }

    async fn shutdown(&self) -> CollaboratorResult<()> {
        Ok(())
    }
}

#[async_trait]
impl GenomeEngine for StubGenome {
    async fn evolve(&self, data: Value) -> Result<EvolutionOutcome, EvolutionError> {
        let n = self.evolved.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_evolve_at == Some(n) {
            return Err(EvolutionError::Evolution("population collapsed".into()));
        }
        Ok(EvolutionOutcome {
            best_individual: data,
            fitness: 0.8,
        })
    }

    async fn update_fitness(&self, confidence: f64) -> Result<(), EvolutionError> {
        self.fitness_updates.lock().unwrap().push(confidence);
        Ok(())
    }

    async fn select_best(
        &self,
        mut candidates: Vec<MemoryNode>,
        _interpretation: &Interpretation,
    ) -> Result<Vec<MemoryNode>, EvolutionError> {
        // Deterministic, observable ranking for assertions.
        candidates.reverse();
        Ok(candidates)
    }
}

/// Interpreter double: pops scripted confidences, falling back to 0.9.
#[derive(Default)]
struct StubInterpreter {
    analyzed: AtomicUsize,
    confidences: Mutex<VecDeque<f64>>,
    imported: Mutex<Option<Value>>,
}

impl StubInterpreter {
    fn scripted(confidences: &[f64]) -> Self {
        Self {
            confidences: Mutex::new(confidences.iter().copied().collect()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Collaborator for StubInterpreter {
    async fn initialize(&self) -> CollaboratorResult<()> {
        Ok(())
    }

    async fn export_state(&self) -> CollaboratorResult<Value> {
        Ok(json!({"model": "export"}))
    }

    async fn import_state(&self, blob: Value) -> CollaboratorResult<()> {
        *self.imported.lock().unwrap() = Some(blob);
        Ok(())
    }

    async fn stats(&self) -> Value {
        json!({"analyzed": self.analyzed.load(Ordering::SeqCst)})
    }

    async fn shutdown(&self) -> CollaboratorResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Interpreter for StubInterpreter {
    async fn analyze(
        &self,
        _subject: AnalysisSubject,
    ) -> Result<Interpretation, InterpretationError> {
        self.analyzed.fetch_add(1, Ordering::SeqCst);
        let confidence = self
            .confidences
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(0.9);
        Ok(Interpretation {
            confidence,
            related_concepts: vec!["ancestry".into(), "adaptation".into()],
        })
    }
}

fn core_with(
    memory: Arc<StubMemory>,
    genome: Arc<StubGenome>,
    interpreter: Arc<StubInterpreter>,
) -> LucaCore {
    LucaCore::new(CoreConfig::default(), memory, genome, interpreter).unwrap()
}

fn items(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({"sample": i})).collect()
}

#[tokio::test]
async fn test_learn_links_only_successful_results() {
    let memory = Arc::new(StubMemory::default());
    let genome = Arc::new(StubGenome::default());
    // Threshold is 0.7: items 1 and 3 succeed, item 2 does not.
    let interpreter = Arc::new(StubInterpreter::scripted(&[0.85, 0.5, 0.9]));
    let core = core_with(memory.clone(), genome.clone(), interpreter.clone());
    core.initialize().await.unwrap();

    let mut learning = core.learn(tokio_stream::iter(items(3))).unwrap();
    let mut results = Vec::new();
    while let Some(result) = learning.next().await {
        results.push(result.unwrap());
    }

    let successes: Vec<bool> = results.iter().map(|r| r.success).collect();
    assert_eq!(successes, vec![true, false, true]);

    // Linking happens exactly once per successful result, with that
    // result's node id; never for a failed interpretation.
    let links = memory.links.lock().unwrap().clone();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].0, NodeId::new("node-1"));
    assert_eq!(links[1].0, NodeId::new("node-3"));
    assert_eq!(links[0].1, vec!["ancestry", "adaptation"]);

    // Fitness feedback is unconditional, once per processed item.
    let updates = genome.fitness_updates.lock().unwrap().clone();
    assert_eq!(updates, vec![0.85, 0.5, 0.9]);

    let stats = core.stats().await;
    assert!(stats.initialized);
    assert!(!stats.learning);
    assert_eq!(stats.total_processed, 3);
    assert!(stats.last_update.is_some());
}

#[tokio::test]
async fn test_learn_aborts_on_pipeline_failure() {
    let memory = Arc::new(StubMemory::default());
    let genome = Arc::new(StubGenome {
        fail_evolve_at: Some(2),
        ..Default::default()
    });
    let interpreter = Arc::new(StubInterpreter::default());
    let core = core_with(memory.clone(), genome.clone(), interpreter.clone());
    core.initialize().await.unwrap();

    let mut learning = core.learn(tokio_stream::iter(items(3))).unwrap();

    let first = learning.next().await.unwrap();
    assert!(first.is_ok());

    let second = learning.next().await.unwrap();
    assert!(matches!(
        second,
        Err(CoreError::Processing {
            stage: PipelineStage::GenomeEvolution,
            ..
        })
    ));

    // The cycle is over: item 3 is never reached.
    assert!(learning.next().await.is_none());
    assert_eq!(genome.evolved.load(Ordering::SeqCst), 2);

    let stats = core.stats().await;
    assert!(!stats.learning);
    assert_eq!(stats.total_processed, 1);
}

#[tokio::test]
async fn test_learn_rejects_concurrent_cycle() {
    let core = core_with(
        Arc::new(StubMemory::default()),
        Arc::new(StubGenome::default()),
        Arc::new(StubInterpreter::default()),
    );
    core.initialize().await.unwrap();

    let first = core.learn(tokio_stream::iter(items(1))).unwrap();
    assert!(core.stats().await.learning);

    let err = core.learn(tokio_stream::iter(items(1))).err().unwrap();
    assert!(matches!(err, CoreError::AlreadyLearning));

    // Dropping the first cycle releases the flag and allows a new one.
    drop(first);
    assert!(!core.stats().await.learning);
    assert!(core.learn(tokio_stream::iter(items(1))).is_ok());
}

#[tokio::test]
async fn test_learn_cancellation_releases_flag() {
    let memory = Arc::new(StubMemory::default());
    let genome = Arc::new(StubGenome::default());
    let interpreter = Arc::new(StubInterpreter::default());
    let core = core_with(memory.clone(), genome.clone(), interpreter.clone());
    core.initialize().await.unwrap();

    let mut learning = core.learn(tokio_stream::iter(items(5))).unwrap();
    learning.next().await.unwrap().unwrap();
    learning.next().await.unwrap().unwrap();
    drop(learning);

    let stats = core.stats().await;
    assert!(!stats.learning);
    assert_eq!(stats.total_processed, 2);
    // The loop never ran ahead of its consumer.
    assert_eq!(genome.evolved.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_learn_requires_initialized_core() {
    let core = core_with(
        Arc::new(StubMemory::default()),
        Arc::new(StubGenome::default()),
        Arc::new(StubInterpreter::default()),
    );
    let err = core.learn(tokio_stream::iter(items(1))).err().unwrap();
    assert!(matches!(err, CoreError::NotInitialized));
}

#[tokio::test]
async fn test_stale_stream_drop_keeps_active_cycle_flag() {
    let core = core_with(
        Arc::new(StubMemory::default()),
        Arc::new(StubGenome::default()),
        Arc::new(StubInterpreter::default()),
    );
    core.initialize().await.unwrap();

    let stale = core.learn(tokio_stream::iter(items(3))).unwrap();
    core.shutdown().await.unwrap();
    core.initialize().await.unwrap();

    let active = core.learn(tokio_stream::iter(items(3))).unwrap();
    assert!(core.stats().await.learning);

    // A cycle that predates the shutdown no longer owns the flag; the
    // active cycle keeps it and a third cycle is still rejected.
    drop(stale);
    assert!(core.stats().await.learning);
    let err = core.learn(tokio_stream::iter(items(1))).err().unwrap();
    assert!(matches!(err, CoreError::AlreadyLearning));

    drop(active);
    assert!(!core.stats().await.learning);
}

#[tokio::test]
async fn test_stale_stream_ends_after_restart() {
    let memory = Arc::new(StubMemory::default());
    let genome = Arc::new(StubGenome::default());
    let interpreter = Arc::new(StubInterpreter::default());
    let core = core_with(memory.clone(), genome.clone(), interpreter.clone());
    core.initialize().await.unwrap();

    let mut stale = core.learn(tokio_stream::iter(items(3))).unwrap();
    stale.next().await.unwrap().unwrap();

    core.shutdown().await.unwrap();
    core.initialize().await.unwrap();

    // The rebuilt core is not driven by the pre-shutdown cycle, and the
    // cycle does not reacquire the learning flag.
    assert!(stale.next().await.is_none());
    assert_eq!(genome.evolved.load(Ordering::SeqCst), 1);
    assert!(!core.stats().await.learning);
}

#[tokio::test]
async fn test_shutdown_forces_learning_off() {
    let core = core_with(
        Arc::new(StubMemory::default()),
        Arc::new(StubGenome::default()),
        Arc::new(StubInterpreter::default()),
    );
    core.initialize().await.unwrap();

    let learning = core.learn(tokio_stream::iter(items(3))).unwrap();
    assert!(core.stats().await.learning);

    core.shutdown().await.unwrap();

    let stats = core.stats().await;
    assert!(!stats.initialized);
    assert!(!stats.learning);

    let err = core.process(json!({"x": 1})).await.unwrap_err();
    assert!(matches!(err, CoreError::NotInitialized));
    drop(learning);
}

#[tokio::test]
async fn test_query_issues_one_search_and_one_analysis() {
    let memory = Arc::new(StubMemory::default());
    let genome = Arc::new(StubGenome::default());
    let interpreter = Arc::new(StubInterpreter::scripted(&[0.42]));
    let core = core_with(memory.clone(), genome.clone(), interpreter.clone());
    core.initialize().await.unwrap();

    *memory.search_results.lock().unwrap() = vec![
        MemoryNode {
            id: NodeId::new("a"),
            payload: json!({}),
        },
        MemoryNode {
            id: NodeId::new("b"),
            payload: json!({}),
        },
        MemoryNode {
            id: NodeId::new("c"),
            payload: json!({}),
        },
    ];

    let result = core.query("common ancestor").await.unwrap();

    assert_eq!(memory.searches.load(Ordering::SeqCst), 1);
    assert_eq!(interpreter.analyzed.load(Ordering::SeqCst), 1);

    // Ranking order is exactly what the genome engine produced.
    let order: Vec<&str> = result.results.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(order, vec!["c", "b", "a"]);
    assert_eq!(result.query, "common ancestor");
    assert_eq!(result.confidence, 0.42);
}

#[tokio::test]
async fn test_snapshot_restore_roundtrip() {
    let core = core_with(
        Arc::new(StubMemory::default()),
        Arc::new(StubGenome::default()),
        Arc::new(StubInterpreter::default()),
    );
    core.initialize().await.unwrap();
    core.process(json!({"sample": 1})).await.unwrap();
    core.process(json!({"sample": 2})).await.unwrap();

    let snapshot = core.snapshot().await.unwrap();
    assert_eq!(snapshot.stats.total_processed, 2);
    assert_eq!(snapshot.memory_state, json!({"mesh": "export"}));

    // A fresh core picks the state up from the snapshot alone.
    let memory = Arc::new(StubMemory::default());
    let genome = Arc::new(StubGenome::default());
    let interpreter = Arc::new(StubInterpreter::default());
    let restored = core_with(memory.clone(), genome.clone(), interpreter.clone());
    restored.restore(snapshot).await.unwrap();

    assert_eq!(
        memory.imported.lock().unwrap().clone(),
        Some(json!({"mesh": "export"}))
    );
    assert_eq!(
        genome.imported.lock().unwrap().clone(),
        Some(json!({"population": "export"}))
    );
    assert_eq!(
        interpreter.imported.lock().unwrap().clone(),
        Some(json!({"model": "export"}))
    );

    let stats = restored.stats().await;
    assert!(stats.initialized);
    assert_eq!(stats.total_processed, 2);

    // The restored core processes normally.
    restored.process(json!({"sample": 3})).await.unwrap();
    assert_eq!(restored.stats().await.total_processed, 3);
}

#[tokio::test]
async fn test_process_counts_only_successful_calls() {
    let genome = Arc::new(StubGenome {
        fail_evolve_at: Some(2),
        ..Default::default()
    });
    let core = core_with(
        Arc::new(StubMemory::default()),
        genome,
        Arc::new(StubInterpreter::default()),
    );
    core.initialize().await.unwrap();

    core.process(json!({"sample": 1})).await.unwrap();
    assert!(core.process(json!({"sample": 2})).await.is_err());
    core.process(json!({"sample": 3})).await.unwrap();

    assert_eq!(core.stats().await.total_processed, 2);
}
