//! Genome engine contract: a population-based optimizer that evolves
//! candidates against input data, accepts fitness feedback and ranks
//! candidate sets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::interpretation::Interpretation;
use super::memory::MemoryNode;
use super::Collaborator;

/// Result of one evolution cycle: the fittest individual and its score.
/// The representation of an individual is owned by the engine and opaque to
/// the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionOutcome {
    pub best_individual: Value,
    pub fitness: f64,
}

/// Contract of the evolution collaborator.
#[async_trait]
pub trait GenomeEngine: Collaborator {
    /// Runs one evolution cycle against the given data and reports the best
    /// individual.
    async fn evolve(&self, data: Value) -> Result<EvolutionOutcome, EvolutionError>;

    /// Feeds an interpretation confidence back into the population as a
    /// fitness signal. Best-effort from the core's perspective.
    async fn update_fitness(&self, confidence: f64) -> Result<(), EvolutionError>;

    /// Ranks candidate nodes against a query interpretation, most relevant
    /// first.
    async fn select_best(
        &self,
        candidates: Vec<MemoryNode>,
        interpretation: &Interpretation,
    ) -> Result<Vec<MemoryNode>, EvolutionError>;
}

#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("genome engine initialization failed: {0}")]
    Init(String),

    #[error("evolution cycle failed: {0}")]
    Evolution(String),

    #[error("fitness update failed: {0}")]
    Fitness(String),

    #[error("candidate ranking failed: {0}")]
    Ranking(String),

    #[error("genome state serialization failed: {0}")]
    Serialization(String),

    #[error("genome engine shutdown failed: {0}")]
    Shutdown(String),
}
