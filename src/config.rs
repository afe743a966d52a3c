//! Configuration for the orchestration core.
//!
//! `CoreConfig` is constructed once at startup, validated, and shared
//! read-only by every operation. The numeric bounds are validated here
//! and meant for whoever constructs the collaborators; the core itself
//! only consults `interpretation_threshold` when deriving the success
//! flag of a processing result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Upper bound on stored nodes, for memory mesh implementations.
    #[serde(default = "default_max_memory_nodes")]
    pub max_memory_nodes: usize,

    /// Population size for genome engine implementations.
    #[serde(default = "default_genome_population_size")]
    pub genome_population_size: usize,

    /// Number of generations per evolution cycle.
    #[serde(default = "default_evolution_generations")]
    pub evolution_generations: usize,

    /// Minimum confidence treated as a successful interpretation.
    #[serde(default = "default_interpretation_threshold")]
    pub interpretation_threshold: f64,
}

fn default_max_memory_nodes() -> usize {
    1000
}

fn default_genome_population_size() -> usize {
    100
}

fn default_evolution_generations() -> usize {
    50
}

fn default_interpretation_threshold() -> f64 {
    0.7
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_memory_nodes: default_max_memory_nodes(),
            genome_population_size: default_genome_population_size(),
            evolution_generations: default_evolution_generations(),
            interpretation_threshold: default_interpretation_threshold(),
        }
    }
}

impl CoreConfig {
    /// Checks the configured bounds before the core accepts the config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_nodes == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_memory_nodes",
            });
        }
        if self.genome_population_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "genome_population_size",
            });
        }
        if self.evolution_generations == 0 {
            return Err(ConfigError::NonPositive {
                field: "evolution_generations",
            });
        }
        if !(0.0..=1.0).contains(&self.interpretation_threshold) {
            return Err(ConfigError::ThresholdOutOfRange {
                value: self.interpretation_threshold,
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NonPositive { field: &'static str },

    #[error("interpretation_threshold must be within [0.0, 1.0], got {value}")]
    ThresholdOutOfRange { value: f64 },
}
