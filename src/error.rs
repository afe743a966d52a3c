//! Error taxonomy of the orchestration core.
//!
//! Collaborator failures are never silently swallowed: every operation
//! wraps the first failing collaborator call with its original cause
//! attached. The only exceptions are the two best-effort calls in the
//! learning loop (node linking and fitness feedback), which are logged and
//! never abort the loop.

use strum_macros::Display;
use thiserror::Error;

use crate::collaborator::CollaboratorError;
use crate::config::ConfigError;
use crate::state::LifecycleStage;

/// Pipeline step at which a `process` call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PipelineStage {
    #[strum(serialize = "memory storage")]
    MemoryStorage,
    #[strum(serialize = "genome evolution")]
    GenomeEvolution,
    #[strum(serialize = "interpretation")]
    Interpretation,
}

#[derive(Error, Debug)]
pub enum CoreError {
    /// Precondition violation: the caller must initialize first.
    #[error("core is not initialized")]
    NotInitialized,

    /// A second initialize without an intervening shutdown.
    #[error("core is already initialized")]
    AlreadyInitialized,

    /// Concurrency precondition violation: at most one learning cycle.
    #[error("a learning cycle is already in progress")]
    AlreadyLearning,

    /// A call that is not permitted by the lifecycle transition table.
    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        from: LifecycleStage,
        to: LifecycleStage,
    },

    /// Fatal to the initialize call; the core stays uninitialized.
    #[error("initialization failed: {0}")]
    Initialization(#[source] CollaboratorError),

    /// Aborts a single process call, leaving lifecycle counters untouched.
    #[error("processing failed during {stage}: {source}")]
    Processing {
        stage: PipelineStage,
        #[source]
        source: CollaboratorError,
    },

    /// Aborts a single query; no partial ranking is returned.
    #[error("query failed: {0}")]
    Query(#[source] CollaboratorError),

    /// State export failed while aggregating a snapshot.
    #[error("snapshot failed: {0}")]
    Snapshot(#[source] CollaboratorError),

    /// State restoration failed; the core stays uninitialized.
    #[error("restore failed: {0}")]
    Restore(#[source] CollaboratorError),

    /// Surfaced to the caller, but the core is forced into
    /// `Uninitialized` regardless.
    #[error("shutdown failed: {0}")]
    Shutdown(#[source] CollaboratorError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type CoreResult<T> = Result<T, CoreError>;
