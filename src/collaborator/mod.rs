//! # Collaborator Contracts
//!
//! The core coordinates three independent subsystems, each owning its own
//! internal state and algorithms: the memory mesh, the genome engine and the
//! interpreter. This module defines the contracts the core consumes; the
//! subsystem internals live behind them and can be substituted with test
//! doubles.
//!
//! ## Capability Set
//!
//! Every collaborator exposes the same lifecycle capability set through the
//! [`Collaborator`] trait:
//!
//! - `initialize` / `shutdown`: lifecycle bracketing, driven by the core in
//!   a fixed order (memory, genome, interpreter)
//! - `export_state` / `import_state`: opaque state blobs for the snapshot
//!   and restore paths; the core never interprets their contents
//! - `stats`: a self-describing stats record aggregated into the core's own
//!   statistics
//!
//! Domain operations are declared on the per-collaborator traits
//! ([`MemoryMesh`], [`GenomeEngine`], [`Interpreter`]), each of which
//! requires the capability set.

pub mod evolution;
pub mod interpretation;
pub mod memory;

pub use evolution::{EvolutionError, EvolutionOutcome, GenomeEngine};
pub use interpretation::{AnalysisSubject, Interpretation, InterpretationError, Interpreter};
pub use memory::{MemoryError, MemoryMesh, MemoryNode, NodeId};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Lifecycle capability set shared by all collaborators.
///
/// State blobs and stats records are opaque to the core; they are produced
/// and consumed only by the collaborator that owns them.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Prepares the collaborator for use. Called by the core before any
    /// domain operation is issued.
    async fn initialize(&self) -> CollaboratorResult<()>;

    /// Exports the collaborator's internal state as an opaque blob.
    async fn export_state(&self) -> CollaboratorResult<Value>;

    /// Reconstructs the collaborator's internal state from a blob produced
    /// by [`Collaborator::export_state`].
    async fn import_state(&self, blob: Value) -> CollaboratorResult<()>;

    /// Returns the collaborator's own stats record.
    async fn stats(&self) -> Value;

    /// Releases the collaborator's resources.
    async fn shutdown(&self) -> CollaboratorResult<()>;
}

/// Umbrella over the per-collaborator error types, used wherever the core
/// wraps a failing collaborator call as the cause of an operation failure.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("memory mesh error: {0}")]
    Memory(#[from] MemoryError),

    #[error("genome engine error: {0}")]
    Genome(#[from] EvolutionError),

    #[error("interpreter error: {0}")]
    Interpretation(#[from] InterpretationError),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
