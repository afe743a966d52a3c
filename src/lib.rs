//! # LUCA Core: Adaptive Learning Orchestration
//!
//! `luca-core` coordinates three independent subsystems into a single
//! adaptive processing pipeline:
//!
//! - a bounded node-and-edge **memory mesh** storing opaque data as
//!   addressable, linkable nodes with similarity search
//! - a fitness-driven **genome engine** evolving candidate solutions and
//!   ranking candidate sets
//! - a confidence-scoring **interpreter** mapping candidates or raw
//!   queries into semantic judgments
//!
//! The crate covers only the orchestration layer; the collaborators'
//! internal algorithms live behind the contracts in [`collaborator`] and
//! can be substituted freely, including with test doubles.
//!
//! ## Architecture
//!
//! - Lifecycle state machine ([`state`]): an explicit transition table
//!   over `Uninitialized -> Initializing -> Ready -> ShuttingDown`, with a
//!   `learning` sub-flag held by at most one learning cycle at a time
//! - Per-item pipeline ([`system`]): store -> evolve -> interpret ->
//!   aggregate into an immutable [`ProcessResult`]
//! - Streaming learning loop: a lazy, pull-based, cancellable sequence
//!   driving the pipeline over a data stream and linking successful
//!   interpretations back into memory
//! - Ranked retrieval: concurrent fan-out to memory search and query
//!   interpretation, ranked by the genome engine
//! - Snapshot/restore: pass-through aggregation of collaborator state for
//!   a caller-supplied persistence mechanism
//!
//! ## Example
//!
//! ```ignore
//! let core = LucaCore::new(CoreConfig::default(), memory, genome, interpreter)?;
//! core.initialize().await?;
//!
//! let result = core.process(json!({"observation": "sample"})).await?;
//! if result.success {
//!     println!("interpreted with confidence {}", result.interpretation.confidence);
//! }
//!
//! let mut learning = core.learn(data_stream)?;
//! while let Some(result) = learning.next().await {
//!     let result = result?;
//!     // consume at your own pace; dropping the stream cancels the cycle
//! }
//!
//! core.shutdown().await?;
//! ```

pub mod collaborator;
pub mod config;
pub mod error;
pub mod state;
pub mod system;

// Re-exports
pub use collaborator::*;
pub use config::{ConfigError, CoreConfig};
pub use error::*;
pub use state::*;
pub use system::*;
