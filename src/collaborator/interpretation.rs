//! Interpreter contract: maps an evolved individual or a raw query into a
//! semantic judgment consisting of a confidence score and related concepts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::Collaborator;

/// Semantic judgment produced by the interpreter. Confidence is always
/// within `[0.0, 1.0]` per the collaborator contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub confidence: f64,
    pub related_concepts: Vec<String>,
}

/// What the interpreter is asked to judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalysisSubject {
    /// An evolved individual produced by the genome engine.
    Individual(Value),
    /// Raw query text supplied by a caller.
    Query(String),
}

/// Contract of the interpretation collaborator.
#[async_trait]
pub trait Interpreter: Collaborator {
    async fn analyze(&self, subject: AnalysisSubject) -> Result<Interpretation, InterpretationError>;
}

#[derive(Error, Debug)]
pub enum InterpretationError {
    #[error("interpreter initialization failed: {0}")]
    Init(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("interpreter state serialization failed: {0}")]
    Serialization(String),

    #[error("interpreter shutdown failed: {0}")]
    Shutdown(String),
}
