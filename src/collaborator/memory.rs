//! Memory mesh contract: an addressable store of data nodes and their
//! relations, with similarity/keyword search.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::Collaborator;

/// Opaque node identifier, minted and owned by the memory mesh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A stored node as returned by the mesh. The payload is the caller's data,
/// echoed back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: NodeId,
    pub payload: Value,
}

/// Contract of the memory collaborator.
///
/// Search results are unordered from the mesh's perspective; ranking is the
/// genome engine's concern.
#[async_trait]
pub trait MemoryMesh: Collaborator {
    /// Stores an arbitrary payload and returns the created node.
    async fn add_node(&self, payload: Value) -> Result<MemoryNode, MemoryError>;

    /// Links an existing node to a set of concept references.
    async fn link_nodes(&self, id: &NodeId, concepts: &[String]) -> Result<(), MemoryError>;

    /// Returns the candidate nodes related to a query, unordered.
    async fn search(&self, query: &str) -> Result<Vec<MemoryNode>, MemoryError>;
}

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("memory mesh initialization failed: {0}")]
    Init(String),

    #[error("failed to store node: {0}")]
    Storage(String),

    #[error("failed to link node {id}: {message}")]
    Link { id: NodeId, message: String },

    #[error("search failed: {0}")]
    Search(String),

    #[error("memory state serialization failed: {0}")]
    Serialization(String),

    #[error("memory mesh shutdown failed: {0}")]
    Shutdown(String),
}
