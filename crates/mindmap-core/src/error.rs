use crate::NodeId;
use thiserror::Error;

/// Reasons the entity store refuses a mutation.
///
/// Every variant is raised before anything is touched, so a failed call
/// leaves the store exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} cannot be its own parent")]
    SelfEdge(NodeId),
    #[error("node {child} already has parent {existing}")]
    DuplicateParent { child: NodeId, existing: NodeId },
    #[error("edge {parent} -> {child} would close a cycle")]
    CycleViolation { parent: NodeId, child: NodeId },
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("inconsistent graph: {0}")]
    Inconsistent(String),
}
