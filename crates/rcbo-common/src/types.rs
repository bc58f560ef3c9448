//! RCBO Core Types

use serde::{Deserialize, Serialize};

/// Unique identifier of a plan node within one plan tree.
///
/// Statistics and cost memo tables are keyed by this identity, so ids must
/// be unique across the tree handed to the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNodeId(pub u32);

impl PlanNodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl From<u32> for PlanNodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A named output column of a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(name)
    }
}
