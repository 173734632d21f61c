//! Counter contexts
//!
//! The packed per-row version vector carried by replicated counters,
//! split into the mechanical byte codec and the engine that implements
//! update, diff, and merge on top of it.

pub mod codec;
pub mod counter;

pub use counter::CounterContext;

use serde::{Deserialize, Serialize};

/// Version-vector relationship between two counter contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextRelationship {
    /// Equal node sets with equal clocks everywhere.
    Equal,
    /// Left strictly dominates right.
    GreaterThan,
    /// Right strictly dominates left.
    LessThan,
    /// Concurrent: neither side dominates, a merge is required.
    Disjoint,
}

impl ContextRelationship {
    /// The relation as seen from the other side.
    pub fn reversed(self) -> Self {
        match self {
            ContextRelationship::GreaterThan => ContextRelationship::LessThan,
            ContextRelationship::LessThan => ContextRelationship::GreaterThan,
            other => other,
        }
    }
}
