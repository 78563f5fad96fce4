//! State node kinds.
//!
//! A state node is atomic, compound, parallel or final. The kind is a tagged
//! variant and every consumer matches on it exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a state node inside a machine definition.
///
/// Nodes are stored in document order (pre-order), so ordering two ids
/// orders them the way the definition declares them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a state node.
///
/// # Example
///
/// ```rust
/// use parley::core::StateKind;
///
/// assert!(StateKind::Atomic.is_leaf());
/// assert!(StateKind::Final.is_leaf());
/// assert!(!StateKind::Parallel.is_leaf());
/// assert_eq!(StateKind::Parallel.name(), "parallel");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateKind {
    /// No children.
    Atomic,
    /// Exactly one child active at a time, starting with `initial`.
    Compound { initial: NodeId },
    /// Every child region active at once.
    Parallel,
    /// No children; entering it completes the parent.
    Final,
}

impl StateKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Atomic => "atomic",
            Self::Compound { .. } => "compound",
            Self::Parallel => "parallel",
            Self::Final => "final",
        }
    }

    /// Leaves have no children and terminate a configuration path.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Atomic | Self::Final)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final)
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound { .. })
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel)
    }
}
