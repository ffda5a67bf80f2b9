//! Node kinds, typed node ids, and the vertex data stored per node.

use std::fmt;

use petgraph::stable_graph::NodeIndex;

use crate::block::BlockId;

/// The two node kinds. Every node is owned by exactly one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A connection point that reads data from at most one upstream output.
    Input,
    /// A connection point carrying the data a block computed, feeding any
    /// number of downstream inputs.
    Output,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Input => write!(f, "input"),
            NodeKind::Output => write!(f, "output"),
        }
    }
}

/// Identifier of an input node.
///
/// Ids are stable for as long as the node is registered. After the node is
/// removed the underlying slot may be reused; a stale id is then reported as
/// [`NodeGone`](crate::GraphError::NodeGone) or, if the slot was reused by a
/// node of the other kind, [`WrongKind`](crate::GraphError::WrongKind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(pub(crate) NodeIndex);

impl InputId {
    /// The raw index value, usable as a stable key while the node lives.
    pub fn index(self) -> usize {
        self.0.index()
    }
}

/// Identifier of an output node.
///
/// Same stability rules as [`InputId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub(crate) NodeIndex);

impl OutputId {
    /// The raw index value, usable as a stable key while the node lives.
    pub fn index(self) -> usize {
        self.0.index()
    }
}

/// Vertex weight stored in the registry graph.
#[derive(Debug)]
pub(crate) struct NodeSlot<T> {
    /// The block this node belongs to. Set at creation, never reassigned.
    pub(crate) owner: BlockId,
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    /// Whether the producing block has run since the last relevant change.
    pub(crate) up_to_date: bool,
    /// Computed data. Always `None` for inputs; an input reads through its
    /// connection edge instead.
    pub(crate) data: Option<T>,
}

impl<T> NodeSlot<T> {
    pub(crate) fn new(owner: BlockId, kind: NodeKind, name: &str) -> Self {
        Self {
            owner,
            kind,
            name: name.to_string(),
            up_to_date: true,
            data: None,
        }
    }
}
