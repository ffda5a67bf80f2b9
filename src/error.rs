//! Error types for graph mutation and update propagation.

use crate::block::BlockId;
use crate::node::NodeKind;
use crate::param::ParamKind;

/// Errors raised by [`Registry`](crate::Registry) operations.
///
/// All variants are raised synchronously to the immediate caller; the engine
/// never catches them internally. A failed mutation leaves the graph exactly
/// as it was before the call, with one documented exception: a [`Process`]
/// failure escaping mid-walk (see the variant docs).
///
/// [`Process`]: GraphError::Process
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The block id does not resolve to a registered block.
    #[error("block is not registered in this graph")]
    BlockGone,

    /// The node id does not resolve to a live node; the node was removed
    /// and its slot may have been reused since.
    #[error("node is not registered in this graph")]
    NodeGone,

    /// The id resolves to a node of the other kind. This can only happen
    /// with a stale id whose slot was reused after removal.
    #[error("expected an {expected} node")]
    WrongKind {
        /// The node kind the operation required.
        expected: NodeKind,
    },

    /// The target input already has an incoming connection. An input accepts
    /// at most one; disconnect it first.
    #[error("input `{name}` of block {block:?} is already connected")]
    InputOccupied {
        /// The block owning the occupied input.
        block: BlockId,
        /// Name of the occupied input.
        name: String,
    },

    /// Connecting would close a cycle through the named block. The staged
    /// edge has been removed again; the graph is unchanged.
    #[error("connection would close a cycle through block {block:?}")]
    Cycle {
        /// The block owning the input whose connection was rejected.
        block: BlockId,
    },

    /// A dynamic I/O operation violated the block's declared bounds.
    #[error(transparent)]
    DynamicIo(#[from] DynamicIoError),

    /// Parameter validation failed.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// A block's `process` failed during an update walk.
    ///
    /// The walk stops where it stands: descendants not yet visited keep
    /// `up_to_date == false` and can be settled later with
    /// [`trigger_update`](crate::Registry::trigger_update) once the cause
    /// (usually a parameter value) is fixed.
    #[error("block {block:?} failed to process")]
    Process {
        /// The block whose `process` returned an error.
        block: BlockId,
        /// The error it returned.
        #[source]
        source: anyhow::Error,
    },
}

/// Violations of a block's declared dynamic I/O bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DynamicIoError {
    /// The block declared its list fixed; nodes cannot be added or removed.
    #[error("block does not allow adding or removing {list} nodes")]
    NotDynamic {
        /// Which list was targeted.
        list: NodeKind,
    },

    /// Adding would exceed the declared upper bound.
    #[error("upper bound of {upper} {list} nodes already reached")]
    UpperBound {
        /// Which list was targeted.
        list: NodeKind,
        /// The inclusive upper bound.
        upper: usize,
    },

    /// Removing would fall below the declared lower bound.
    #[error("lower bound of {lower} {list} nodes already reached")]
    LowerBound {
        /// Which list was targeted.
        list: NodeKind,
        /// The inclusive lower bound.
        lower: usize,
    },

    /// The index does not name a node in the list.
    #[error("no {list} node at index {index} (list has {len})")]
    OutOfRange {
        /// Which list was targeted.
        list: NodeKind,
        /// The requested index.
        index: usize,
        /// Current list length.
        len: usize,
    },
}

/// Failures of parameter validation, either while assigning a value from
/// outside or while a block reads a parameter during `process`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    /// No parameter with this name was declared.
    #[error("no parameter named `{name}`")]
    Unknown {
        /// The requested name.
        name: String,
    },

    /// The value's kind does not match the declared kind.
    #[error("parameter `{name}` expects a {expected} value, got {got}")]
    WrongType {
        /// The parameter name.
        name: String,
        /// The declared kind.
        expected: ParamKind,
        /// The kind that was supplied.
        got: ParamKind,
    },

    /// The numeric value lies outside the declared inclusive bounds.
    #[error("value {value} for `{name}` is outside [{min}, {max}]")]
    OutOfBounds {
        /// The parameter name.
        name: String,
        /// The rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// The string value is not one of the declared choices.
    #[error("`{value}` is not a valid choice for `{name}`")]
    InvalidChoice {
        /// The parameter name.
        name: String,
        /// The rejected value.
        value: String,
    },
}
