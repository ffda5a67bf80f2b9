//! The block contract: behavior trait, I/O declaration, and the scope a
//! block processes in.

use crate::error::DynamicIoError;
use crate::node::NodeKind;
use crate::param::ParamSet;

/// Identifier of a block registered in a [`Registry`](crate::Registry).
///
/// Stable while the block is registered; after
/// [`remove_block`](crate::Registry::remove_block) the slot may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// The raw index value, usable as a stable key while the block lives.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Bounds on the length of a block's input or output list.
///
/// The list length is a bounded counter: `add` moves it up against the upper
/// bound, `delete` moves it down against the lower bound, and the bounds
/// themselves are fixed at declaration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicBounds {
    /// The list is exactly the declared nodes; add and delete are rejected.
    Fixed,
    /// The list may grow and shrink within the inclusive bounds. An upper
    /// bound of `None` means unbounded.
    Bounded {
        /// Inclusive lower bound on the list length.
        lower: usize,
        /// Inclusive upper bound, or `None` for unbounded.
        upper: Option<usize>,
    },
}

impl Default for DynamicBounds {
    fn default() -> Self {
        DynamicBounds::Fixed
    }
}

impl DynamicBounds {
    /// Check that one node may be added to a list of length `len`.
    pub(crate) fn check_add(&self, list: NodeKind, len: usize) -> Result<(), DynamicIoError> {
        match *self {
            DynamicBounds::Fixed => Err(DynamicIoError::NotDynamic { list }),
            DynamicBounds::Bounded {
                upper: Some(upper), ..
            } if len >= upper => Err(DynamicIoError::UpperBound { list, upper }),
            DynamicBounds::Bounded { .. } => Ok(()),
        }
    }

    /// Check that one node may be removed from a list of length `len`.
    pub(crate) fn check_remove(&self, list: NodeKind, len: usize) -> Result<(), DynamicIoError> {
        match *self {
            DynamicBounds::Fixed => Err(DynamicIoError::NotDynamic { list }),
            DynamicBounds::Bounded { lower, .. } if len <= lower => {
                Err(DynamicIoError::LowerBound { list, lower })
            }
            DynamicBounds::Bounded { .. } => Ok(()),
        }
    }

    /// Check that a declared list of length `len` satisfies the bounds.
    pub(crate) fn check_len(&self, list: NodeKind, len: usize) -> Result<(), DynamicIoError> {
        match *self {
            DynamicBounds::Fixed => Ok(()),
            DynamicBounds::Bounded { lower, .. } if len < lower => {
                Err(DynamicIoError::LowerBound { list, lower })
            }
            DynamicBounds::Bounded {
                upper: Some(upper), ..
            } if len > upper => Err(DynamicIoError::UpperBound { list, upper }),
            DynamicBounds::Bounded { .. } => Ok(()),
        }
    }
}

/// Collects a block's I/O declaration during
/// [`Registry::add_block`](crate::Registry::add_block).
#[derive(Debug, Default)]
pub struct IoSpec {
    pub(crate) inputs: Vec<String>,
    pub(crate) outputs: Vec<String>,
    pub(crate) dynamic_input: DynamicBounds,
    pub(crate) dynamic_output: DynamicBounds,
}

impl IoSpec {
    /// Declare an input. Declaration order is the index order `process`
    /// sees.
    pub fn input(&mut self, name: &str) -> &mut Self {
        self.inputs.push(name.to_string());
        self
    }

    /// Declare an output. Declaration order is the index order `process`
    /// sees.
    pub fn output(&mut self, name: &str) -> &mut Self {
        self.outputs.push(name.to_string());
        self
    }

    /// Allow the input list to grow and shrink within `[lower, upper]`
    /// (inclusive; `None` upper means unbounded).
    pub fn dynamic_inputs(&mut self, lower: usize, upper: Option<usize>) -> &mut Self {
        self.dynamic_input = DynamicBounds::Bounded { lower, upper };
        self
    }

    /// Allow the output list to grow and shrink within `[lower, upper]`
    /// (inclusive; `None` upper means unbounded).
    pub fn dynamic_outputs(&mut self, lower: usize, upper: Option<usize>) -> &mut Self {
        self.dynamic_output = DynamicBounds::Bounded { lower, upper };
        self
    }
}

/// A processing unit wired into a [`Registry`](crate::Registry).
///
/// Implementors declare their connection points in [`setup_io`], their
/// user-editable parameters in [`setup_parameters`], and compute output data
/// from input data and parameter values in [`process`]. The registry decides
/// *when* `process` runs; a block never calls it itself.
///
/// `T` is the artifact type flowing along connections - whatever the
/// embedding application computes, e.g. a sampled signal.
///
/// [`setup_io`]: Block::setup_io
/// [`setup_parameters`]: Block::setup_parameters
/// [`process`]: Block::process
pub trait Block<T>: 'static {
    /// Declare inputs, outputs, and dynamic bounds. Called exactly once,
    /// inside [`Registry::add_block`](crate::Registry::add_block).
    fn setup_io(&mut self, io: &mut IoSpec);

    /// Declare parameters. Called exactly once, after [`setup_io`]. The
    /// default declares none.
    ///
    /// [`setup_io`]: Block::setup_io
    fn setup_parameters(&mut self, _params: &mut ParamSet) {}

    /// Compute output data from the current input data and parameter
    /// values.
    ///
    /// Must be a pure function of what the scope presents: read inputs with
    /// [`ProcessScope::input`], write outputs with
    /// [`ProcessScope::set_output`] or leave them untouched (e.g. when
    /// inputs are absent). Returning an error aborts the surrounding update
    /// walk; see [`GraphError::Process`](crate::GraphError::Process).
    fn process(&mut self, scope: &mut ProcessScope<'_, T>) -> anyhow::Result<()>;

    /// A short human-readable name for diagnostics and GUIs.
    fn type_name(&self) -> &str {
        "block"
    }
}

/// Everything a block sees while processing: a snapshot of its input data,
/// its parameter values, and its output slots.
///
/// Output slots are pre-filled with the data from the previous run, so a
/// block that decides not to recompute simply leaves them alone.
pub struct ProcessScope<'a, T> {
    pub(crate) inputs: &'a [Option<T>],
    pub(crate) params: &'a ParamSet,
    pub(crate) outputs: &'a mut [Option<T>],
}

impl<'a, T> ProcessScope<'a, T> {
    /// Data at input `index`: `None` when the input is unconnected or the
    /// upstream output holds no data yet.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a declared input index.
    pub fn input(&self, index: usize) -> Option<&T> {
        self.inputs[index].as_ref()
    }

    /// Number of inputs, in declaration order.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Whether every input currently carries data.
    pub fn all_inputs_present(&self) -> bool {
        self.inputs.iter().all(|v| v.is_some())
    }

    /// Assign data to output `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a declared output index.
    pub fn set_output(&mut self, index: usize, value: T) {
        self.outputs[index] = Some(value);
    }

    /// Clear output `index` back to "no data".
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a declared output index.
    pub fn clear_output(&mut self, index: usize) {
        self.outputs[index] = None;
    }

    /// Number of outputs, in declaration order.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// The block's parameters, for the typed read accessors.
    pub fn params(&self) -> &ParamSet {
        self.params
    }
}
