#![deny(missing_docs)]
//! Block-Flow: a reactive block-diagram graph engine.
//!
//! Typed processing units ("blocks") with named inputs and outputs are wired
//! into a directed acyclic graph. When a block's parameters or upstream data
//! change, exactly the affected downstream blocks recompute, in dependency
//! order, at most once per change - the same kind of incremental-computation
//! kernel a spreadsheet or build graph runs on, driving signal-processing
//! blocks instead of cells.
//!
//! # Key Features
//!
//! - **Explicit engine instance**: a [`Registry`] per editing session, no
//!   global state - tests and documents stay independent
//! - **Cycle rejection with rollback**: a connection that would close a
//!   cycle fails and leaves the graph untouched
//! - **At-most-once recomputation**: diamond-shaped fan-in still fires each
//!   downstream block once per change
//! - **Dynamic I/O**: blocks may grow and shrink their input/output lists
//!   within declared bounds
//! - **Validated parameters**: kind, range, and choice checks on every
//!   assignment
//!
//! # Example
//!
//! ```
//! use block_flow::{Block, IoSpec, ProcessScope, Registry};
//!
//! struct Constant(f64);
//!
//! impl Block<f64> for Constant {
//!     fn setup_io(&mut self, io: &mut IoSpec) {
//!         io.output("out");
//!     }
//!     fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
//!         scope.set_output(0, self.0);
//!         Ok(())
//!     }
//! }
//!
//! struct AddOne;
//!
//! impl Block<f64> for AddOne {
//!     fn setup_io(&mut self, io: &mut IoSpec) {
//!         io.input("in").output("out");
//!     }
//!     fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
//!         if let Some(&x) = scope.input(0) {
//!             scope.set_output(0, x + 1.0);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! let a = registry.add_block(Constant(1.0))?;
//! let b = registry.add_block(AddOne)?;
//! registry.connect(registry.outputs(a)[0], registry.inputs(b)[0])?;
//! assert_eq!(registry.output_data(registry.outputs(b)[0]), Some(&2.0));
//! # Ok::<(), block_flow::GraphError>(())
//! ```

mod block;
mod error;
mod node;
mod param;
mod registry;

pub use block::{Block, BlockId, DynamicBounds, IoSpec, ProcessScope};
pub use error::{DynamicIoError, GraphError, ParameterError};
pub use node::{InputId, NodeKind, OutputId};
pub use param::{Param, ParamKind, ParamSet, ParamValue};
pub use registry::Registry;
