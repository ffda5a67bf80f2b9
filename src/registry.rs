//! The registry: graph storage, connection management, and the
//! invalidate/update propagation engine.
//!
//! One [`Registry`] holds one directed graph over every input and output
//! node of every registered block. Two edge kinds live in it, told apart by
//! their endpoint kinds alone:
//!
//! - *intra-block edges*, Input → Output within one block, added
//!   automatically so a forward walk started at an output can pass through
//!   the consuming block to everything further downstream;
//! - *connection edges*, Output → Input across blocks, added by
//!   [`connect`](Registry::connect) and removed by the disconnect
//!   operations. At most one terminates at any input.
//!
//! The graph is acyclic after every successful public operation.
//!
//! # The invalidate/update walk
//!
//! Whenever a block's own state changes (new connection, parameter edit,
//! disconnection), the engine runs three phases:
//!
//! 1. **Invalidate** - every node reachable from the block's outputs has
//!    `up_to_date` cleared.
//! 2. **Settle self** - the block itself updates.
//! 3. **Propagate** - a breadth-first walk from each output; every examined
//!    connection edge copies the upstream flag onto the downstream input
//!    and updates the input's owner.
//!
//! A block only processes when *all* of its inputs are up to date, so a
//! walk that reaches a diamond-shaped fan-in from one side first simply
//! no-ops until the visit that settles the last input - each downstream
//! block fires at most once per walk.

use std::collections::{HashSet, VecDeque};

use petgraph::algo::is_cyclic_directed;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use slab::Slab;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::block::{Block, BlockId, DynamicBounds, IoSpec, ProcessScope};
use crate::error::{DynamicIoError, GraphError};
use crate::node::{InputId, NodeKind, NodeSlot, OutputId};
use crate::param::{ParamSet, ParamValue};

/// Bookkeeping for one registered block.
struct BlockEntry<T> {
    behavior: Box<dyn Block<T>>,
    /// Input ids in declaration order. Index-addressed by `process`.
    inputs: Vec<InputId>,
    /// Output ids in declaration order. Index-addressed by `process`.
    outputs: Vec<OutputId>,
    dynamic_input: DynamicBounds,
    dynamic_output: DynamicBounds,
    params: ParamSet,
}

/// The connectivity graph and update engine for one editing session.
///
/// A registry is an explicit value: create as many independent ones as you
/// need (one per document, one per test). All operations take `&mut self`;
/// the model is single-threaded and synchronous, and every mutating call
/// runs its full invalidate/update walk before returning.
///
/// `T` is the artifact type carried by output nodes.
pub struct Registry<T> {
    blocks: Slab<BlockEntry<T>>,
    graph: StableDiGraph<NodeSlot<T>, ()>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            blocks: Slab::new(),
            graph: StableDiGraph::default(),
        }
    }
}

impl<T: Clone + 'static> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    // ------------------------------------------------------------------
    // Block lifecycle
    // ------------------------------------------------------------------

    /// Register a block: run its I/O and parameter declarations, create its
    /// nodes and intra-block edges, then settle it once so zero-input
    /// blocks hold data before their first connection.
    ///
    /// If the initial `process` fails the block is removed again and the
    /// error is returned; a failed `add_block` leaves the registry
    /// unchanged.
    pub fn add_block(&mut self, behavior: impl Block<T>) -> Result<BlockId, GraphError> {
        let mut behavior = Box::new(behavior);
        let mut io = IoSpec::default();
        behavior.setup_io(&mut io);
        io.dynamic_input.check_len(NodeKind::Input, io.inputs.len())?;
        io.dynamic_output
            .check_len(NodeKind::Output, io.outputs.len())?;
        let mut params = ParamSet::default();
        behavior.setup_parameters(&mut params);

        let id = BlockId(self.blocks.insert(BlockEntry {
            behavior,
            inputs: Vec::new(),
            outputs: Vec::new(),
            dynamic_input: io.dynamic_input,
            dynamic_output: io.dynamic_output,
            params,
        }));

        let inputs: Vec<InputId> = io
            .inputs
            .iter()
            .map(|name| InputId(self.graph.add_node(NodeSlot::new(id, NodeKind::Input, name))))
            .collect();
        let outputs: Vec<OutputId> = io
            .outputs
            .iter()
            .map(|name| OutputId(self.graph.add_node(NodeSlot::new(id, NodeKind::Output, name))))
            .collect();
        for input in &inputs {
            for output in &outputs {
                self.graph.add_edge(input.0, output.0, ());
            }
        }
        let entry = &mut self.blocks[id.0];
        entry.inputs = inputs;
        entry.outputs = outputs;

        debug!(block = ?id, name = self.blocks[id.0].behavior.type_name(), "block registered");
        match self.invalidate_and_update(id) {
            Ok(()) => Ok(id),
            Err(err) => {
                let entry = self.blocks.remove(id.0);
                for input in entry.inputs {
                    self.graph.remove_node(input.0);
                }
                for output in entry.outputs {
                    self.graph.remove_node(output.0);
                }
                Err(err)
            }
        }
    }

    /// Remove a block: sever every edge touching it, drop its nodes, then
    /// re-settle every downstream block that lost an upstream source.
    pub fn remove_block(&mut self, block: BlockId) -> Result<(), GraphError> {
        let entry = self.blocks.try_remove(block.0).ok_or(GraphError::BlockGone)?;
        let mut affected: Vec<BlockId> = Vec::new();
        for output in &entry.outputs {
            for target in self.connected_inputs(output.0) {
                let owner = self.graph[target].owner;
                if !affected.contains(&owner) {
                    affected.push(owner);
                }
            }
        }
        // removing the nodes also removes every incident edge
        for input in &entry.inputs {
            self.graph.remove_node(input.0);
        }
        for output in &entry.outputs {
            self.graph.remove_node(output.0);
        }
        debug!(block = ?block, downstream = affected.len(), "block removed");
        self.settle(&affected)
    }

    /// Drop every block, node, and edge.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.graph.clear();
        debug!("registry cleared");
    }

    // ------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------

    /// Connect an output to an input and settle the input's block.
    ///
    /// Fails with [`InputOccupied`](GraphError::InputOccupied) if the input
    /// already has a connection, and with [`Cycle`](GraphError::Cycle) if
    /// the edge would make the graph cyclic - in which case the staged edge
    /// is removed again and the graph is exactly as before the call.
    pub fn connect(&mut self, output: OutputId, input: InputId) -> Result<(), GraphError> {
        let out_ix = self.resolve(output.0, NodeKind::Output)?;
        let in_ix = self.resolve(input.0, NodeKind::Input)?;
        if self.incoming_connection(in_ix).is_some() {
            return Err(GraphError::InputOccupied {
                block: self.graph[in_ix].owner,
                name: self.graph[in_ix].name.clone(),
            });
        }
        let staged = self.graph.add_edge(out_ix, in_ix, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(staged);
            let block = self.graph[in_ix].owner;
            debug!(block = ?block, "connection rejected: would close a cycle");
            return Err(GraphError::Cycle { block });
        }
        let owner = self.graph[in_ix].owner;
        debug!(from = ?output, to = ?input, block = ?owner, "connected");
        self.invalidate_and_update(owner)
    }

    /// Sever the input's at-most-one incoming connection and settle its
    /// block. Doing this on an unconnected input is a no-op, not an error.
    pub fn disconnect_input(&mut self, input: InputId) -> Result<(), GraphError> {
        let in_ix = self.resolve(input.0, NodeKind::Input)?;
        let Some(edge) = self.incoming_connection(in_ix) else {
            return Ok(());
        };
        self.graph.remove_edge(edge);
        let owner = self.graph[in_ix].owner;
        debug!(input = ?input, block = ?owner, "disconnected input");
        self.invalidate_and_update(owner)
    }

    /// Sever every connection leaving this output, then settle each
    /// downstream block that lost its source - each is updated once even
    /// when several of its inputs hung off the same output's block.
    pub fn disconnect_output(&mut self, output: OutputId) -> Result<(), GraphError> {
        let out_ix = self.resolve(output.0, NodeKind::Output)?;
        let connections: SmallVec<[(EdgeIndex, NodeIndex); 4]> = self
            .graph
            .edges_directed(out_ix, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        if connections.is_empty() {
            return Ok(());
        }
        let mut affected: Vec<BlockId> = Vec::new();
        for (edge, target) in connections {
            self.graph.remove_edge(edge);
            let owner = self.graph[target].owner;
            if !affected.contains(&owner) {
                affected.push(owner);
            }
        }
        debug!(output = ?output, downstream = affected.len(), "disconnected output");
        self.settle(&affected)
    }

    /// Disconnect every input and output of a block, walking the affected
    /// downstream blocks as each connection goes. Used before deletion.
    pub fn disconnect_all(&mut self, block: BlockId) -> Result<(), GraphError> {
        let entry = self.blocks.get(block.0).ok_or(GraphError::BlockGone)?;
        let inputs = entry.inputs.clone();
        let outputs = entry.outputs.clone();
        for input in inputs {
            self.disconnect_input(input)?;
        }
        for output in outputs {
            self.disconnect_output(output)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dynamic I/O
    // ------------------------------------------------------------------

    /// Append an input to a block that declared dynamic inputs.
    ///
    /// The new node is wired with intra-block edges to every output of the
    /// block, and the block is settled again since its shape changed.
    pub fn add_input(&mut self, block: BlockId, name: &str) -> Result<InputId, GraphError> {
        let entry = self.blocks.get(block.0).ok_or(GraphError::BlockGone)?;
        entry
            .dynamic_input
            .check_add(NodeKind::Input, entry.inputs.len())?;
        let ix = self.graph.add_node(NodeSlot::new(block, NodeKind::Input, name));
        let outputs: SmallVec<[NodeIndex; 4]> =
            self.blocks[block.0].outputs.iter().map(|o| o.0).collect();
        for out_ix in outputs {
            self.graph.add_edge(ix, out_ix, ());
        }
        self.blocks[block.0].inputs.push(InputId(ix));
        trace!(block = ?block, name, "input added");
        self.invalidate_and_update(block)?;
        Ok(InputId(ix))
    }

    /// Append an output to a block that declared dynamic outputs.
    ///
    /// The new node is wired with intra-block edges from every input of the
    /// block, and the block is settled again so the output holds data.
    pub fn add_output(&mut self, block: BlockId, name: &str) -> Result<OutputId, GraphError> {
        let entry = self.blocks.get(block.0).ok_or(GraphError::BlockGone)?;
        entry
            .dynamic_output
            .check_add(NodeKind::Output, entry.outputs.len())?;
        let ix = self.graph.add_node(NodeSlot::new(block, NodeKind::Output, name));
        let inputs: SmallVec<[NodeIndex; 4]> =
            self.blocks[block.0].inputs.iter().map(|i| i.0).collect();
        for in_ix in inputs {
            self.graph.add_edge(in_ix, ix, ());
        }
        self.blocks[block.0].outputs.push(OutputId(ix));
        trace!(block = ?block, name, "output added");
        self.invalidate_and_update(block)?;
        Ok(OutputId(ix))
    }

    /// Remove the input at `index`, disconnecting it first, then settle the
    /// block with its new shape.
    pub fn delete_input(&mut self, block: BlockId, index: usize) -> Result<(), GraphError> {
        let entry = self.blocks.get(block.0).ok_or(GraphError::BlockGone)?;
        entry
            .dynamic_input
            .check_remove(NodeKind::Input, entry.inputs.len())?;
        let Some(&input) = entry.inputs.get(index) else {
            return Err(DynamicIoError::OutOfRange {
                list: NodeKind::Input,
                index,
                len: entry.inputs.len(),
            }
            .into());
        };
        // sever silently; the single walk below covers the shape change and
        // the lost connection alike
        if let Some(edge) = self.incoming_connection(input.0) {
            self.graph.remove_edge(edge);
        }
        self.graph.remove_node(input.0);
        self.blocks[block.0].inputs.remove(index);
        trace!(block = ?block, index, "input deleted");
        self.invalidate_and_update(block)
    }

    /// Remove the output at `index`, disconnecting its consumers first,
    /// then settle the block and every downstream block that lost its
    /// source.
    pub fn delete_output(&mut self, block: BlockId, index: usize) -> Result<(), GraphError> {
        let entry = self.blocks.get(block.0).ok_or(GraphError::BlockGone)?;
        entry
            .dynamic_output
            .check_remove(NodeKind::Output, entry.outputs.len())?;
        let Some(&output) = entry.outputs.get(index) else {
            return Err(DynamicIoError::OutOfRange {
                list: NodeKind::Output,
                index,
                len: entry.outputs.len(),
            }
            .into());
        };
        let mut affected = vec![block];
        for target in self.connected_inputs(output.0) {
            let owner = self.graph[target].owner;
            if !affected.contains(&owner) {
                affected.push(owner);
            }
        }
        self.graph.remove_node(output.0);
        self.blocks[block.0].outputs.remove(index);
        trace!(block = ?block, index, "output deleted");
        self.settle(&affected)
    }

    // ------------------------------------------------------------------
    // Updates and parameters
    // ------------------------------------------------------------------

    /// Re-evaluate a block and everything downstream of it. The manual
    /// entry point for "this block's own state changed", typically after
    /// one or more [`set_param`](Registry::set_param) calls.
    pub fn trigger_update(&mut self, block: BlockId) -> Result<(), GraphError> {
        if !self.blocks.contains(block.0) {
            return Err(GraphError::BlockGone);
        }
        self.invalidate_and_update(block)
    }

    /// Assign a parameter value, validated against the block's declaration.
    ///
    /// Assignment alone does not recompute anything; follow up with
    /// [`trigger_update`](Registry::trigger_update) once the edit is
    /// complete.
    pub fn set_param(
        &mut self,
        block: BlockId,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), GraphError> {
        let entry = self.blocks.get_mut(block.0).ok_or(GraphError::BlockGone)?;
        entry.params.set(name, value)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Iterate over every registered block.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.iter().map(|(key, _)| BlockId(key))
    }

    /// Number of registered blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The block's diagnostic name, from [`Block::type_name`].
    pub fn block_name(&self, block: BlockId) -> Option<&str> {
        self.blocks.get(block.0).map(|e| e.behavior.type_name())
    }

    /// The block's inputs in declaration order, empty for an unknown id.
    pub fn inputs(&self, block: BlockId) -> &[InputId] {
        self.blocks
            .get(block.0)
            .map(|e| e.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// The block's outputs in declaration order, empty for an unknown id.
    pub fn outputs(&self, block: BlockId) -> &[OutputId] {
        self.blocks
            .get(block.0)
            .map(|e| e.outputs.as_slice())
            .unwrap_or(&[])
    }

    /// The block's parameter set.
    pub fn params(&self, block: BlockId) -> Option<&ParamSet> {
        self.blocks.get(block.0).map(|e| &e.params)
    }

    /// The output an input is connected to, if any.
    pub fn connection(&self, input: InputId) -> Option<OutputId> {
        let slot = self.graph.node_weight(input.0)?;
        if slot.kind != NodeKind::Input {
            return None;
        }
        self.graph
            .edges_directed(input.0, Direction::Incoming)
            .next()
            .map(|edge| OutputId(edge.source()))
    }

    /// Every input connected to this output.
    pub fn connections(&self, output: OutputId) -> Vec<InputId> {
        match self.graph.node_weight(output.0) {
            Some(slot) if slot.kind == NodeKind::Output => self
                .connected_inputs(output.0)
                .into_iter()
                .map(InputId)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The data an input currently reads: its connected output's data, or
    /// `None` when unconnected or the output holds none.
    pub fn input_data(&self, input: InputId) -> Option<&T> {
        let source = self.connection(input)?;
        self.graph[source.0].data.as_ref()
    }

    /// The data an output currently holds.
    pub fn output_data(&self, output: OutputId) -> Option<&T> {
        let slot = self.graph.node_weight(output.0)?;
        if slot.kind != NodeKind::Output {
            return None;
        }
        slot.data.as_ref()
    }

    /// The input's `up_to_date` flag. `None` for a stale id.
    pub fn input_up_to_date(&self, input: InputId) -> Option<bool> {
        self.graph
            .node_weight(input.0)
            .filter(|slot| slot.kind == NodeKind::Input)
            .map(|slot| slot.up_to_date)
    }

    /// The output's `up_to_date` flag. `None` for a stale id.
    pub fn output_up_to_date(&self, output: OutputId) -> Option<bool> {
        self.graph
            .node_weight(output.0)
            .filter(|slot| slot.kind == NodeKind::Output)
            .map(|slot| slot.up_to_date)
    }

    /// The input's declared name.
    pub fn input_name(&self, input: InputId) -> Option<&str> {
        self.graph
            .node_weight(input.0)
            .filter(|slot| slot.kind == NodeKind::Input)
            .map(|slot| slot.name.as_str())
    }

    /// The output's declared name.
    pub fn output_name(&self, output: OutputId) -> Option<&str> {
        self.graph
            .node_weight(output.0)
            .filter(|slot| slot.kind == NodeKind::Output)
            .map(|slot| slot.name.as_str())
    }

    /// The block owning an input.
    pub fn input_owner(&self, input: InputId) -> Option<BlockId> {
        self.graph
            .node_weight(input.0)
            .filter(|slot| slot.kind == NodeKind::Input)
            .map(|slot| slot.owner)
    }

    /// The block owning an output.
    pub fn output_owner(&self, output: OutputId) -> Option<BlockId> {
        self.graph
            .node_weight(output.0)
            .filter(|slot| slot.kind == NodeKind::Output)
            .map(|slot| slot.owner)
    }

    /// Total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Total number of edges in the graph, intra-block and connection
    /// alike.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // ------------------------------------------------------------------
    // The walk
    // ------------------------------------------------------------------

    /// The full three-phase walk for one block whose own state changed.
    fn invalidate_and_update(&mut self, block: BlockId) -> Result<(), GraphError> {
        self.settle(&[block])
    }

    /// The batched walk: invalidate downstream of every listed block, run
    /// each block's update once, then propagate from each. Listing several
    /// blocks (disconnect of a fanned-out output, block removal) still
    /// touches each with the settle step exactly once.
    fn settle(&mut self, blocks: &[BlockId]) -> Result<(), GraphError> {
        for &block in blocks {
            self.invalidate_downstream(block);
        }
        for &block in blocks {
            self.update_block(block)?;
        }
        for &block in blocks {
            self.propagate_from(block)?;
        }
        Ok(())
    }

    /// Phase 1: clear `up_to_date` on the block's outputs and on every node
    /// reachable from them.
    fn invalidate_downstream(&mut self, block: BlockId) {
        let Some(entry) = self.blocks.get(block.0) else {
            return;
        };
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        for output in &entry.outputs {
            if visited.insert(output.0) {
                queue.push_back(output.0);
            }
        }
        trace!(block = ?block, "invalidating downstream");
        while let Some(node) = queue.pop_front() {
            self.graph[node].up_to_date = false;
            let next: SmallVec<[NodeIndex; 8]> = self.graph.neighbors(node).collect();
            for target in next {
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }
    }

    /// Phase 2 (and the per-visit step of phase 3): run the block's
    /// `process` if it has no inputs or all inputs are up to date, then
    /// force every output's flag to `true` - even when `process` left the
    /// data untouched. Otherwise do nothing; an early visit from one side
    /// of a fan-in settles nothing until the last input arrives.
    fn update_block(&mut self, block: BlockId) -> Result<(), GraphError> {
        let Registry { blocks, graph } = self;
        let entry = blocks.get_mut(block.0).ok_or(GraphError::BlockGone)?;
        let ready = entry.inputs.is_empty()
            || entry.inputs.iter().all(|input| graph[input.0].up_to_date);
        if !ready {
            trace!(block = ?block, "update deferred, inputs not settled");
            return Ok(());
        }
        let input_values: Vec<Option<T>> = entry
            .inputs
            .iter()
            .map(|input| {
                graph
                    .edges_directed(input.0, Direction::Incoming)
                    .next()
                    .and_then(|edge| graph[edge.source()].data.clone())
            })
            .collect();
        let mut output_values: Vec<Option<T>> = entry
            .outputs
            .iter()
            .map(|output| graph[output.0].data.clone())
            .collect();
        trace!(block = ?block, "processing");
        let mut scope = ProcessScope {
            inputs: &input_values,
            params: &entry.params,
            outputs: &mut output_values,
        };
        entry
            .behavior
            .process(&mut scope)
            .map_err(|source| GraphError::Process { block, source })?;
        for (output, value) in entry.outputs.iter().zip(output_values) {
            let slot = &mut graph[output.0];
            slot.data = value;
            slot.up_to_date = true;
        }
        Ok(())
    }

    /// Phase 3: breadth-first from each output. Intra-block edges are
    /// walked through but not acted on; every examined connection edge
    /// copies the upstream output's flag onto the downstream input and
    /// updates the input's owner.
    fn propagate_from(&mut self, block: BlockId) -> Result<(), GraphError> {
        let Some(entry) = self.blocks.get(block.0) else {
            return Ok(());
        };
        let starts: SmallVec<[NodeIndex; 4]> = entry.outputs.iter().map(|o| o.0).collect();
        for start in starts {
            let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
            let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
            while let Some(node) = queue.pop_front() {
                let next: SmallVec<[NodeIndex; 8]> = self.graph.neighbors(node).collect();
                for target in next {
                    if self.graph[node].kind == NodeKind::Output
                        && self.graph[target].kind == NodeKind::Input
                    {
                        self.graph[target].up_to_date = self.graph[node].up_to_date;
                        let owner = self.graph[target].owner;
                        self.update_block(owner)?;
                    }
                    if visited.insert(target) {
                        queue.push_back(target);
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup helpers
    // ------------------------------------------------------------------

    fn resolve(&self, ix: NodeIndex, expected: NodeKind) -> Result<NodeIndex, GraphError> {
        match self.graph.node_weight(ix) {
            None => Err(GraphError::NodeGone),
            Some(slot) if slot.kind != expected => Err(GraphError::WrongKind { expected }),
            Some(_) => Ok(ix),
        }
    }

    /// The at-most-one connection edge ending at an input.
    fn incoming_connection(&self, input: NodeIndex) -> Option<EdgeIndex> {
        self.graph
            .edges_directed(input, Direction::Incoming)
            .next()
            .map(|edge| edge.id())
    }

    /// Targets of every connection edge leaving an output. All outgoing
    /// edges of an output are connections; intra-block edges point the
    /// other way.
    fn connected_inputs(&self, output: NodeIndex) -> SmallVec<[NodeIndex; 4]> {
        self.graph
            .edges_directed(output, Direction::Outgoing)
            .map(|edge| edge.target())
            .collect()
    }
}
