//! Invalidate/update walk properties: the concrete constant/add-one
//! scenario, at-most-once recomputation under fan-in, idempotent settling,
//! locality of disconnection, and the observable state a failing block
//! leaves behind.

mod common;

use block_flow::{GraphError, Registry};
use common::{AddOne, Constant, Counted, Faulty, Gain, Sum2};

// =============================================================================
// The concrete scenario
// =============================================================================

#[test]
fn constant_into_add_one_computes_two() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let b = registry.add_block(AddOne).unwrap();

    registry
        .connect(registry.outputs(a)[0], registry.inputs(b)[0])
        .unwrap();

    assert_eq!(registry.output_data(registry.outputs(b)[0]), Some(&2.0));
}

#[test]
fn disconnected_block_keeps_its_last_data() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let b = registry.add_block(AddOne).unwrap();
    let out_b = registry.outputs(b)[0];

    registry
        .connect(registry.outputs(a)[0], registry.inputs(b)[0])
        .unwrap();
    assert_eq!(registry.output_data(out_b), Some(&2.0));

    registry.disconnect_input(registry.inputs(b)[0]).unwrap();

    // the input reads as absent, but the block kept its last computed
    // value and settled successfully
    assert_eq!(registry.input_data(registry.inputs(b)[0]), None);
    assert_eq!(registry.output_data(out_b), Some(&2.0));
    assert_eq!(registry.output_up_to_date(out_b), Some(true));
}

#[test]
fn parameter_edit_plus_trigger_recomputes_downstream() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let b = registry.add_block(AddOne).unwrap();
    let c = registry.add_block(Gain).unwrap();

    registry
        .connect(registry.outputs(a)[0], registry.inputs(b)[0])
        .unwrap();
    registry
        .connect(registry.outputs(b)[0], registry.inputs(c)[0])
        .unwrap();

    registry.set_param(a, "value", 5.0).unwrap();
    // assignment alone recomputes nothing
    assert_eq!(registry.output_data(registry.outputs(b)[0]), Some(&2.0));

    registry.trigger_update(a).unwrap();
    assert_eq!(registry.output_data(registry.outputs(b)[0]), Some(&6.0));
    assert_eq!(registry.output_data(registry.outputs(c)[0]), Some(&6.0));

    registry.set_param(c, "gain", 2.0).unwrap();
    registry.trigger_update(c).unwrap();
    assert_eq!(registry.output_data(registry.outputs(c)[0]), Some(&12.0));
}

#[test]
fn invalid_parameter_values_are_rejected() {
    let mut registry = Registry::new();
    let c = registry.add_block(Gain).unwrap();

    assert!(matches!(
        registry.set_param(c, "gain", 11.0),
        Err(GraphError::Parameter(_))
    ));
    assert!(matches!(
        registry.set_param(c, "volume", 1.0),
        Err(GraphError::Parameter(_))
    ));
    // the declared value is still in place
    assert_eq!(registry.params(c).unwrap().float("gain").unwrap(), 1.0);
}

// =============================================================================
// At-most-once recomputation
// =============================================================================

#[test]
fn diamond_fan_in_fires_the_join_once_per_trigger() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let b = registry.add_block(AddOne).unwrap();
    let c = registry.add_block(AddOne).unwrap();
    let (counted, runs) = Counted::new(Sum2);
    let d = registry.add_block(counted).unwrap();

    registry
        .connect(registry.outputs(a)[0], registry.inputs(b)[0])
        .unwrap();
    registry
        .connect(registry.outputs(a)[0], registry.inputs(c)[0])
        .unwrap();
    registry
        .connect(registry.outputs(b)[0], registry.inputs(d)[0])
        .unwrap();
    registry
        .connect(registry.outputs(c)[0], registry.inputs(d)[1])
        .unwrap();

    assert_eq!(registry.output_data(registry.outputs(d)[0]), Some(&4.0));

    let runs_before = runs.get();
    registry.trigger_update(a).unwrap();

    // d is reachable along two paths but processed exactly once
    assert_eq!(runs.get(), runs_before + 1);
    assert_eq!(registry.output_data(registry.outputs(d)[0]), Some(&4.0));
}

#[test]
fn every_branch_of_the_diamond_fires_once_too() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let (counted_b, runs_b) = Counted::new(AddOne);
    let b = registry.add_block(counted_b).unwrap();
    let (counted_c, runs_c) = Counted::new(AddOne);
    let c = registry.add_block(counted_c).unwrap();
    let d = registry.add_block(Sum2).unwrap();

    registry
        .connect(registry.outputs(a)[0], registry.inputs(b)[0])
        .unwrap();
    registry
        .connect(registry.outputs(a)[0], registry.inputs(c)[0])
        .unwrap();
    registry
        .connect(registry.outputs(b)[0], registry.inputs(d)[0])
        .unwrap();
    registry
        .connect(registry.outputs(c)[0], registry.inputs(d)[1])
        .unwrap();

    let (before_b, before_c) = (runs_b.get(), runs_c.get());
    registry.set_param(a, "value", 10.0).unwrap();
    registry.trigger_update(a).unwrap();

    assert_eq!(runs_b.get(), before_b + 1);
    assert_eq!(runs_c.get(), before_c + 1);
    assert_eq!(registry.output_data(registry.outputs(d)[0]), Some(&22.0));
}

#[test]
fn a_block_without_inputs_updates_unconditionally() {
    let mut registry = Registry::new();
    let (counted, runs) = Counted::new(Constant);
    let a = registry.add_block(counted).unwrap();

    let before = runs.get();
    registry.trigger_update(a).unwrap();
    registry.trigger_update(a).unwrap();

    assert_eq!(runs.get(), before + 2);
}

// =============================================================================
// Settling
// =============================================================================

#[test]
fn settle_is_idempotent_and_forces_output_flags() {
    let mut registry = Registry::new();
    // unconnected input: process leaves the output untouched, yet the
    // settle still marks every output up to date
    let b = registry.add_block(AddOne).unwrap();
    let out = registry.outputs(b)[0];

    registry.trigger_update(b).unwrap();
    assert_eq!(registry.output_data(out), None);
    assert_eq!(registry.output_up_to_date(out), Some(true));

    registry.trigger_update(b).unwrap();
    assert_eq!(registry.output_up_to_date(out), Some(true));
}

#[test]
fn disconnection_is_local_to_the_severed_input() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let b = registry.add_block(AddOne).unwrap();
    let c = registry.add_block(AddOne).unwrap();
    let source = registry.outputs(a)[0];

    registry.connect(source, registry.inputs(b)[0]).unwrap();
    registry.connect(source, registry.inputs(c)[0]).unwrap();

    registry.disconnect_input(registry.inputs(b)[0]).unwrap();

    // c still reads a's data and stays settled
    assert_eq!(registry.connection(registry.inputs(c)[0]), Some(source));
    assert_eq!(registry.input_data(registry.inputs(c)[0]), Some(&1.0));
    assert_eq!(registry.input_up_to_date(registry.inputs(c)[0]), Some(true));
    assert_eq!(registry.output_data(registry.outputs(c)[0]), Some(&2.0));
}

#[test]
fn chain_settles_through_intermediate_blocks() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let b = registry.add_block(AddOne).unwrap();
    let c = registry.add_block(AddOne).unwrap();
    let d = registry.add_block(AddOne).unwrap();

    registry
        .connect(registry.outputs(a)[0], registry.inputs(b)[0])
        .unwrap();
    registry
        .connect(registry.outputs(b)[0], registry.inputs(c)[0])
        .unwrap();
    registry
        .connect(registry.outputs(c)[0], registry.inputs(d)[0])
        .unwrap();

    assert_eq!(registry.output_data(registry.outputs(d)[0]), Some(&4.0));

    registry.set_param(a, "value", 0.0).unwrap();
    registry.trigger_update(a).unwrap();
    assert_eq!(registry.output_data(registry.outputs(d)[0]), Some(&3.0));
}

#[test]
fn removing_an_upstream_block_resettles_consumers() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let b = registry.add_block(AddOne).unwrap();

    registry
        .connect(registry.outputs(a)[0], registry.inputs(b)[0])
        .unwrap();
    assert_eq!(registry.output_data(registry.outputs(b)[0]), Some(&2.0));

    registry.remove_block(a).unwrap();

    // b ran again with an absent input: last data retained, flags settled
    assert_eq!(registry.output_data(registry.outputs(b)[0]), Some(&2.0));
    assert_eq!(registry.output_up_to_date(registry.outputs(b)[0]), Some(true));
}

// =============================================================================
// Failure mid-walk
// =============================================================================

#[test]
fn process_failure_aborts_the_walk_and_leaves_descendants_stale() {
    let mut registry = Registry::new();
    let a = registry.add_block(Constant).unwrap();
    let f = registry.add_block(Faulty).unwrap();
    let g = registry.add_block(AddOne).unwrap();

    registry
        .connect(registry.outputs(a)[0], registry.inputs(f)[0])
        .unwrap();
    registry
        .connect(registry.outputs(f)[0], registry.inputs(g)[0])
        .unwrap();
    assert_eq!(registry.output_data(registry.outputs(g)[0]), Some(&2.0));

    registry.set_param(f, "fail", true).unwrap();
    registry.set_param(a, "value", 7.0).unwrap();
    let err = registry.trigger_update(a).unwrap_err();
    assert!(matches!(err, GraphError::Process { block, .. } if block == f));

    // the walk stopped at f: its outputs and everything beyond stay stale,
    // holding their previous data - an observable, retryable state
    assert_eq!(registry.output_up_to_date(registry.outputs(f)[0]), Some(false));
    assert_eq!(registry.output_up_to_date(registry.outputs(g)[0]), Some(false));
    assert_eq!(registry.output_data(registry.outputs(g)[0]), Some(&2.0));

    // fixing the cause and retrying settles everything
    registry.set_param(f, "fail", false).unwrap();
    registry.trigger_update(f).unwrap();
    assert_eq!(registry.output_up_to_date(registry.outputs(f)[0]), Some(true));
    assert_eq!(registry.output_up_to_date(registry.outputs(g)[0]), Some(true));
    assert_eq!(registry.output_data(registry.outputs(g)[0]), Some(&8.0));
}

#[test]
fn failing_block_is_rejected_at_registration() {
    let mut registry = Registry::new();

    struct BornBroken;
    impl block_flow::Block<f64> for BornBroken {
        fn setup_io(&mut self, io: &mut block_flow::IoSpec) {
            io.output("out");
        }
        fn process(
            &mut self,
            _scope: &mut block_flow::ProcessScope<'_, f64>,
        ) -> anyhow::Result<()> {
            anyhow::bail!("broken from the start")
        }
    }

    let err = registry.add_block(BornBroken).unwrap_err();
    assert!(matches!(err, GraphError::Process { .. }));
    // the failed registration left nothing behind
    assert_eq!(registry.block_count(), 0);
    assert_eq!(registry.node_count(), 0);
}
