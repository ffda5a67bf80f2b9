//! Concrete blocks used by the integration tests. These play the role of
//! the application's signal-processing blocks: they only talk to the engine
//! through the `Block` contract.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use block_flow::{Block, IoSpec, Param, ParamSet, ProcessScope};

/// Source block: one output carrying the `value` parameter.
pub struct Constant;

impl Block<f64> for Constant {
    fn setup_io(&mut self, io: &mut IoSpec) {
        io.output("out");
    }

    fn setup_parameters(&mut self, params: &mut ParamSet) {
        params.declare("value", Param::new(1.0));
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        let value = scope.params().float("value")?;
        scope.set_output(0, value);
        Ok(())
    }

    fn type_name(&self) -> &str {
        "constant"
    }
}

/// One input, one output, `out = in + 1`. Leaves its output untouched when
/// the input carries no data, so the last computed value stays visible.
pub struct AddOne;

impl Block<f64> for AddOne {
    fn setup_io(&mut self, io: &mut IoSpec) {
        io.input("in").output("out");
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        if let Some(&x) = scope.input(0) {
            scope.set_output(0, x + 1.0);
        }
        Ok(())
    }

    fn type_name(&self) -> &str {
        "add-one"
    }
}

/// One input, one output, `out = in * gain`.
pub struct Gain;

impl Block<f64> for Gain {
    fn setup_io(&mut self, io: &mut IoSpec) {
        io.input("in").output("out");
    }

    fn setup_parameters(&mut self, params: &mut ParamSet) {
        params.declare("gain", Param::new(1.0).bounded(0.0, 10.0));
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        let gain = scope.params().float("gain")?;
        if let Some(&x) = scope.input(0) {
            scope.set_output(0, x * gain);
        }
        Ok(())
    }

    fn type_name(&self) -> &str {
        "gain"
    }
}

/// Two fixed inputs, `sum = a + b` once both are present.
pub struct Sum2;

impl Block<f64> for Sum2 {
    fn setup_io(&mut self, io: &mut IoSpec) {
        io.input("a").input("b").output("sum");
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        if let (Some(&a), Some(&b)) = (scope.input(0), scope.input(1)) {
            scope.set_output(0, a + b);
        }
        Ok(())
    }

    fn type_name(&self) -> &str {
        "sum2"
    }
}

/// Dynamic-input summer: between one and three inputs, one output holding
/// the sum of whatever inputs carry data.
pub struct DynSum;

impl Block<f64> for DynSum {
    fn setup_io(&mut self, io: &mut IoSpec) {
        io.input("in0").output("sum").dynamic_inputs(1, Some(3));
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        let mut sum = 0.0;
        let mut any = false;
        for index in 0..scope.input_count() {
            if let Some(&x) = scope.input(index) {
                sum += x;
                any = true;
            }
        }
        if any {
            scope.set_output(0, sum);
        }
        Ok(())
    }

    fn type_name(&self) -> &str {
        "sum"
    }
}

/// One input copied onto a dynamic list of outputs (one to four).
pub struct Splitter;

impl Block<f64> for Splitter {
    fn setup_io(&mut self, io: &mut IoSpec) {
        io.input("in").output("out0").dynamic_outputs(1, Some(4));
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        if let Some(&x) = scope.input(0) {
            for index in 0..scope.output_count() {
                scope.set_output(index, x);
            }
        }
        Ok(())
    }

    fn type_name(&self) -> &str {
        "splitter"
    }
}

/// Pass-through that fails on demand: set the `fail` parameter and the next
/// `process` returns an error.
pub struct Faulty;

impl Block<f64> for Faulty {
    fn setup_io(&mut self, io: &mut IoSpec) {
        io.input("in").output("out");
    }

    fn setup_parameters(&mut self, params: &mut ParamSet) {
        params.declare("fail", Param::new(false));
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        if scope.params().bool("fail")? {
            anyhow::bail!("refusing to process");
        }
        if let Some(&x) = scope.input(0) {
            scope.set_output(0, x);
        }
        Ok(())
    }

    fn type_name(&self) -> &str {
        "faulty"
    }
}

/// Wraps any block and counts how often `process` actually ran.
pub struct Counted<B> {
    inner: B,
    runs: Rc<Cell<usize>>,
}

impl<B> Counted<B> {
    pub fn new(inner: B) -> (Self, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        (
            Self {
                inner,
                runs: Rc::clone(&runs),
            },
            runs,
        )
    }
}

impl<B: Block<f64>> Block<f64> for Counted<B> {
    fn setup_io(&mut self, io: &mut IoSpec) {
        self.inner.setup_io(io);
    }

    fn setup_parameters(&mut self, params: &mut ParamSet) {
        self.inner.setup_parameters(params);
    }

    fn process(&mut self, scope: &mut ProcessScope<'_, f64>) -> anyhow::Result<()> {
        self.runs.set(self.runs.get() + 1);
        self.inner.process(scope)
    }

    fn type_name(&self) -> &str {
        self.inner.type_name()
    }
}
