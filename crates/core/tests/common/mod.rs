// Shared fixtures for blox-core integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use blox_core::{
    Block, BlockProps, BloxResult, Builder, CallArgs, Expr, Graph, Initializer, Inputs, Logic,
    Mold, Out, Returned, Scope, Session, Signature,
};

/// `foo(x: dynamic, bias, scale = 1.0)`:
/// - `b`: fresh uniform sample per run
/// - `a`: `counter + x`
/// - `c`: `weights * scale + bias`
pub struct FooLogic {
    signature: Signature,
    bare: bool,
    seen: Mutex<Vec<(String, Expr)>>,
}

impl FooLogic {
    pub fn new() -> Self {
        Self::with_contract(false)
    }

    /// Same computation, but answers with a bare value instead of an `Out` record.
    pub fn bad() -> Self {
        Self::with_contract(true)
    }

    fn with_contract(bare: bool) -> Self {
        Self {
            signature: Signature::new("foo").dynamic("x").required("bias").optional("scale", 1.0),
            bare,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Inputs the logic received on its last call.
    pub fn seen(&self) -> Vec<(String, Expr)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Logic for FooLogic {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, builder: &mut Builder, inputs: &Inputs) -> BloxResult<Returned> {
        *self.seen.lock().unwrap() = inputs.named().to_vec();
        let x = inputs.expr("foo", "x")?;
        let bias = inputs.expr("foo", "bias")?;
        let scale = inputs.expr("foo", "scale")?;

        let counter =
            builder.variable("counter", &[], Initializer::Uniform { low: 0.0, high: 1.0 })?;
        let weights =
            builder.variable("weights", &[3], Initializer::Uniform { low: -1.0, high: 1.0 })?;

        let a = builder.add("a", counter.value(), x)?;
        if self.bare {
            return Ok(a.into());
        }
        let b = builder.random_uniform("b", &[], 0.0, 1.0)?;
        let scaled = builder.mul("scaled", weights.value(), scale)?;
        let c = builder.add("c", scaled, bias)?;
        Ok(Out::new().with("b", b).with("a", a).with("c", c).into())
    }
}

pub fn foo_call() -> CallArgs {
    CallArgs::new().named("bias", 0.5)
}

pub fn create_block(graph: &Graph, props: BlockProps) -> BloxResult<Block> {
    Mold::new(FooLogic::new()).instantiate(&Scope::root(graph), props, foo_call())
}

pub fn create_bad_block(graph: &Graph, props: BlockProps) -> BloxResult<Block> {
    Mold::new(FooLogic::bad()).instantiate(&Scope::root(graph), props, foo_call())
}

/// A built foo block attached to an initialized session over `graph`.
pub fn ready_block(graph: &Graph) -> (Block, Arc<Session>) {
    let session = Arc::new(Session::new(graph));
    let block = create_block(graph, BlockProps::new().backend(session.clone())).unwrap();
    session.initialize(block.variables()).unwrap();
    (block, session)
}

pub fn scalar(values: &blox_core::OrderedValues, name: &str) -> f64 {
    values.scalar(name).unwrap_or_else(|| panic!("output `{name}` is not a scalar"))
}
