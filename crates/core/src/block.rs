//! Block construction.
//!
//! A [`Block`] is built exactly once from a logic, its resolved arguments and
//! a scope. Building materializes the arguments as graph nodes, invokes the
//! logic through a [`Builder`], checks the output contract and freezes the
//! returned record's field order as the block's output ordering.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::args::{bind, ArgValue, Bound, CallArgs, ResolvedArguments};
use crate::error::{BloxError, BloxResult, GraphError};
use crate::graph::{Expr, Graph, Initializer, Variable};
use crate::logic::{Logic, Returned};
use crate::model::Tensor;
use crate::scope::Scope;
use crate::services::backends::SESSION_BACKEND;
use crate::services::binding::Backend;

/// Construction context handed to a logic while its block is being built.
///
/// Every node is named under the builder's scope. Variables are created, or
/// looked up when the scope is a reuse alias, and recorded as the block's state.
pub struct Builder {
    scope: Scope,
    state: Vec<Variable>,
}

impl Builder {
    pub fn new(scope: Scope) -> Self {
        Self { scope, state: Vec::new() }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn graph(&self) -> &Graph {
        self.scope.graph()
    }

    pub fn placeholder(&self, name: &str) -> BloxResult<Expr> {
        Ok(self.graph().placeholder(&self.scope.join(name))?)
    }

    pub fn constant(&self, name: &str, value: impl Into<Tensor>) -> BloxResult<Expr> {
        Ok(self.graph().constant(&self.scope.join(name), value)?)
    }

    pub fn add(&self, name: &str, a: Expr, b: Expr) -> BloxResult<Expr> {
        Ok(self.graph().add(&self.scope.join(name), a, b)?)
    }

    pub fn sub(&self, name: &str, a: Expr, b: Expr) -> BloxResult<Expr> {
        Ok(self.graph().sub(&self.scope.join(name), a, b)?)
    }

    pub fn mul(&self, name: &str, a: Expr, b: Expr) -> BloxResult<Expr> {
        Ok(self.graph().mul(&self.scope.join(name), a, b)?)
    }

    pub fn random_uniform(&self, name: &str, shape: &[usize], low: f64, high: f64) -> BloxResult<Expr> {
        Ok(self.graph().random_uniform(&self.scope.join(name), shape, low, high)?)
    }

    pub fn assign(&self, var: &Variable, value: Expr) -> BloxResult<Expr> {
        Ok(self.graph().assign(var, value)?)
    }

    /// Declare learnable state named `name` in this scope.
    ///
    /// Under a reuse scope the existing variable is returned instead; it must
    /// exist and have the same shape.
    pub fn variable(&mut self, name: &str, shape: &[usize], init: Initializer) -> BloxResult<Variable> {
        let path = self.scope.join(name);
        let var = if self.scope.is_reuse() {
            let existing = self
                .graph()
                .variable(&path)
                .ok_or_else(|| BloxError::NothingToReuse { path: path.clone() })?;
            if existing.shape() != shape {
                return Err(BloxError::StateShapeMismatch {
                    target_scope: self.scope.absolute_path().to_string(),
                    source_scope: path,
                    reason: format!(
                        "reused variable has shape {:?}, requested {:?}",
                        existing.shape(),
                        shape
                    ),
                });
            }
            existing
        } else {
            self.graph().create_variable(&path, shape, init)?
        };
        self.state.push(var.clone());
        Ok(var)
    }

    /// Run `f` inside the nested scope `name`; its state is recorded here too.
    pub fn within<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Builder) -> BloxResult<R>,
    ) -> BloxResult<R> {
        let scope = self.scope.enter(name, self.scope.is_reuse())?;
        let mut nested = Builder::new(scope);
        let result = f(&mut nested);
        self.state.append(&mut nested.state);
        result
    }

    fn materialize(&self, args: &ResolvedArguments) -> BloxResult<Inputs> {
        let mut named = Vec::with_capacity(args.entries().len());
        let mut dynamic = Vec::new();
        for (name, bound) in args.entries() {
            let expr = match bound {
                Bound::Value(ArgValue::Expr(expr)) => {
                    if !self.graph().contains(*expr) {
                        return Err(GraphError::ForeignExpr { node: expr.node_id().0 }.into());
                    }
                    *expr
                }
                Bound::Value(ArgValue::Tensor(value)) => self.constant(name, value.clone())?,
                Bound::Deferred => {
                    let placeholder = self.placeholder(name)?;
                    dynamic.push(placeholder);
                    placeholder
                }
            };
            named.push((name.clone(), expr));
        }
        Ok(Inputs { named, dynamic })
    }
}

/// Materialized inputs of a block, mirroring its resolved arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    named: Vec<(String, Expr)>,
    dynamic: Vec<Expr>,
}

impl Inputs {
    pub fn get(&self, name: &str) -> Option<Expr> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, e)| *e)
    }

    /// Like [`Inputs::get`], failing with `SignatureMismatch` for unknown names.
    pub fn expr(&self, logic: &str, name: &str) -> BloxResult<Expr> {
        self.get(name).ok_or_else(|| BloxError::SignatureMismatch {
            logic: logic.to_string(),
            reason: format!("no parameter named `{name}`"),
        })
    }

    pub fn named(&self) -> &[(String, Expr)] {
        &self.named
    }

    pub fn names(&self) -> Vec<&str> {
        self.named.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Placeholders of deferred parameters, in declaration order.
    pub fn dynamic(&self) -> &[Expr] {
        &self.dynamic
    }
}

/// Ordered, named outputs of a built block.
#[derive(Debug, Clone)]
pub struct Outputs {
    names: Arc<[String]>,
    exprs: Vec<Expr>,
}

impl Default for Outputs {
    fn default() -> Self {
        Self { names: Arc::from(Vec::new()), exprs: Vec::new() }
    }
}

impl Outputs {
    /// Enforce the output contract on what a logic returned.
    fn from_returned(logic: &str, graph: &Graph, returned: Returned) -> BloxResult<Self> {
        let violation = |found: String| BloxError::InvalidOutputContract {
            logic: logic.to_string(),
            found,
        };
        let out = match returned {
            Returned::Record(out) if !out.is_empty() => out,
            other => return Err(violation(other.describe())),
        };
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(out.len());
        let mut exprs = Vec::with_capacity(out.len());
        for (name, expr) in out.into_fields() {
            if !seen.insert(name.clone()) {
                return Err(violation(format!("an `Out` record with duplicate field `{name}`")));
            }
            if !graph.contains(expr) {
                return Err(GraphError::ForeignExpr { node: expr.node_id().0 }.into());
            }
            names.push(name);
            exprs.push(expr);
        }
        Ok(Self { names: Arc::from(names), exprs })
    }

    pub fn get(&self, name: &str) -> Option<Expr> {
        self.names.iter().position(|n| n == name).map(|i| self.exprs[i])
    }

    /// Outputs in the order the logic's record declared them.
    pub fn ordered(&self) -> &[Expr] {
        &self.exprs
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn shared_names(&self) -> Arc<[String]> {
        Arc::clone(&self.names)
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Expr)> + '_ {
        self.names.iter().map(String::as_str).zip(self.exprs.iter().copied())
    }
}

/// A built (or buildable) computation block.
pub struct Block {
    logic: Arc<dyn Logic>,
    args: ResolvedArguments,
    scope: Scope,
    inputs: Inputs,
    outputs: Outputs,
    state: Vec<Variable>,
    pub(crate) backend: Option<Arc<dyn Backend>>,
    pub(crate) backend_type: String,
    built: bool,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("logic", &self.logic.signature().name())
            .field("scope", &self.scope)
            .field("outputs", &self.outputs.names())
            .field("state", &self.state.len())
            .field("backend", &self.backend.as_ref().map(|b| b.backend_type().to_string()))
            .field("built", &self.built)
            .finish()
    }
}

impl Block {
    /// An unbuilt block; `args` must have been bound against `logic`'s signature.
    pub fn new(logic: Arc<dyn Logic>, args: ResolvedArguments, scope: Scope) -> BloxResult<Self> {
        let signature = logic.signature();
        let declared: Vec<&str> = signature.params().iter().map(|p| p.name.as_str()).collect();
        if args.logic() != signature.name() || args.names() != declared {
            return Err(BloxError::SignatureMismatch {
                logic: signature.name().to_string(),
                reason: format!(
                    "resolved arguments for `{}` ({}) do not match parameters ({})",
                    args.logic(),
                    args.names().join(", "),
                    declared.join(", ")
                ),
            });
        }
        Ok(Self {
            logic,
            args,
            scope,
            inputs: Inputs::default(),
            outputs: Outputs::default(),
            state: Vec::new(),
            backend: None,
            backend_type: SESSION_BACKEND.to_string(),
            built: false,
        })
    }

    /// Construct the block's graph artifacts. A no-op once built.
    pub fn build(&mut self) -> BloxResult<&mut Self> {
        if self.built {
            debug!(block = %self.name(), "block already built");
            return Ok(self);
        }
        let mut builder = Builder::new(self.scope.clone());
        let inputs = builder.materialize(&self.args)?;
        let returned = self.logic.call(&mut builder, &inputs)?;
        let outputs = Outputs::from_returned(self.name(), self.scope.graph(), returned)?;

        debug!(
            block = %self.name(),
            scope = %self.scope.absolute_path(),
            outputs = outputs.len(),
            state = builder.state.len(),
            "built block"
        );
        self.inputs = inputs;
        self.outputs = outputs;
        self.state = builder.state;
        self.built = true;
        Ok(self)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Logic name.
    pub fn name(&self) -> &str {
        self.logic.signature().name()
    }

    pub fn logic(&self) -> &Arc<dyn Logic> {
        &self.logic
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn graph(&self) -> &Graph {
        self.scope.graph()
    }

    pub fn arguments(&self) -> &ResolvedArguments {
        &self.args
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn dynamic_inputs(&self) -> &[Expr] {
        self.inputs.dynamic()
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<Expr> {
        self.outputs.get(name)
    }

    /// State handles declared while building, in declaration order.
    pub fn variables(&self) -> &[Variable] {
        &self.state
    }

    /// Backend type `attach` accepts; defaults to the session backend.
    pub fn expect_backend(&mut self, backend_type: impl Into<String>) -> &mut Self {
        self.backend_type = backend_type.into();
        self
    }

    pub(crate) fn ensure_built(&self) -> BloxResult<()> {
        if !self.built {
            return Err(BloxError::NotBuilt { block: self.name().to_string() });
        }
        Ok(())
    }
}

/// Build a block from `logic` and `args` inside `scope`.
pub fn build(logic: Arc<dyn Logic>, args: ResolvedArguments, scope: Scope) -> BloxResult<Block> {
    let mut block = Block::new(logic, args, scope)?;
    block.build()?;
    Ok(block)
}

/// Per-instantiation properties of a block.
#[derive(Clone, Default)]
pub struct BlockProps {
    pub scope_name: Option<String>,
    pub reuse: bool,
    pub backend: Option<Arc<dyn Backend>>,
    pub backend_type: Option<String>,
}

impl BlockProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = Some(name.into());
        self
    }

    pub fn reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn backend_type(mut self, backend_type: impl Into<String>) -> Self {
        self.backend_type = Some(backend_type.into());
        self
    }
}

/// A logic ready to be stamped into blocks.
#[derive(Clone)]
pub struct Mold {
    logic: Arc<dyn Logic>,
}

impl Mold {
    pub fn new(logic: impl Logic + 'static) -> Self {
        Self { logic: Arc::new(logic) }
    }

    pub fn shared(logic: Arc<dyn Logic>) -> Self {
        Self { logic }
    }

    pub fn logic(&self) -> &Arc<dyn Logic> {
        &self.logic
    }

    /// Bind `call`, enter the block's scope under `parent`, build, and attach
    /// the backend from `props` when one is given.
    ///
    /// The scope is registered before building. A build that fails leaves the
    /// scope and whatever the logic created in it behind, so a retry must use
    /// another scope name.
    pub fn instantiate(&self, parent: &Scope, props: BlockProps, call: CallArgs) -> BloxResult<Block> {
        let args = bind(self.logic.signature(), call)?;
        let scope_name = props.scope_name.as_deref().unwrap_or(self.logic.signature().name());
        let scope = parent.enter(scope_name, props.reuse)?;
        let mut block = Block::new(Arc::clone(&self.logic), args, scope)?;
        if let Some(backend_type) = props.backend_type {
            block.expect_backend(backend_type);
        }
        block.build()?;
        if let Some(backend) = props.backend {
            block.attach(backend)?;
        }
        Ok(block)
    }
}
