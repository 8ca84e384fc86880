//! Minimal dataflow graph engine.
//!
//! A [`Graph`] is an append-only list of named nodes plus a registry of
//! variables and namespace entries. Graph handles are cheap to clone and share
//! the same underlying storage; node inputs must already exist in the same
//! graph, so node ids are always topologically ordered.
//!
//! Variable *values* never live here: each backend keeps its own store keyed by
//! [`VarId`], so a [`Variable`] is only an index into that storage.

pub(crate) mod eval;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::model::Tensor;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique graph identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

/// Handle to a node's output inside a specific graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Expr {
    graph: GraphId,
    node: NodeId,
}

impl Expr {
    pub fn graph_id(&self) -> GraphId {
        self.graph
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }
}

/// How a variable obtains its first value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    #[default]
    Zeros,
    Ones,
    Constant(f64),
    Uniform {
        low: f64,
        high: f64,
    },
}

/// True when every element of `[low, high)` can be sampled.
pub fn is_sampleable(low: f64, high: f64) -> bool {
    low.is_finite() && high.is_finite() && (high - low).is_finite()
}

impl Initializer {
    pub fn sample<R: Rng + ?Sized>(&self, shape: &[usize], rng: &mut R) -> Tensor {
        match self {
            Initializer::Zeros => Tensor::zeros(shape),
            Initializer::Ones => Tensor::filled(shape, 1.0),
            Initializer::Constant(value) => Tensor::filled(shape, *value),
            Initializer::Uniform { low, high } => Tensor::uniform(shape, *low, *high, rng),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Placeholder,
    Constant(Tensor),
    Read(VarId),
    Add,
    Sub,
    Mul,
    Equal,
    RandomUniform { shape: Vec<usize>, low: f64, high: f64 },
    /// Writes input 0 into the variable and yields the written value.
    Assign(VarId),
    /// Samples the variable's initializer into the store.
    Initialize(VarId),
    /// Forces evaluation of its inputs; yields an empty tensor.
    Group,
}

impl Op {
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Placeholder => "Placeholder",
            Op::Constant(_) => "Const",
            Op::Read(_) => "Read",
            Op::Add => "Add",
            Op::Sub => "Sub",
            Op::Mul => "Mul",
            Op::Equal => "Equal",
            Op::RandomUniform { .. } => "RandomUniform",
            Op::Assign(_) => "Assign",
            Op::Initialize(_) => "Initialize",
            Op::Group => "NoOp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub op: Op,
    pub inputs: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct VariableDef {
    pub(crate) name: String,
    pub(crate) shape: Vec<usize>,
    pub(crate) init: Initializer,
}

/// Handle to learnable state registered in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    id: VarId,
    name: String,
    shape: Vec<usize>,
    value: Expr,
}

impl Variable {
    pub fn id(&self) -> VarId {
        self.id
    }

    /// Fully-qualified name, e.g. `foo/counter`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Expression reading the variable's current value.
    pub fn value(&self) -> Expr {
        self.value
    }
}

#[derive(Default)]
pub(crate) struct GraphState {
    pub(crate) nodes: Vec<Node>,
    pub(crate) variables: Vec<VariableDef>,
    var_handles: Vec<Variable>,
    var_index: HashMap<String, VarId>,
    taken: HashSet<String>,
    suffixes: HashMap<String, usize>,
    scopes: BTreeSet<String>,
}

impl GraphState {
    fn unique_name(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let counter = self.suffixes.entry(base.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{base}_{counter}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

struct GraphInner {
    id: GraphId,
    state: RwLock<GraphState>,
}

/// Shared handle to a dataflow graph.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph").field("id", &self.inner.id).field("nodes", &self.len()).finish()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        let id = GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed));
        Self { inner: Arc::new(GraphInner { id, state: RwLock::new(GraphState::default()) }) }
    }

    pub fn id(&self) -> GraphId {
        self.inner.id
    }

    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        f(&self.read())
    }

    /// True when `expr` was created by this graph.
    pub fn contains(&self, expr: Expr) -> bool {
        expr.graph == self.inner.id && expr.node.0 < self.len()
    }

    pub fn node_name(&self, expr: Expr) -> Option<String> {
        if expr.graph != self.inner.id {
            return None;
        }
        self.read().nodes.get(expr.node.0).map(|n| n.name.clone())
    }

    pub fn node_op(&self, expr: Expr) -> Option<Op> {
        if expr.graph != self.inner.id {
            return None;
        }
        self.read().nodes.get(expr.node.0).map(|n| n.op.clone())
    }

    /// Names of every node matching `pattern`, in creation order.
    pub fn node_names_matching(&self, pattern: &Regex) -> Vec<String> {
        self.read().nodes.iter().filter(|n| pattern.is_match(&n.name)).map(|n| n.name.clone()).collect()
    }

    /// Append a node; the name is made unique within the graph.
    pub fn add_node(&self, name: &str, op: Op, inputs: &[Expr]) -> Result<Expr, GraphError> {
        let mut state = self.write();
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            if input.graph != self.inner.id || input.node.0 >= state.nodes.len() {
                return Err(GraphError::ForeignExpr { node: input.node.0 });
            }
            ids.push(input.node);
        }
        let name = state.unique_name(name);
        let node = NodeId(state.nodes.len());
        state.nodes.push(Node { name, op, inputs: ids });
        Ok(Expr { graph: self.inner.id, node })
    }

    pub fn placeholder(&self, name: &str) -> Result<Expr, GraphError> {
        self.add_node(name, Op::Placeholder, &[])
    }

    pub fn constant(&self, name: &str, value: impl Into<Tensor>) -> Result<Expr, GraphError> {
        self.add_node(name, Op::Constant(value.into()), &[])
    }

    pub fn add(&self, name: &str, a: Expr, b: Expr) -> Result<Expr, GraphError> {
        self.add_node(name, Op::Add, &[a, b])
    }

    pub fn sub(&self, name: &str, a: Expr, b: Expr) -> Result<Expr, GraphError> {
        self.add_node(name, Op::Sub, &[a, b])
    }

    pub fn mul(&self, name: &str, a: Expr, b: Expr) -> Result<Expr, GraphError> {
        self.add_node(name, Op::Mul, &[a, b])
    }

    pub fn equal(&self, name: &str, a: Expr, b: Expr) -> Result<Expr, GraphError> {
        self.add_node(name, Op::Equal, &[a, b])
    }

    pub fn random_uniform(
        &self,
        name: &str,
        shape: &[usize],
        low: f64,
        high: f64,
    ) -> Result<Expr, GraphError> {
        if !is_sampleable(low, high) {
            return Err(GraphError::InvalidRange { name: name.to_string(), low, high });
        }
        self.add_node(name, Op::RandomUniform { shape: shape.to_vec(), low, high }, &[])
    }

    /// Node that writes `value` into `var` when evaluated.
    pub fn assign(&self, var: &Variable, value: Expr) -> Result<Expr, GraphError> {
        self.add_node(&format!("{}/Assign", var.name), Op::Assign(var.id), &[value])
    }

    pub fn group(&self, name: &str, deps: &[Expr]) -> Result<Expr, GraphError> {
        self.add_node(name, Op::Group, deps)
    }

    /// Group node running the initializer of every variable in `vars`.
    pub fn initializer(&self, vars: &[Variable]) -> Result<Expr, GraphError> {
        let mut inits = Vec::with_capacity(vars.len());
        for var in vars {
            inits.push(self.add_node(&format!("{}/Initialize", var.name), Op::Initialize(var.id), &[])?);
        }
        self.group("init", &inits)
    }

    /// Register a new variable named `name` (already scope-qualified).
    pub fn create_variable(
        &self,
        name: &str,
        shape: &[usize],
        init: Initializer,
    ) -> Result<Variable, GraphError> {
        if let Initializer::Uniform { low, high } = &init {
            if !is_sampleable(*low, *high) {
                return Err(GraphError::InvalidRange { name: name.to_string(), low: *low, high: *high });
            }
        }
        let mut state = self.write();
        if state.var_index.contains_key(name) {
            return Err(GraphError::DuplicateVariable { name: name.to_string() });
        }
        let id = VarId(state.variables.len());
        let node_name = state.unique_name(name);
        let node = NodeId(state.nodes.len());
        state.nodes.push(Node { name: node_name, op: Op::Read(id), inputs: Vec::new() });
        state.variables.push(VariableDef { name: name.to_string(), shape: shape.to_vec(), init });
        let handle = Variable {
            id,
            name: name.to_string(),
            shape: shape.to_vec(),
            value: Expr { graph: self.inner.id, node },
        };
        state.var_handles.push(handle.clone());
        state.var_index.insert(name.to_string(), id);
        Ok(handle)
    }

    /// Look up an existing variable by its fully-qualified name.
    pub fn variable(&self, name: &str) -> Option<Variable> {
        let state = self.read();
        state.var_index.get(name).map(|id| state.var_handles[id.0].clone())
    }

    /// All variables, in declaration order.
    pub fn variables(&self) -> Vec<Variable> {
        self.read().var_handles.clone()
    }

    /// Variables whose names match `pattern`, in declaration order.
    pub fn variables_matching(&self, pattern: &Regex) -> Vec<Variable> {
        self.read().var_handles.iter().filter(|v| pattern.is_match(&v.name)).cloned().collect()
    }

    /// Record a namespace entry. Returns `false` when it already existed.
    pub(crate) fn register_scope(&self, path: &str) -> bool {
        self.write().scopes.insert(path.to_string())
    }

    pub fn has_scope(&self, path: &str) -> bool {
        self.read().scopes.contains(path)
    }

    /// Every registered namespace path, sorted.
    pub fn scopes(&self) -> Vec<String> {
        self.read().scopes.iter().cloned().collect()
    }
}
