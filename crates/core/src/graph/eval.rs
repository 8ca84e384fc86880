use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use rand::Rng;

use crate::error::GraphError;
use crate::graph::{GraphState, Node, NodeId, Op, VarId};
use crate::model::Tensor;

/// Per-node timing captured when tracing is requested.
#[derive(Debug, Clone)]
pub(crate) struct NodeTiming {
    pub(crate) node: String,
    pub(crate) op: &'static str,
    pub(crate) elapsed_ns: u64,
}

/// Outcome of one evaluation pass.
pub(crate) struct Pass {
    pub(crate) values: Vec<Tensor>,
    pub(crate) executed: Vec<String>,
    pub(crate) timings: Vec<NodeTiming>,
}

/// Evaluate `fetches` over `graph`, reading and writing variable values in `store`.
///
/// Only the transitive inputs of the fetches are computed. Fed nodes are taken
/// as given and their inputs are not visited.
pub(crate) fn evaluate<R: Rng + ?Sized>(
    graph: &GraphState,
    fetches: &[NodeId],
    feeds: &HashMap<NodeId, Tensor>,
    store: &mut HashMap<VarId, Tensor>,
    rng: &mut R,
    trace: bool,
) -> Result<Pass, GraphError> {
    let mut needed = BTreeSet::new();
    let mut stack: Vec<NodeId> = fetches.to_vec();
    while let Some(id) = stack.pop() {
        if id.0 >= graph.nodes.len() {
            return Err(GraphError::ForeignExpr { node: id.0 });
        }
        if !needed.insert(id) || feeds.contains_key(&id) {
            continue;
        }
        stack.extend(graph.nodes[id.0].inputs.iter().copied());
    }

    let mut values: HashMap<NodeId, Tensor> = HashMap::with_capacity(needed.len());
    let mut executed = Vec::with_capacity(needed.len());
    let mut timings = Vec::new();

    for id in needed {
        let node = &graph.nodes[id.0];
        if let Some(fed) = feeds.get(&id) {
            values.insert(id, fed.clone());
            continue;
        }
        let started = trace.then(Instant::now);
        let value = match &node.op {
            Op::Placeholder => {
                return Err(GraphError::MissingFeed { placeholder: node.name.clone() });
            }
            Op::Constant(t) => t.clone(),
            Op::Read(var) => store
                .get(var)
                .cloned()
                .ok_or_else(|| GraphError::UninitializedVariable { name: var_name(graph, *var) })?,
            Op::Add => arg(&values, node, 0)?.add(arg(&values, node, 1)?)?,
            Op::Sub => arg(&values, node, 0)?.sub(arg(&values, node, 1)?)?,
            Op::Mul => arg(&values, node, 0)?.mul(arg(&values, node, 1)?)?,
            Op::Equal => arg(&values, node, 0)?.equal(arg(&values, node, 1)?)?,
            Op::RandomUniform { shape, low, high } => Tensor::uniform(shape, *low, *high, rng),
            Op::Assign(var) => {
                let value = arg(&values, node, 0)?.clone();
                store.insert(*var, value.clone());
                value
            }
            Op::Initialize(var) => {
                let def = &graph.variables[var.0];
                let value = def.init.sample(&def.shape, rng);
                store.insert(*var, value.clone());
                value
            }
            Op::Group => Tensor::empty(),
        };
        if let Some(started) = started {
            timings.push(NodeTiming {
                node: node.name.clone(),
                op: node.op.kind(),
                elapsed_ns: started.elapsed().as_nanos() as u64,
            });
        }
        executed.push(node.name.clone());
        values.insert(id, value);
    }

    let values = fetches
        .iter()
        .map(|id| values.get(id).cloned().ok_or(GraphError::ForeignExpr { node: id.0 }))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pass { values, executed, timings })
}

fn arg<'v>(
    values: &'v HashMap<NodeId, Tensor>,
    node: &Node,
    index: usize,
) -> Result<&'v Tensor, GraphError> {
    let id = node.inputs.get(index).copied().unwrap_or(NodeId(usize::MAX));
    values.get(&id).ok_or(GraphError::ForeignExpr { node: id.0 })
}

fn var_name(graph: &GraphState, var: VarId) -> String {
    graph.variables.get(var.0).map(|v| v.name.clone()).unwrap_or_else(|| format!("var#{}", var.0))
}
