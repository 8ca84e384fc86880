use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::BloxConfig;
use crate::error::{BloxResult, GraphError};
use crate::graph::eval::{self, Pass};
use crate::graph::{Expr, Graph, NodeId, VarId, Variable};
use crate::model::Tensor;
use crate::services::binding::{Backend, Directives, PartitionGraph, RunMetadata, StepStat};

/// Type identity reported by [`Session`].
pub const SESSION_BACKEND: &str = "session";

const DEVICE: &str = "cpu:0";

struct SessionState {
    store: HashMap<VarId, Tensor>,
    rng: StdRng,
}

/// Graph-evaluating backend.
///
/// A session borrows a graph handle and owns the values of that graph's
/// variables. Two sessions over the same graph hold independent values.
pub struct Session {
    graph: Graph,
    state: Mutex<SessionState>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("graph", &self.graph).finish()
    }
}

impl Session {
    pub fn new(graph: &Graph) -> Self {
        Self::with_rng(graph, StdRng::from_entropy())
    }

    /// Session whose random ops and initializers are reproducible.
    pub fn with_seed(graph: &Graph, seed: u64) -> Self {
        Self::with_rng(graph, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(graph: &Graph, config: &BloxConfig) -> Self {
        match config.seed {
            Some(seed) => Self::with_seed(graph, seed),
            None => Self::new(graph),
        }
    }

    /// Session over a fresh, empty graph.
    pub fn detached() -> Self {
        Self::new(&Graph::new())
    }

    fn with_rng(graph: &Graph, rng: StdRng) -> Self {
        Self { graph: graph.clone(), state: Mutex::new(SessionState { store: HashMap::new(), rng }) }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sample initial values for `vars`.
    pub fn initialize(&self, vars: &[Variable]) -> Result<(), GraphError> {
        if vars.is_empty() {
            return Ok(());
        }
        let init = self.graph.initializer(vars)?;
        self.run(&[init], &[])?;
        Ok(())
    }

    /// Current value of `var` in this session.
    pub fn value(&self, var: &Variable) -> Result<Tensor, GraphError> {
        self.run(&[var.value()], &[])?
            .pop()
            .ok_or(GraphError::UninitializedVariable { name: var.name().to_string() })
    }

    pub fn is_initialized(&self, var: &Variable) -> bool {
        self.lock().store.contains_key(&var.id())
    }

    pub fn run(&self, fetches: &[Expr], feeds: &[(Expr, Tensor)]) -> Result<Vec<Tensor>, GraphError> {
        self.run_with(fetches, feeds, None, None)
    }

    pub fn run_with(
        &self,
        fetches: &[Expr],
        feeds: &[(Expr, Tensor)],
        directives: Option<&Directives>,
        metadata: Option<&mut RunMetadata>,
    ) -> Result<Vec<Tensor>, GraphError> {
        if self.graph.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        let fetch_ids = fetches.iter().map(|e| self.node_of(*e)).collect::<Result<Vec<_>, _>>()?;
        let mut fed = HashMap::with_capacity(feeds.len());
        for (expr, value) in feeds {
            fed.insert(self.node_of(*expr)?, value.clone());
        }
        let trace = directives.is_some_and(|d| d.trace);

        let Pass { values, executed, timings } = {
            let mut guard = self.lock();
            let SessionState { store, rng } = &mut *guard;
            self.graph.with_state(|g| eval::evaluate(g, &fetch_ids, &fed, store, rng, trace))?
        };

        if let (Some(directives), Some(metadata)) = (directives, metadata) {
            if directives.output_partition_graphs {
                metadata
                    .partition_graphs
                    .push(PartitionGraph { device: DEVICE.to_string(), nodes: executed });
            }
            metadata.step_stats.extend(timings.into_iter().map(|t| StepStat {
                node: t.node,
                op: t.op.to_string(),
                elapsed_ns: t.elapsed_ns,
            }));
        }
        Ok(values)
    }

    fn node_of(&self, expr: Expr) -> Result<NodeId, GraphError> {
        if !self.graph.contains(expr) {
            return Err(GraphError::ForeignExpr { node: expr.node_id().0 });
        }
        Ok(expr.node_id())
    }
}

impl Backend for Session {
    fn backend_type(&self) -> &str {
        SESSION_BACKEND
    }

    fn evaluate(
        &self,
        fetches: &[Expr],
        feeds: &[(Expr, Tensor)],
        directives: Option<&Directives>,
        metadata: Option<&mut RunMetadata>,
    ) -> BloxResult<Vec<Tensor>> {
        Ok(self.run_with(fetches, feeds, directives, metadata)?)
    }

    fn holds(&self, artifacts: &[Expr]) -> bool {
        artifacts.iter().all(|e| self.graph.contains(*e))
    }

    fn graph_len(&self) -> usize {
        self.graph.len()
    }
}
