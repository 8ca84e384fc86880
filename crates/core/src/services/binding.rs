use std::ops::Index;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::block::Block;
use crate::error::{BloxError, BloxResult};
use crate::graph::Expr;
use crate::model::Tensor;

/// Per-call execution directives, forwarded to the backend untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directives {
    /// Capture per-node timings.
    #[serde(default)]
    pub trace: bool,
    /// Record the executed partition graphs.
    #[serde(default)]
    pub output_partition_graphs: bool,
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn output_partition_graphs(mut self, enabled: bool) -> Self {
        self.output_partition_graphs = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionGraph {
    pub device: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStat {
    pub node: String,
    pub op: String,
    pub elapsed_ns: u64,
}

/// Diagnostics a backend fills in when directives ask for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub partition_graphs: Vec<PartitionGraph>,
    pub step_stats: Vec<StepStat>,
}

impl RunMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.partition_graphs.is_empty() && self.step_stats.is_empty()
    }
}

/// Runnable execution context a block can be attached to.
pub trait Backend: Send + Sync {
    /// Type identity checked when a block is attached.
    fn backend_type(&self) -> &str;

    /// Evaluate `fetches` given `feeds`, applying `directives` to this call only.
    fn evaluate(
        &self,
        fetches: &[Expr],
        feeds: &[(Expr, Tensor)],
        directives: Option<&Directives>,
        metadata: Option<&mut RunMetadata>,
    ) -> BloxResult<Vec<Tensor>>;

    /// True when the backend's graph contains every one of `artifacts`.
    fn holds(&self, artifacts: &[Expr]) -> bool;

    /// Number of nodes in the backend's graph.
    fn graph_len(&self) -> usize;
}

/// Values produced by one run, in the block's output order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedValues {
    names: Arc<[String]>,
    values: Vec<Tensor>,
}

impl OrderedValues {
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.names.iter().position(|n| n == name).map(|i| &self.values[i])
    }

    /// Scalar value of output `name`, when it is a one-element tensor.
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Tensor::as_scalar)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Tensor] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_pairs(&self) -> Vec<(String, Tensor)> {
        self.names.iter().cloned().zip(self.values.iter().cloned()).collect()
    }

    pub fn into_values(self) -> Vec<Tensor> {
        self.values
    }
}

impl Index<usize> for OrderedValues {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.values[index]
    }
}

impl Block {
    /// Attach `backend`, validating its type identity.
    pub fn attach(&mut self, backend: Arc<dyn Backend>) -> BloxResult<&mut Self> {
        self.check_backend(backend.as_ref())?;
        info!(block = %self.name(), backend = backend.backend_type(), "attached backend");
        self.backend = Some(backend);
        Ok(self)
    }

    /// Replace the current backend. Later runs evaluate against the new one.
    pub fn set_backend(&mut self, backend: Arc<dyn Backend>) -> BloxResult<&mut Self> {
        self.check_backend(backend.as_ref())?;
        info!(
            block = %self.name(),
            backend = backend.backend_type(),
            replaced = self.backend.is_some(),
            "rebound backend"
        );
        self.backend = Some(backend);
        Ok(self)
    }

    pub fn backend(&self) -> Option<&Arc<dyn Backend>> {
        self.backend.as_ref()
    }

    fn check_backend(&self, backend: &dyn Backend) -> BloxResult<()> {
        if backend.backend_type() != self.backend_type {
            return Err(BloxError::BackendType {
                expected: self.backend_type.clone(),
                found: backend.backend_type().to_string(),
            });
        }
        Ok(())
    }

    /// Evaluate the block's ordered outputs, feeding `dynamic` values to the
    /// deferred inputs in declaration order.
    pub fn run(&self, dynamic: &[Tensor]) -> BloxResult<OrderedValues> {
        self.run_directed(dynamic, None, None)
    }

    /// Proxy applying `directives` to exactly the next run.
    pub fn with_directives(&self, directives: Directives) -> Directed<'_, 'static> {
        Directed { block: self, directives, metadata: None }
    }

    /// Shortcut for `with_directives(directives).recording(metadata)`.
    pub fn using<'m>(&self, directives: Directives, metadata: &'m mut RunMetadata) -> Directed<'_, 'm> {
        Directed { block: self, directives, metadata: Some(metadata) }
    }

    /// Feed pairs for `dynamic`, validated against the deferred parameters.
    pub fn feeds(&self, dynamic: &[Tensor]) -> BloxResult<Vec<(Expr, Tensor)>> {
        self.arguments().check_dynamic_arity(dynamic.len())?;
        Ok(self.inputs().dynamic().iter().copied().zip(dynamic.iter().cloned()).collect())
    }

    fn run_directed(
        &self,
        dynamic: &[Tensor],
        directives: Option<&Directives>,
        metadata: Option<&mut RunMetadata>,
    ) -> BloxResult<OrderedValues> {
        self.ensure_built()?;
        let backend =
            self.backend.as_ref().ok_or_else(|| BloxError::NoBackend { block: self.name().to_string() })?;
        if !backend.holds(self.outputs().ordered()) || !backend.holds(self.inputs().dynamic()) {
            return Err(BloxError::BackendGraphMismatch {
                block: self.name().to_string(),
                graph_nodes: backend.graph_len(),
            });
        }
        let feeds = self.feeds(dynamic)?;
        trace!(block = %self.name(), feeds = feeds.len(), "running block");
        let values = backend.evaluate(self.outputs().ordered(), &feeds, directives, metadata)?;
        Ok(OrderedValues { names: self.outputs().shared_names(), values })
    }
}

/// Single-use directive overlay returned by [`Block::with_directives`].
///
/// Running consumes it, so the directives never leak into later runs.
pub struct Directed<'b, 'm> {
    block: &'b Block,
    directives: Directives,
    metadata: Option<&'m mut RunMetadata>,
}

impl<'b, 'm> Directed<'b, 'm> {
    /// Collect diagnostics of the run into `metadata`.
    pub fn recording<'n>(self, metadata: &'n mut RunMetadata) -> Directed<'b, 'n> {
        Directed { block: self.block, directives: self.directives, metadata: Some(metadata) }
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn run(self, dynamic: &[Tensor]) -> BloxResult<OrderedValues> {
        self.block.run_directed(dynamic, Some(&self.directives), self.metadata)
    }
}
