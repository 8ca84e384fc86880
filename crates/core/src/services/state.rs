//! Learnable state owned by a block's scope, and bulk transfer between blocks.

use tracing::{debug, warn};

use crate::block::Block;
use crate::error::{BloxError, BloxResult};
use crate::graph::{Expr, Variable};

/// State declared under `block`'s scope, in declaration order.
///
/// A block built in the root scope shares its namespace with every other
/// block of the graph, so it lists the state it declared itself.
pub fn list_state(block: &Block) -> BloxResult<Vec<Variable>> {
    if block.scope().is_root() {
        return Ok(block.variables().to_vec());
    }
    let pattern = block.scope().exact_pattern()?;
    Ok(block.graph().variables_matching(&pattern))
}

/// True when the two blocks index any of the same state handles.
///
/// This is the expected outcome for blocks built under one scope with reuse,
/// and a bug anywhere else.
pub fn shares_state(a: &Block, b: &Block) -> bool {
    a.variables().iter().any(|va| b.variables().iter().any(|vb| va.id() == vb.id()))
        && a.graph().id() == b.graph().id()
}

/// Operation copying every state value of `source` into the
/// correspondingly-positioned state of `target` when evaluated.
pub fn assign_state(target: &Block, source: &Block) -> BloxResult<Expr> {
    let mismatch = |reason: String| BloxError::StateShapeMismatch {
        target_scope: target.scope().absolute_path().to_string(),
        source_scope: source.scope().absolute_path().to_string(),
        reason,
    };
    if target.graph().id() != source.graph().id() {
        return Err(mismatch("blocks live in different graphs".to_string()));
    }
    let targets = list_state(target)?;
    let sources = list_state(source)?;
    if targets.len() != sources.len() {
        return Err(mismatch(format!(
            "target holds {} variables, source holds {}",
            targets.len(),
            sources.len()
        )));
    }
    for (t, s) in targets.iter().zip(&sources) {
        if t.shape() != s.shape() {
            return Err(mismatch(format!(
                "`{}` has shape {:?} but `{}` has shape {:?}",
                t.name(),
                t.shape(),
                s.name(),
                s.shape()
            )));
        }
    }
    if shares_state(target, source) {
        warn!(
            target_scope = %target.scope().absolute_path(),
            source_scope = %source.scope().absolute_path(),
            "assigning state between aliased blocks"
        );
    }

    let graph = target.graph();
    let mut assigns = Vec::with_capacity(targets.len());
    for (t, s) in targets.iter().zip(&sources) {
        assigns.push(graph.assign(t, s.value())?);
    }
    debug!(variables = assigns.len(), "created state transfer");
    Ok(graph.group(&target.scope().join("assign_vars"), &assigns)?)
}

impl Block {
    /// See [`assign_state`].
    pub fn assign_vars(&self, source: &Block) -> BloxResult<Expr> {
        assign_state(self, source)
    }
}
