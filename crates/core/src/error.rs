//! Error taxonomy for block construction, binding and execution.
//!
//! Every failure here is a caller-correctable precondition violation; nothing
//! in the crate retries. Errors surface at the call that triggered them.

use thiserror::Error;

/// Failures raised by the dataflow graph engine itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Shape mismatch in `{op}`: {left:?} vs {right:?}")]
    ShapeMismatch { op: &'static str, left: Vec<usize>, right: Vec<usize> },

    #[error("Tensor data length {found} does not match shape size {expected}")]
    DataLength { expected: usize, found: usize },

    /// An expression handle was used with a graph that did not create it.
    #[error("Expression {node} does not belong to this graph")]
    ForeignExpr { node: usize },

    #[error("No value fed for placeholder `{placeholder}`")]
    MissingFeed { placeholder: String },

    #[error("Attempting to use uninitialized variable `{name}`")]
    UninitializedVariable { name: String },

    #[error("Variable `{name}` already exists")]
    DuplicateVariable { name: String },

    #[error("Uniform range [{low}, {high}) of `{name}` must be finite")]
    InvalidRange { name: String, low: f64, high: f64 },

    #[error("The session graph is empty; add operations to the graph before calling run")]
    EmptyGraph,
}

/// Errors surfaced by the core block API.
#[derive(Debug, Error)]
pub enum BloxError {
    /// Call-site arguments do not match the logic's declared parameters.
    #[error("Signature mismatch for `{logic}`: {reason}")]
    SignatureMismatch { logic: String, reason: String },

    #[error("Scope `{path}` already exists; enter it with reuse to alias it")]
    ScopeCollision { path: String },

    #[error("Nothing to reuse at `{path}`; it was never created")]
    NothingToReuse { path: String },

    #[error("Invalid scope name `{name}`: names must be non-empty and must not contain '/'")]
    InvalidScopeName { name: String },

    /// Logic returned something other than a named, ordered `Out` record.
    #[error(
        "Logic `{logic}` must either return an `Out` record of uniquely named outputs; it returned {found}"
    )]
    InvalidOutputContract { logic: String, found: String },

    #[error("Backend must be of type `{expected}`, got `{found}`")]
    BackendType { expected: String, found: String },

    /// The attached backend's graph does not hold the block's artifacts.
    #[error(
        "Cannot run block `{block}`: backend graph is empty of its artifacts (backend holds {graph_nodes} unrelated nodes)"
    )]
    BackendGraphMismatch { block: String, graph_nodes: usize },

    #[error("Cannot transfer state from `{source_scope}` to `{target_scope}`: {reason}")]
    StateShapeMismatch { target_scope: String, source_scope: String, reason: String },

    #[error("Block `{block}` has not been built")]
    NotBuilt { block: String },

    #[error("Block `{block}` has no backend attached")]
    NoBackend { block: String },

    #[error("Invalid logic document `{logic}`: {reason}")]
    Document { logic: String, reason: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Invalid scope pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience result type for block operations.
pub type BloxResult<T> = Result<T, BloxError>;
