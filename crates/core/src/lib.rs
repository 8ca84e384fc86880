//! blox-core
//!
//! Reusable, named, session-bound computation blocks over a small dataflow
//! graph engine.
//!
//! A block is built once from a logic description inside an explicit scope,
//! bound to a runnable backend, and run many times. This crate defines:
//! - the tensor model and the graph engine blocks are built on,
//! - argument resolution, scopes, and the block builder,
//! - backend binding (with per-call directives), the session backend,
//!   and state transfer between structurally identical blocks.
//!
//! All substantive logic lives here so that it is fully testable and reusable
//! from multiple frontends (CLI, embedding applications, etc.).

pub mod args;
pub mod block;
pub mod config;
pub mod error;
pub mod graph;
pub mod logic;
pub mod model;
pub mod scope;
pub mod services;

pub use args::{bind, ArgValue, Bound, CallArgs, ResolvedArguments};
pub use block::{build, Block, BlockProps, Builder, Inputs, Mold, Outputs};
pub use error::{BloxError, BloxResult, GraphError};
pub use graph::{Expr, Graph, Initializer, Variable};
pub use logic::{FnLogic, Logic, Out, Returned, Signature};
pub use model::Tensor;
pub use scope::Scope;
pub use services::backends::Session;
pub use services::binding::{Backend, Directed, Directives, OrderedValues, RunMetadata};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
