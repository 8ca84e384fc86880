//! Services layered over built blocks: backend binding, the session backend,
//! state transfer and the run-overhead guardrail.

pub mod backends;
pub mod binding;
pub mod overhead;
pub mod state;
