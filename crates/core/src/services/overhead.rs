//! Run-overhead guardrail.
//!
//! Compares repeated [`Block::run`] calls with the same number of raw
//! [`Backend::evaluate`](crate::services::binding::Backend::evaluate) calls on
//! the block's own fetches and feeds. Timing is environment-sensitive, so the
//! limit is a regression bound rather than a correctness property.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::block::Block;
use crate::error::{BloxError, BloxResult};
use crate::model::Tensor;

#[derive(Debug, Clone, Serialize)]
pub struct OverheadReport {
    pub iterations: usize,
    pub run: Duration,
    pub raw: Duration,
    /// `(run - raw) / raw`.
    pub ratio: f64,
    pub limit: f64,
}

impl OverheadReport {
    pub fn within_limit(&self) -> bool {
        self.ratio <= self.limit
    }
}

pub fn measure_overhead(
    block: &Block,
    dynamic: &[Tensor],
    iterations: usize,
    limit: f64,
) -> BloxResult<OverheadReport> {
    let backend =
        block.backend().ok_or_else(|| BloxError::NoBackend { block: block.name().to_string() })?;
    let fetches = block.outputs().ordered();
    let feeds = block.feeds(dynamic)?;

    // Warm both paths once so first-call costs land in neither measurement.
    block.run(dynamic)?;
    backend.evaluate(fetches, &feeds, None, None)?;

    let started = Instant::now();
    for _ in 0..iterations {
        block.run(dynamic)?;
    }
    let run = started.elapsed();

    let started = Instant::now();
    for _ in 0..iterations {
        backend.evaluate(fetches, &feeds, None, None)?;
    }
    let raw = started.elapsed();

    let raw_secs = raw.as_secs_f64().max(f64::EPSILON);
    let ratio = (run.as_secs_f64() - raw.as_secs_f64()) / raw_secs;
    info!(block = %block.name(), iterations, ratio, limit, "measured run overhead");
    Ok(OverheadReport { iterations, run, raw, ratio, limit })
}
