// src/engine/batch.rs
//
// Batch helpers: independent images processed in parallel on the backend's
// worker pool. Each input is its own computation; results keep input order
// and one failing input does not affect the others.

use crate::config::{DeltaConfig, SamplerConfig};
use crate::engine::backend;
use crate::engine::buffer::PixelBuffer;
use crate::engine::common::EngineResult;
use crate::engine::delta::{self, AnimationFrame, DeltaFrame};
use crate::engine::sampler::{self, Intensity};
use rayon::prelude::*;
use tracing::debug;

/// Delta-optimize every sequence in `sequences`.
///
/// Fails with `BackendNotInitialized` when the backend is not running.
pub fn optimize_batch(
    sequences: &[Vec<AnimationFrame<'_>>],
    config: &DeltaConfig,
) -> EngineResult<Vec<EngineResult<Vec<DeltaFrame>>>> {
    let pool = backend::pool()?;
    debug!(target: "thumbcore::batch", inputs = sequences.len(), "optimize batch");
    Ok(pool.install(|| {
        sequences
            .par_iter()
            .map(|frames| delta::optimize(frames, config))
            .collect()
    }))
}

/// Sample the quadrant intensities of every frame in `frames`.
pub fn intensity_batch(
    frames: &[PixelBuffer<'_>],
    config: &SamplerConfig,
) -> EngineResult<Vec<EngineResult<Intensity>>> {
    let pool = backend::pool()?;
    debug!(target: "thumbcore::batch", inputs = frames.len(), "intensity batch");
    Ok(pool.install(|| {
        frames
            .par_iter()
            .map(|buffer| sampler::intensity(buffer, config))
            .collect()
    }))
}
