// src/engine/backend.rs
//
// Process-wide collaborator backend: resource limits and the worker pool used
// by the batch helpers.
//
// The host calls initialize() once at startup and shutdown() at exit. Both are
// idempotent. The sampler and the optimizer never touch this state.

use crate::config::ResourceLimits;
use crate::error::ThumbError;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rayon::ThreadPool;
use std::sync::Arc;
use tracing::{debug, info};

struct BackendState {
    limits: ResourceLimits,
    pool: Arc<ThreadPool>,
}

static BACKEND: Lazy<Mutex<Option<BackendState>>> = Lazy::new(|| Mutex::new(None));

/// Initialize the backend with `limits`.
///
/// Returns `Ok(true)` when this call initialized the backend and `Ok(false)`
/// when it was already running; the existing limits are kept in that case.
pub fn initialize(limits: ResourceLimits) -> Result<bool, ThumbError> {
    limits.validate()?;
    let mut state = BACKEND.lock();
    if state.is_some() {
        debug!(target: "thumbcore::backend", "initialize called twice, keeping existing limits");
        return Ok(false);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(limits.max_threads)
        .thread_name(|i| format!("thumbcore-{i}"))
        .build()
        .map_err(|e| ThumbError::internal_panic(format!("failed to build worker pool: {e}")))?;

    info!(
        target: "thumbcore::backend",
        max_memory_bytes = limits.max_memory_bytes,
        max_threads = limits.max_threads,
        max_pixels = limits.max_pixels,
        "backend initialized"
    );
    *state = Some(BackendState {
        limits,
        pool: Arc::new(pool),
    });
    Ok(true)
}

/// Tear the backend down. Returns `false` when it was not running.
///
/// Batches already holding the pool finish on it; new batches fail until the
/// next initialize().
pub fn shutdown() -> bool {
    let was_running = BACKEND.lock().take().is_some();
    if was_running {
        info!(target: "thumbcore::backend", "backend shut down");
    }
    was_running
}

pub fn is_initialized() -> bool {
    BACKEND.lock().is_some()
}

/// Limits of the running backend, if any.
pub fn limits() -> Option<ResourceLimits> {
    BACKEND.lock().as_ref().map(|s| s.limits)
}

/// Limits of the running backend, or the defaults when it is not running.
pub(crate) fn effective_limits() -> ResourceLimits {
    limits().unwrap_or_default()
}

/// Worker pool of the running backend.
pub(crate) fn pool() -> Result<Arc<ThreadPool>, ThumbError> {
    BACKEND
        .lock()
        .as_ref()
        .map(|s| Arc::clone(&s.pool))
        .ok_or_else(ThumbError::backend_not_initialized)
}
