// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Provides the unified result type and the panic policy for collaborator calls.

use crate::error::ThumbError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Unified Result type for the engine.
pub type EngineResult<T> = std::result::Result<T, ThumbError>;

/// Run a call into a black-box collaborator (decoder, encoder, resizer),
/// turning a panic inside it into `InternalPanic` instead of unwinding
/// through the caller.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            warn!(target: "thumbcore::panic", %stage, %message, "collaborator panicked");
            Err(ThumbError::internal_panic(format!("{stage}: {message}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn passes_results_through() {
        let ok: EngineResult<u8> = run_with_panic_policy("test", || Ok(7));
        assert_eq!(ok.unwrap(), 7);

        let err: EngineResult<u8> =
            run_with_panic_policy("test", || Err(ThumbError::decode_failed("bad")));
        assert!(matches!(err, Err(ThumbError::DecodeFailed { .. })));
    }

    #[test]
    fn converts_panics_to_internal_errors() {
        let err = run_with_panic_policy::<(), _>("decode:gif", || panic!("index out of range"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InternalBug);
        assert!(err.to_string().contains("decode:gif: index out of range"));
    }
}
