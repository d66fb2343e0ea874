// src/config.rs
//
// Tuning knobs for the sampler, the delta optimizer and the backend.
// Plain values, cheap to copy; nothing here touches pixels.

use crate::error::ThumbError;

/// Squared-distance cutoff above which two pixels count as different.
pub const DEFAULT_DIFF_THRESHOLD: u64 = 40_000;

const STRICT_DIFF_THRESHOLD: u64 = 10_000;
const LENIENT_DIFF_THRESHOLD: u64 = 160_000;

const DEFAULT_MAX_MEMORY_BYTES: u64 = 300_000_000; // 300MB
const DEFAULT_MAX_THREADS: usize = 1;

pub const ENV_DIFF_THRESHOLD: &str = "THUMBCORE_DIFF_THRESHOLD";
pub const ENV_MAX_MEMORY: &str = "THUMBCORE_MAX_MEMORY";

/// Per-channel weights, always applied in red, green, blue order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LumaWeights {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl LumaWeights {
    /// ITU-R BT.709 luma coefficients.
    pub const BT709: Self = Self {
        red: 0.2126,
        green: 0.7152,
        blue: 0.0772,
    };

    pub fn new(red: f64, green: f64, blue: f64) -> Result<Self, ThumbError> {
        let weights = Self { red, green, blue };
        weights.validate()?;
        Ok(weights)
    }

    pub fn sum(&self) -> f64 {
        self.red + self.green + self.blue
    }

    pub fn validate(&self) -> Result<(), ThumbError> {
        for (name, value) in [("red", self.red), ("green", self.green), ("blue", self.blue)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ThumbError::invalid_argument(
                    format!("weights.{name}"),
                    value.to_string(),
                    "weights must be finite and non-negative",
                ));
            }
        }
        if self.sum() == 0.0 {
            return Err(ThumbError::invalid_argument(
                "weights",
                "0",
                "at least one channel weight must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for LumaWeights {
    fn default() -> Self {
        Self::BT709
    }
}

/// Settings for the quadrant intensity sampler.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SamplerConfig {
    pub weights: LumaWeights,
}

/// Settings for the animation delta optimizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeltaConfig {
    pub diff_threshold: u64,
    pub weights: LumaWeights,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            weights: LumaWeights::BT709,
        }
    }
}

impl DeltaConfig {
    pub fn with_threshold(diff_threshold: u64) -> Self {
        Self {
            diff_threshold,
            ..Self::default()
        }
    }

    /// Keeps more changes: larger deltas, closer to the source.
    pub fn strict() -> Self {
        Self::with_threshold(STRICT_DIFF_THRESHOLD)
    }

    /// Drops more changes: smaller deltas, more visible drift.
    pub fn lenient() -> Self {
        Self::with_threshold(LENIENT_DIFF_THRESHOLD)
    }

    /// Get a named preset
    pub fn preset(name: &str) -> Result<Self, ThumbError> {
        match name.to_lowercase().as_str() {
            "default" => Ok(Self::default()),
            "strict" => Ok(Self::strict()),
            "lenient" => Ok(Self::lenient()),
            other => Err(ThumbError::invalid_argument(
                "preset",
                other.to_string(),
                "expected default, strict or lenient",
            )),
        }
    }

    /// Default configuration with `THUMBCORE_DIFF_THRESHOLD` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(threshold) = env_var_positive_u64(ENV_DIFF_THRESHOLD) {
            config.diff_threshold = threshold;
        }
        config
    }

    pub fn validate(&self) -> Result<(), ThumbError> {
        self.weights.validate()
    }
}

/// Process-wide limits applied by the backend to decoded input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    pub max_memory_bytes: u64,
    pub max_threads: usize,
    pub max_pixels: u64,
    pub max_dimension: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            max_threads: DEFAULT_MAX_THREADS,
            max_pixels: crate::engine::MAX_PIXELS,
            max_dimension: crate::engine::MAX_DIMENSION,
        }
    }
}

impl ResourceLimits {
    /// Default limits with `THUMBCORE_MAX_MEMORY` applied when set.
    pub fn from_env() -> Self {
        let mut limits = Self::default();
        if let Some(bytes) = env_var_positive_u64(ENV_MAX_MEMORY) {
            limits.max_memory_bytes = bytes;
        }
        limits
    }

    pub fn validate(&self) -> Result<(), ThumbError> {
        if self.max_threads == 0 {
            return Err(ThumbError::invalid_argument(
                "max_threads",
                "0",
                "at least one thread is required",
            ));
        }
        if self.max_dimension == 0 || self.max_pixels == 0 || self.max_memory_bytes == 0 {
            return Err(ThumbError::invalid_argument(
                "limits",
                "0",
                "limits must be positive",
            ));
        }
        Ok(())
    }

    /// Reject frames whose size or decoded footprint is over the limits.
    pub fn enforce(&self, width: u32, height: u32, frames: usize) -> Result<(), ThumbError> {
        let largest = width.max(height);
        if largest > self.max_dimension {
            return Err(ThumbError::dimension_exceeds_limit(largest, self.max_dimension));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(ThumbError::pixel_count_exceeds_limit(pixels, self.max_pixels));
        }
        // Decoded frames are RGBA8 at minimum.
        let bytes = pixels.saturating_mul(4).saturating_mul(frames as u64);
        if bytes > self.max_memory_bytes {
            return Err(ThumbError::allocation_failure(
                usize::try_from(bytes).unwrap_or(usize::MAX),
                format!("{frames} decoded frames over the {} byte budget", self.max_memory_bytes),
            ));
        }
        Ok(())
    }
}

/// Parses the environment variable as a `u64`, returning `Some` only when
/// the value is a valid positive (> 0) integer.
#[inline]
pub(crate) fn env_var_positive_u64(var_name: &str) -> Option<u64> {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
