//! Conduit flow-control configuration.

use serde::{Deserialize, Serialize};

use crate::conduit::Conduit;
use crate::error::{ConduitError, Result};

/// Default resume threshold (16 KiB).
pub const DEFAULT_RESUME_THRESHOLD: usize = 16 * 1024;

/// Default pause threshold (32 KiB).
pub const DEFAULT_PAUSE_THRESHOLD: usize = 32 * 1024;

/// Flow-control thresholds of a [`Conduit`].
///
/// Writes suspend once the unread byte count reaches `pause_threshold` and
/// are released when reads bring it back to or below `resume_threshold`.
/// A `pause_threshold` of zero disables backpressure.
///
/// Missing fields deserialize to the defaults:
///
/// ```
/// use giztoy_conduit::ConduitConfig;
///
/// let config: ConduitConfig = serde_json::from_str(r#"{"pause_threshold": 8192}"#).unwrap();
/// assert_eq!(config.pause_threshold, 8192);
/// assert_eq!(config.resume_threshold, 16 * 1024);
/// assert!(config.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    /// Unread byte count at or below which a suspended write resumes.
    pub resume_threshold: usize,
    /// Unread byte count at or above which writes suspend.
    pub pause_threshold: usize,
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            resume_threshold: DEFAULT_RESUME_THRESHOLD,
            pause_threshold: DEFAULT_PAUSE_THRESHOLD,
        }
    }
}

impl ConduitConfig {
    /// Creates a config with explicit thresholds.
    ///
    /// The pair is not validated until the conduit is built; call
    /// [`validate`](Self::validate) to check it early.
    pub fn new(resume_threshold: usize, pause_threshold: usize) -> Self {
        Self {
            resume_threshold,
            pause_threshold,
        }
    }

    /// Creates a config that pauses at `pause_threshold` and resumes at half of it.
    pub fn with_pause(pause_threshold: usize) -> Self {
        Self::new(pause_threshold / 2, pause_threshold)
    }

    /// Creates a config with backpressure disabled.
    pub fn unbounded() -> Self {
        Self::new(0, 0)
    }

    /// Sets the resume threshold.
    pub fn resume_threshold(mut self, threshold: usize) -> Self {
        self.resume_threshold = threshold;
        self
    }

    /// Sets the pause threshold.
    pub fn pause_threshold(mut self, threshold: usize) -> Self {
        self.pause_threshold = threshold;
        self
    }

    /// Returns true if writes can ever be suspended.
    pub fn is_bounded(&self) -> bool {
        self.pause_threshold > 0
    }

    /// Checks that `resume_threshold <= pause_threshold`.
    pub fn validate(&self) -> Result<()> {
        if self.resume_threshold > self.pause_threshold {
            return Err(ConduitError::InvalidArgument(format!(
                "resume_threshold ({}) exceeds pause_threshold ({})",
                self.resume_threshold, self.pause_threshold
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Preset conduits
// ============================================================================

/// Creates a conduit that pauses at 4KB and resumes at 2KB.
pub fn conduit_4kb() -> Conduit {
    Conduit::from_valid(ConduitConfig::with_pause(4096))
}

/// Creates a conduit that pauses at 64KB and resumes at 32KB.
pub fn conduit_64kb() -> Conduit {
    Conduit::from_valid(ConduitConfig::with_pause(65536))
}

/// Creates a conduit that pauses at 1MB and resumes at 512KB.
pub fn conduit_1mb() -> Conduit {
    Conduit::from_valid(ConduitConfig::with_pause(1024 * 1024))
}

/// Creates a conduit with the default 16KB/32KB thresholds.
pub fn conduit() -> Conduit {
    Conduit::new()
}
