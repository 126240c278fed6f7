//! Error types.

use std::path::PathBuf;

/// Configuration that cannot be loaded or is out of range.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Misuse of the tracking engine by its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Frames must arrive in strictly increasing order.
    #[error("frame {got} submitted after frame {previous}")]
    OutOfOrderFrame { previous: u64, got: u64 },
    /// A late detection batch arrived but nothing was pending.
    #[error("detections for frame {requested} arrived with no pending request")]
    NoPendingDetections { requested: u64 },
    /// A late detection batch for a request that has since been superseded.
    #[error("detections for frame {requested} are stale, frame {pending} is pending")]
    StaleDetections { requested: u64, pending: u64 },
}
