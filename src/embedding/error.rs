use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by embedding generation and model loading.
///
/// Cloneable so a load failure can be cached by [`super::LazyEncoder`] and
/// replayed to every later caller without re-attempting the load.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Model directory (or one of its required files) was not found.
    #[error("embedding model not found at path: {path}")]
    ModelNotFound {
        /// Missing model path.
        path: PathBuf,
    },

    /// Model or tokenizer load failed.
    #[error("failed to load embedding model: {reason}")]
    ModelLoadFailed {
        /// Error message.
        reason: String,
    },

    /// Requested compute device is unavailable.
    #[error("{device} device unavailable: {reason}")]
    DeviceUnavailable {
        /// Device name (e.g. "cuda", "metal").
        device: String,
        /// Error message.
        reason: String,
    },

    /// Inference failed.
    #[error("embedding inference failed: {reason}")]
    InferenceFailed {
        /// Error message.
        reason: String,
    },

    /// Tokenization failed.
    #[error("tokenization failed: {reason}")]
    TokenizationFailed {
        /// Error message.
        reason: String,
    },

    /// Configuration is invalid.
    #[error("invalid model configuration: {reason}")]
    InvalidConfig {
        /// Error message.
        reason: String,
    },

    /// Wraps an I/O error encountered while reading model files.
    #[error("io error loading embedding model: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<candle_core::Error> for EmbeddingError {
    fn from(err: candle_core::Error) -> Self {
        EmbeddingError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for EmbeddingError {
    fn from(err: std::io::Error) -> Self {
        EmbeddingError::Io(Arc::new(err))
    }
}
