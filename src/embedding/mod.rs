//! Prompt-to-vector encoding (spec §4.1).
//!
//! The encoder is loaded lazily on first [`EmbeddingEncoder::encode`] call
//! and is thread-safe for concurrent reads thereafter ([`LazyEncoder`]
//! wraps a [`std::sync::OnceLock`]). Vectors are not required to be
//! L2-normalized; [`crate::cache`] normalizes at compare time.

pub mod bert;
pub mod deterministic;
pub mod device;
mod error;

pub use bert::BertEncoder;
pub use deterministic::DeterministicEncoder;
pub use error::EmbeddingError;

use std::sync::{Arc, OnceLock};

/// Maps prompt text to a fixed-dimension vector.
///
/// Implementations must be safe to call concurrently once loaded; a load
/// failure must fail every subsequent call with [`EmbeddingError`] rather
/// than silently degrading to some cheaper fallback.
pub trait EmbeddingEncoder: Send + Sync {
    /// Encodes `text` into a vector of length [`EmbeddingEncoder::dim`].
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// The vector width this encoder produces.
    fn dim(&self) -> usize;
}

/// A backend that can be constructed up front but whose expensive
/// initialization (model/tokenizer loading) is deferred to first use.
trait LazyBackend: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    fn dim(&self) -> usize;
}

/// Defers construction of an [`EmbeddingEncoder`] backend to the first call,
/// then serves every later call from the same cached instance.
///
/// Construction failure is cached too: once loading fails, every subsequent
/// call fails with the same error instead of retrying (spec §4.1: "the core
/// does not silently degrade to hash-only matching").
pub struct LazyEncoder {
    cell: OnceLock<Result<Arc<dyn LazyBackend>, EmbeddingError>>,
    factory: Box<dyn Fn() -> Result<Arc<dyn LazyBackend>, EmbeddingError> + Send + Sync>,
    dim: usize,
}

impl std::fmt::Debug for LazyEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEncoder")
            .field("dim", &self.dim)
            .field("loaded", &self.cell.get().is_some())
            .finish()
    }
}

impl LazyEncoder {
    /// Builds a handle around the deterministic hash-seeded encoder. Never
    /// fails to load.
    pub fn deterministic(dim: usize) -> Self {
        Self {
            cell: OnceLock::new(),
            factory: Box::new(move || {
                Ok(Arc::new(DeterministicEncoder::new(dim)) as Arc<dyn LazyBackend>)
            }),
            dim,
        }
    }

    /// Builds a handle around a real BERT-based encoder loaded from
    /// `model_dir` on first use.
    pub fn bert(model_dir: std::path::PathBuf, dim: usize) -> Self {
        Self {
            cell: OnceLock::new(),
            factory: Box::new(move || {
                BertEncoder::load(&model_dir, dim).map(|e| Arc::new(e) as Arc<dyn LazyBackend>)
            }),
            dim,
        }
    }

    /// Forces the backend to load now, returning any load error instead of
    /// deferring it to the first real `encode` call. Used by readiness
    /// checks that want to report an unhealthy encoder before traffic
    /// arrives.
    pub fn ensure_loaded(&self) -> Result<(), EmbeddingError> {
        self.cell.get_or_init(|| (self.factory)()).clone()?;
        Ok(())
    }
}

impl EmbeddingEncoder for LazyEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self.cell.get_or_init(|| (self.factory)()) {
            Ok(backend) => backend.encode(text),
            Err(err) => Err(err.clone()),
        }
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
