//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.

/// Embedding vector width produced by every [`crate::embedding::EmbeddingEncoder`].
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Default `max_size` for [`crate::cache::SemanticCache`] (spec §4.2).
pub const DEFAULT_CACHE_MAX_SIZE: usize = 1000;

/// Default per-tenant TTL in seconds: 30 days.
pub const DEFAULT_TTL_SECONDS: u64 = 30 * 86_400;

/// Default per-tenant semantic similarity threshold.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.89;

/// Content length above which a request fails `TEXT_TOO_LONG`.
pub const MAX_TEXT_LEN: usize = 10_000;

/// Minimum whitespace-split token count before the repetition heuristic applies.
pub const REPETITION_MIN_TOKENS: usize = 11;

/// Fraction of total tokens a single token's frequency must exceed to trip the
/// repetition heuristic.
pub const REPETITION_FRACTION: f64 = 0.3;

/// Minimum accepted API key length.
pub const MIN_API_KEY_LEN: usize = 10;

/// Maximum accepted API key length.
pub const MAX_API_KEY_LEN: usize = 200;

/// Characters that are never permitted in an API key.
pub const FORBIDDEN_API_KEY_CHARS: &[char] = &['<', '>', '"', '\'', '&', ';', '(', ')'];

/// Request-body size cap enforced by [`crate::gateway`] before JSON parsing.
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024;

/// Coarse per-IP request count allowed within a running minute.
pub const RATE_LIMIT_PER_MINUTE: u32 = 100;

/// Age after which a per-IP rate counter is purged regardless of count.
pub const RATE_LIMIT_COUNTER_MAX_AGE_SECS: u64 = 5 * 60;

/// Default chat-completion model name when the caller omits one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default sampling temperature when the caller omits one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Length of a `tenant_scope`: hex-encoded prefix of a SHA-256 digest.
pub const TENANT_SCOPE_HEX_LEN: usize = 16;

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// Use this at module boundaries (e.g. when a configured real encoder is
/// swapped in) to catch dimension mismatches early rather than corrupting
/// cosine-similarity math deep in [`crate::cache`].
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DimValidationError {
    /// Runtime dimension does not match expected dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the rest of the system was configured for.
        expected: usize,
        /// Dimension actually produced.
        actual: usize,
    },
}
