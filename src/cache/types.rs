//! Data types stored and reported by [`super::SemanticCache`].

use serde::Serialize;

/// A stored response keyed by its exact-match fingerprint.
///
/// `created_at` and `last_accessed` are monotonic seconds relative to the
/// owning [`super::SemanticCache`]'s start time, not wall-clock time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub tenant_scope: String,
    pub prompt_text: String,
    pub embedding: Vec<f32>,
    pub response: serde_json::Value,
    pub created_at: u64,
    pub ttl: u64,
    pub access_count: u64,
    pub last_accessed: u64,
}

impl CacheEntry {
    pub(super) fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl
    }
}

/// Outcome of [`super::SemanticCache::semantic_lookup`].
///
/// `best_similarity` and `candidate_count` are reported on both hit and
/// miss for observability, per spec.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub hit: bool,
    pub entry: Option<CacheEntry>,
    pub best_similarity: f32,
    pub candidate_count: usize,
    pub lookup_duration: std::time::Duration,
}

impl LookupResult {
    pub(super) fn miss(
        best_similarity: f32,
        candidate_count: usize,
        lookup_duration: std::time::Duration,
    ) -> Self {
        Self {
            hit: false,
            entry: None,
            best_similarity,
            candidate_count,
            lookup_duration,
        }
    }
}

/// Process-wide, non-mutating cache counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub evictions: u64,
    pub expired_removals: u64,
}

/// Per-tenant, non-mutating cache counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TenantCacheStats {
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
}
