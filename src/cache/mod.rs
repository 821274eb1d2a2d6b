//! Per-tenant semantic cache (spec §4.2).
//!
//! One shared map of `fingerprint → entry` plus a `tenant_scope → [fingerprint]`
//! index (spec §9 "Arena + index"); neither side owns the other, and both are
//! mutated under the same exclusive lock (spec §5). Reads (`semantic_lookup`,
//! `stats`) take a shared lock; writes (`put`, `access`, `invalidate_tenant`,
//! eviction) take an exclusive one — `parking_lot::RwLock` gives us that
//! discipline directly.

pub mod types;

pub use types::{CacheEntry, CacheStats, LookupResult, TenantCacheStats};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Bounded, per-tenant, embedding-similarity cache.
///
/// All operations are infallible by design (spec §4.2 "Failure semantics":
/// cache failure is never a request failure) — a full cache evicts, an
/// unknown key is simply a miss.
pub struct SemanticCache {
    state: RwLock<State>,
    max_size: usize,
    epoch: Instant,
}

struct State {
    entries: HashMap<String, CacheEntry>,
    tenant_index: HashMap<String, Vec<String>>,
    hits: u64,
    misses: u64,
    puts: u64,
    evictions: u64,
    expired_removals: u64,
    tenant_hits: HashMap<String, u64>,
    tenant_misses: HashMap<String, u64>,
}

impl SemanticCache {
    /// Default bound on the number of live entries (spec §4.2: "implementation
    /// default 1000").
    pub const DEFAULT_MAX_SIZE: usize = 1000;

    /// Builds an empty cache bounded at [`Self::DEFAULT_MAX_SIZE`] entries.
    pub fn new() -> Self {
        Self::with_max_size(Self::DEFAULT_MAX_SIZE)
    }

    /// Builds an empty cache bounded at `max_size` entries.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            state: RwLock::new(State {
                entries: HashMap::new(),
                tenant_index: HashMap::new(),
                hits: 0,
                misses: 0,
                puts: 0,
                evictions: 0,
                expired_removals: 0,
                tenant_hits: HashMap::new(),
                tenant_misses: HashMap::new(),
            }),
            max_size: max_size.max(1),
            epoch: Instant::now(),
        }
    }

    fn now(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }

    /// Inserts or replaces the entry for `fingerprint`, appending it to the
    /// tenant's index if it is new. Sweeps expired entries and, if still at
    /// capacity, evicts the globally-least-recently-accessed entry first.
    pub fn put(
        &self,
        tenant_scope: &str,
        fingerprint: &str,
        prompt_text: &str,
        embedding: Vec<f32>,
        response: serde_json::Value,
        ttl: u64,
    ) {
        let now = self.now();
        let mut state = self.state.write();
        state.puts += 1;

        let is_new = !state.entries.contains_key(fingerprint);

        if is_new && state.entries.len() >= self.max_size {
            state.sweep_expired(now);
        }
        if is_new && state.entries.len() >= self.max_size {
            state.evict_one();
        }

        let entry = CacheEntry {
            key: fingerprint.to_string(),
            tenant_scope: tenant_scope.to_string(),
            prompt_text: prompt_text.to_string(),
            embedding,
            response,
            created_at: now,
            ttl: ttl.max(1),
            access_count: 0,
            last_accessed: now,
        };
        state.entries.insert(fingerprint.to_string(), entry);

        if is_new {
            state
                .tenant_index
                .entry(tenant_scope.to_string())
                .or_default()
                .push(fingerprint.to_string());
        }
    }

    /// Scans `tenant_scope`'s index for the best cosine-similarity match
    /// against `query_embedding`, skipping expired entries. Reports the best
    /// score and candidate count even on miss.
    pub fn semantic_lookup(
        &self,
        tenant_scope: &str,
        query_embedding: &[f32],
        similarity_threshold: f32,
    ) -> LookupResult {
        let started = Instant::now();
        let now = self.now();
        let state = self.state.read();

        let Some(keys) = state.tenant_index.get(tenant_scope) else {
            return LookupResult::miss(-1.0, 0, started.elapsed());
        };

        let mut best: Option<(&CacheEntry, f32)> = None;
        let mut candidate_count = 0usize;

        for key in keys {
            let Some(entry) = state.entries.get(key) else {
                continue;
            };
            if entry.is_expired(now) {
                continue;
            }
            candidate_count += 1;
            let score = cosine_similarity(query_embedding, &entry.embedding);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((entry, score));
            }
        }

        let best_similarity = best.map(|(_, s)| s).unwrap_or(-1.0);

        match best {
            Some((entry, score)) if score >= similarity_threshold => LookupResult {
                hit: true,
                entry: Some(entry.clone()),
                best_similarity: score,
                candidate_count,
                lookup_duration: started.elapsed(),
            },
            _ => {
                drop(state);
                let mut state = self.state.write();
                state.misses += 1;
                *state.tenant_misses.entry(tenant_scope.to_string()).or_default() += 1;
                LookupResult::miss(best_similarity, candidate_count, started.elapsed())
            }
        }
    }

    /// Records a confirmed hit: increments `access_count`, bumps
    /// `last_accessed`, and updates hit counters. No-op if `key` is absent
    /// (e.g. raced with an eviction between lookup and access).
    pub fn access(&self, tenant_scope: &str, key: &str) {
        let now = self.now();
        let mut state = self.state.write();
        state.hits += 1;
        *state.tenant_hits.entry(tenant_scope.to_string()).or_default() += 1;
        if let Some(entry) = state.entries.get_mut(key) {
            entry.access_count += 1;
            entry.last_accessed = now;
        }
    }

    /// Removes every entry belonging to `tenant_scope`. Returns the count
    /// removed.
    pub fn invalidate_tenant(&self, tenant_scope: &str) -> usize {
        let mut state = self.state.write();
        let Some(keys) = state.tenant_index.remove(tenant_scope) else {
            return 0;
        };
        let mut removed = 0;
        for key in keys {
            if state.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Process-wide reset.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.tenant_index.clear();
    }

    /// Process-wide, non-mutating counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            puts: state.puts,
            evictions: state.evictions,
            expired_removals: state.expired_removals,
        }
    }

    /// Per-tenant, non-mutating counters.
    pub fn tenant_stats(&self, tenant_scope: &str) -> TenantCacheStats {
        let state = self.state.read();
        TenantCacheStats {
            entry_count: state
                .tenant_index
                .get(tenant_scope)
                .map(|keys| keys.len())
                .unwrap_or(0),
            hits: state.tenant_hits.get(tenant_scope).copied().unwrap_or(0),
            misses: state.tenant_misses.get(tenant_scope).copied().unwrap_or(0),
        }
    }
}

impl Default for SemanticCache {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Removes every expired entry, regardless of tenant. Called
    /// opportunistically from `put` when the cache is at capacity.
    fn sweep_expired(&mut self, now: u64) {
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key.clone())
            .collect();

        for key in expired {
            if let Some(entry) = self.entries.remove(&key) {
                self.expired_removals += 1;
                if let Some(keys) = self.tenant_index.get_mut(&entry.tenant_scope) {
                    keys.retain(|k| k != &key);
                }
            }
        }
    }

    /// Evicts the globally-least-recently-accessed entry, ties broken by
    /// lower `created_at` (spec §4.2 "Eviction").
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .values()
            .min_by_key(|e| (e.last_accessed, e.created_at))
            .map(|e| e.key.clone());

        let Some(key) = victim else { return };
        if let Some(entry) = self.entries.remove(&key) {
            self.evictions += 1;
            if let Some(keys) = self.tenant_index.get_mut(&entry.tenant_scope) {
                keys.retain(|k| k != &key);
            }
        }
    }
}

/// `(a·b) / (‖a‖·‖b‖)`, or `-1.0` if either vector has zero norm (spec §4.2).
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return -1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return -1.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put_entry(cache: &SemanticCache, tenant: &str, key: &str, embedding: Vec<f32>) {
        cache.put(tenant, key, "text", embedding, json!({"ok": true}), 86400);
    }

    #[test]
    fn exact_embedding_is_a_near_perfect_hit() {
        let cache = SemanticCache::new();
        put_entry(&cache, "t1", "fp1", vec![1.0, 0.0, 0.0]);

        let result = cache.semantic_lookup("t1", &[1.0, 0.0, 0.0], 0.89);
        assert!(result.hit);
        assert!((result.best_similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tenants_do_not_leak_into_each_other() {
        let cache = SemanticCache::new();
        put_entry(&cache, "tenant-a", "fp1", vec![1.0, 0.0]);

        let result = cache.semantic_lookup("tenant-b", &[1.0, 0.0], 0.89);
        assert!(!result.hit);
        assert_eq!(result.candidate_count, 0);
    }

    #[test]
    fn below_threshold_is_a_miss_but_reports_best_score() {
        let cache = SemanticCache::new();
        put_entry(&cache, "t1", "fp1", vec![1.0, 0.0]);

        let result = cache.semantic_lookup("t1", &[0.0, 1.0], 0.89);
        assert!(!result.hit);
        assert!(result.best_similarity < 0.89);
        assert_eq!(result.candidate_count, 1);
    }

    #[test]
    fn eviction_at_capacity_keeps_size_bounded() {
        let cache = SemanticCache::with_max_size(2);
        put_entry(&cache, "t1", "fp1", vec![1.0, 0.0]);
        put_entry(&cache, "t1", "fp2", vec![0.0, 1.0]);
        cache.access("t1", "fp2");
        put_entry(&cache, "t1", "fp3", vec![0.5, 0.5]);

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn invalidate_tenant_removes_only_that_tenants_entries() {
        let cache = SemanticCache::new();
        put_entry(&cache, "t1", "fp1", vec![1.0, 0.0]);
        put_entry(&cache, "t2", "fp2", vec![0.0, 1.0]);

        let removed = cache.invalidate_tenant("t1");
        assert_eq!(removed, 1);
        assert_eq!(cache.stats().size, 1);
        assert!(cache.semantic_lookup("t2", &[0.0, 1.0], 0.89).hit);
    }

    #[test]
    fn clear_resets_everything() {
        let cache = SemanticCache::new();
        put_entry(&cache, "t1", "fp1", vec![1.0, 0.0]);
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn access_increments_count_and_bumps_last_accessed() {
        let cache = SemanticCache::new();
        put_entry(&cache, "t1", "fp1", vec![1.0, 0.0]);
        cache.access("t1", "fp1");
        cache.access("t1", "fp1");

        let result = cache.semantic_lookup("t1", &[1.0, 0.0], 0.89);
        assert_eq!(result.entry.unwrap().access_count, 2);
    }

    #[test]
    fn zero_vector_never_matches() {
        let cache = SemanticCache::new();
        put_entry(&cache, "t1", "fp1", vec![0.0, 0.0]);

        let result = cache.semantic_lookup("t1", &[1.0, 0.0], 0.0);
        assert!(!result.hit);
    }
}
