//! Append-only, in-process log and analytics storage.
//!
//! Spec §6 names the fields persisted per request but leaves the store
//! itself external. Here it's a `DashMap`/`Vec` in-process stand-in behind
//! the same `LogSink`/`AnalyticsSink` capability seams a real deployment
//! would back with a database (spec §9 "Dynamic dispatch").

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

/// One structured log record per terminal request state (spec §4.4
/// "Terminal states always emit exactly one log record").
#[derive(Debug, Clone, Serialize)]
pub struct ProxyLogRecord {
    pub proxy_id: String,
    pub tenant_scope: String,
    pub api_key_last4: String,
    pub model: String,
    pub cache_hit: bool,
    pub success: bool,
    pub status_code: u16,
    pub error_code: Option<String>,
    pub processing_time_ms: u64,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub created_at: i64,
}

/// One analytics row per terminal request state (spec §6 "Persisted state
/// layout").
#[derive(Debug, Clone, Serialize)]
pub struct ProxyAnalyticsRecord {
    pub proxy_id: String,
    pub tenant_scope: String,
    pub api_key_id: String,
    pub model: String,
    pub temperature: f32,
    pub cache_hit: bool,
    pub success: bool,
    pub status_code: u16,
    pub error_code: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_input: f64,
    pub cost_output: f64,
    pub processing_time_ms: u64,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub created_at: i64,
}

/// Capability handle the Orchestrator writes the terminal log record to
/// (spec §4.4 step 10).
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Records `record`. Failure is logged by the caller, never surfaced to
    /// the client (spec §5 "Best-effort writes").
    async fn record(&self, record: ProxyLogRecord);

    /// Fetches a previously recorded log by `proxy_id` (spec §6 "Log
    /// retrieval").
    async fn get(&self, proxy_id: &str) -> Option<ProxyLogRecord>;
}

/// Capability handle the Orchestrator writes the terminal analytics record
/// to (spec §4.4 step 10).
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Records `record`. Failure is logged by the caller, never surfaced to
    /// the client.
    async fn record(&self, record: ProxyAnalyticsRecord);
}

/// In-process append-only store backing both [`LogSink`] and
/// [`AnalyticsSink`], keyed by `proxy_id` for `GET /logs/{proxy_id}`.
pub struct InMemoryAnalyticsStore {
    logs: DashMap<String, ProxyLogRecord>,
    analytics: DashMap<String, ProxyAnalyticsRecord>,
}

impl InMemoryAnalyticsStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self {
            logs: DashMap::new(),
            analytics: DashMap::new(),
        }
    }
}

impl Default for InMemoryAnalyticsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for InMemoryAnalyticsStore {
    async fn record(&self, record: ProxyLogRecord) {
        self.logs.insert(record.proxy_id.clone(), record);
    }

    async fn get(&self, proxy_id: &str) -> Option<ProxyLogRecord> {
        self.logs.get(proxy_id).map(|entry| entry.clone())
    }
}

#[async_trait]
impl AnalyticsSink for InMemoryAnalyticsStore {
    async fn record(&self, record: ProxyAnalyticsRecord) {
        self.analytics.insert(record.proxy_id.clone(), record);
    }
}
