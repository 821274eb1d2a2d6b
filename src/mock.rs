//! Test doubles for the external collaborators the core only consumes
//! through trait seams (spec §9 "Dynamic dispatch").
//!
//! Gated behind `#[cfg(test)]`/`feature = "mock"` so these never ship in a
//! production build; integration tests and doctests pull them in via the
//! crate's `mock` feature (see `dev-dependencies` in `Cargo.toml`).

use crate::policy::{ApiKeyResolver, BannedKeywordStore, ResolvedKey};
use crate::orchestrator::upstream::{UpstreamClient, UpstreamError, UpstreamReply};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// Fixed-table [`ApiKeyResolver`]: keys are seeded up front, `touch_last_used`
/// just records that it was called for assertions.
pub struct MockApiKeyResolver {
    keys: RwLock<HashMap<String, ResolvedKey>>,
    touched: Mutex<Vec<String>>,
}

impl MockApiKeyResolver {
    /// Builds a resolver with no keys registered.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            touched: Mutex::new(Vec::new()),
        }
    }

    /// Registers `key` so it resolves to `resolved`.
    pub fn with_key(self, key: impl Into<String>, resolved: ResolvedKey) -> Self {
        self.keys.write().insert(key.into(), resolved);
        self
    }

    /// Keys that have had `touch_last_used` called on them, in call order.
    pub fn touched_keys(&self) -> Vec<String> {
        self.touched.lock().clone()
    }
}

impl Default for MockApiKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiKeyResolver for MockApiKeyResolver {
    async fn resolve(&self, api_key: &str) -> Option<ResolvedKey> {
        self.keys.read().get(api_key).cloned()
    }

    async fn touch_last_used(&self, api_key: &str) {
        self.touched.lock().push(api_key.to_string());
    }
}

/// [`BannedKeywordStore`] seeded with a fixed list per tenant, with no
/// auto-populate-on-first-use behavior — useful when a test wants to assert
/// the exact keyword set without relying on defaults.
pub struct MockKeywordStore {
    keywords: RwLock<HashMap<String, Vec<String>>>,
    default_keywords: Vec<String>,
}

impl MockKeywordStore {
    /// Builds a store that falls back to `defaults` for any tenant not
    /// explicitly configured.
    pub fn new(defaults: Vec<String>) -> Self {
        Self {
            keywords: RwLock::new(HashMap::new()),
            default_keywords: defaults,
        }
    }

    /// Registers an explicit keyword list for `tenant_id`.
    pub fn with_tenant(self, tenant_id: impl Into<String>, keywords: Vec<String>) -> Self {
        self.keywords.write().insert(tenant_id.into(), keywords);
        self
    }
}

#[async_trait]
impl BannedKeywordStore for MockKeywordStore {
    async fn keywords_for(&self, tenant_id: &str) -> Vec<String> {
        self.keywords
            .read()
            .get(tenant_id)
            .cloned()
            .unwrap_or_else(|| self.default_keywords.clone())
    }
}

/// Scripted [`UpstreamClient`]: always returns the same canned reply, or a
/// canned failure, without ever making a network call.
pub struct MockUpstreamClient {
    outcome: Mutex<MockOutcome>,
    calls: Mutex<u32>,
}

enum MockOutcome {
    Succeed { content: String },
    Fail(MockFailure),
}

#[derive(Clone)]
enum MockFailure {
    Cancelled,
    Deadline,
    AuthenticationFailed,
    RateLimited,
    ServiceError,
    Other(String),
}

impl MockUpstreamClient {
    /// Builds a client that always succeeds with `content` as the reply.
    pub fn succeeding(content: impl Into<String>) -> Self {
        Self {
            outcome: Mutex::new(MockOutcome::Succeed {
                content: content.into(),
            }),
            calls: Mutex::new(0),
        }
    }

    /// Builds a client that always fails with a generic upstream error.
    pub fn failing() -> Self {
        Self {
            outcome: Mutex::new(MockOutcome::Fail(MockFailure::ServiceError)),
            calls: Mutex::new(0),
        }
    }

    /// Number of times `complete` has been called.
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn complete(
        &self,
        text: &str,
        _model: &str,
        _temperature: f32,
    ) -> Result<UpstreamReply, UpstreamError> {
        *self.calls.lock() += 1;
        match &*self.outcome.lock() {
            MockOutcome::Succeed { content } => Ok(UpstreamReply {
                content: content.clone(),
                prompt_tokens: text.split_whitespace().count() as u64,
                completion_tokens: content.split_whitespace().count() as u64,
            }),
            MockOutcome::Fail(failure) => Err(match failure {
                MockFailure::Cancelled => UpstreamError::Cancelled,
                MockFailure::Deadline => UpstreamError::Deadline,
                MockFailure::AuthenticationFailed => UpstreamError::AuthenticationFailed,
                MockFailure::RateLimited => UpstreamError::RateLimited,
                MockFailure::ServiceError => UpstreamError::ServiceError,
                MockFailure::Other(msg) => UpstreamError::Other(msg.clone()),
            }),
        }
    }
}
