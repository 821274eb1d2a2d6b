//! API key validation, banned-keyword scanning, and content heuristics
//! (spec §4.3).
//!
//! Checks run in a fixed order and short-circuit on first failure. Key
//! resolution and banned-keyword storage are capability handles injected
//! into [`PolicyEngine`] (spec §9 "Dynamic dispatch") so the Orchestrator
//! can substitute test doubles without the engine knowing.

mod error;

pub use error::PolicyError;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Administrative state of a resolved API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Key may be used.
    Enabled,
    /// Key has been disabled by an administrator.
    Disabled,
}

/// Administrative state of the key's owning tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantStatus {
    /// Tenant may make requests.
    Active,
    /// Tenant is inactive (e.g. unverified, deactivated).
    Inactive,
    /// Tenant is suspended (e.g. billing, abuse).
    Suspended,
}

/// What an API key resolves to (spec §3 "APIKey").
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    /// Opaque tenant identifier. The core never reads tenant PII past this.
    pub tenant_id: String,
    /// Human-readable label for the key, echoed back in responses.
    pub key_name: String,
    /// Administrative state of the key itself.
    pub state: KeyState,
    /// Administrative state of the owning tenant.
    pub tenant_status: TenantStatus,
}

/// External lookup from an opaque API key string to its tenant and state.
///
/// The engine treats this as a pure function; it does not own or cache the
/// underlying storage (spec §3 "APIKey").
#[async_trait]
pub trait ApiKeyResolver: Send + Sync {
    /// Resolves `api_key`, or `None` if no tenant owns it.
    async fn resolve(&self, api_key: &str) -> Option<ResolvedKey>;

    /// Best-effort bump of the key's last-used timestamp (spec §4.4 step 9).
    /// Failure is not surfaced; callers log and move on.
    async fn touch_last_used(&self, api_key: &str);
}

/// Per-tenant banned-substring storage, auto-populated with a fixed default
/// list on first use (spec §3 "BannedKeywordSet").
#[async_trait]
pub trait BannedKeywordStore: Send + Sync {
    /// Returns the tenant's keyword set, populating the default list first
    /// if the tenant has never configured one.
    async fn keywords_for(&self, tenant_id: &str) -> Vec<String>;
}

/// Default banned keywords seeded for a tenant that has never configured
/// its own list.
pub const DEFAULT_BANNED_KEYWORDS: &[&str] = &[
    "spam",
    "scam",
    "fraud",
    "hack",
    "virus",
    "malware",
    "phishing",
    "illegal",
    "stolen",
    "fake",
    "counterfeit",
    "porn",
    "adult",
    "gambling",
    "casino",
    "lottery",
    "drugs",
    "weapon",
    "violence",
    "hate",
    "racist",
];

/// Minimal [`ApiKeyResolver`] seeded once from a flat `key=tenant_id` list
/// (spec §3 "APIKey": "Each key resolves via an external lookup... The core
/// treats this resolver as a pure function; it does not own the underlying
/// storage"). Every resolved tenant starts `Enabled`/`Active`; a real
/// deployment would back this with its own account database instead.
pub struct EnvApiKeyResolver {
    keys: parking_lot::RwLock<HashMap<String, ResolvedKey>>,
}

impl EnvApiKeyResolver {
    /// Parses `spec`, a comma-separated list of `key=tenant_id` pairs.
    /// Malformed entries are skipped.
    pub fn from_spec(spec: &str) -> Self {
        let mut keys = HashMap::new();
        for pair in spec.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            if let Some((key, tenant_id)) = pair.split_once('=') {
                let key = key.trim();
                let tenant_id = tenant_id.trim();
                if key.is_empty() || tenant_id.is_empty() {
                    continue;
                }
                keys.insert(
                    key.to_string(),
                    ResolvedKey {
                        tenant_id: tenant_id.to_string(),
                        key_name: tenant_id.to_string(),
                        state: KeyState::Enabled,
                        tenant_status: TenantStatus::Active,
                    },
                );
            }
        }
        Self {
            keys: parking_lot::RwLock::new(keys),
        }
    }
}

#[async_trait]
impl ApiKeyResolver for EnvApiKeyResolver {
    async fn resolve(&self, api_key: &str) -> Option<ResolvedKey> {
        self.keys.read().get(api_key).cloned()
    }

    async fn touch_last_used(&self, _api_key: &str) {}
}

/// In-process [`BannedKeywordStore`] backed by a lock-guarded map, seeded
/// with [`DEFAULT_BANNED_KEYWORDS`] per tenant on first touch.
pub struct InMemoryKeywordStore {
    keywords: parking_lot::RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryKeywordStore {
    /// Builds an empty store; every tenant gets the default list on first
    /// lookup.
    pub fn new() -> Self {
        Self {
            keywords: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    /// Overrides `tenant_id`'s keyword set (an admin write path outside the
    /// core's own endpoints).
    pub fn set_for(&self, tenant_id: &str, keywords: Vec<String>) {
        self.keywords
            .write()
            .insert(tenant_id.to_string(), keywords);
    }
}

impl Default for InMemoryKeywordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BannedKeywordStore for InMemoryKeywordStore {
    async fn keywords_for(&self, tenant_id: &str) -> Vec<String> {
        if let Some(existing) = self.keywords.read().get(tenant_id) {
            return existing.clone();
        }
        let defaults: Vec<String> = DEFAULT_BANNED_KEYWORDS
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.keywords
            .write()
            .insert(tenant_id.to_string(), defaults.clone());
        defaults
    }
}

/// Successful outcome of [`PolicyEngine::check`] (spec §4.3 "Result").
#[derive(Debug, Clone)]
pub struct PolicyPass {
    /// The resolved key's owning tenant.
    pub tenant_id: String,
    /// The resolved key's label.
    pub key_name: String,
    /// Length in bytes of the checked text (0 if none was supplied).
    pub text_length: usize,
    /// The API key that resolved, verbatim (so the Orchestrator can bump
    /// its `last_used` timestamp without re-extracting it).
    pub api_key: String,
}

const MIN_KEY_LEN: usize = 10;
const MAX_KEY_LEN: usize = 200;
const SUSPICIOUS_CHARS: &[char] = &['<', '>', '"', '\'', '&', ';', '(', ')'];
const MAX_TEXT_LEN: usize = 10_000;
const REPETITION_MIN_TOKENS: usize = 11;
const REPETITION_MAX_SHARE: f64 = 0.3;

/// Validates an API key and, if text is supplied, scans it for policy
/// violations (spec §4.3).
pub struct PolicyEngine {
    resolver: Arc<dyn ApiKeyResolver>,
    keywords: Arc<dyn BannedKeywordStore>,
}

impl PolicyEngine {
    /// Builds an engine around injected key-resolution and keyword-storage
    /// capabilities.
    pub fn new(resolver: Arc<dyn ApiKeyResolver>, keywords: Arc<dyn BannedKeywordStore>) -> Self {
        Self { resolver, keywords }
    }

    /// Runs the full check pipeline for `(api_key, text)`, short-circuiting
    /// on the first failing step.
    pub async fn check(&self, api_key: Option<&str>, text: &str) -> Result<PolicyPass, PolicyError> {
        let key = check_key_syntax(api_key)?;

        let resolved = self
            .resolver
            .resolve(key)
            .await
            .ok_or(PolicyError::ApiKeyNotFound)?;

        if resolved.state != KeyState::Enabled {
            return Err(PolicyError::ApiKeyInactive);
        }
        if resolved.tenant_status != TenantStatus::Active {
            return Err(PolicyError::UserAccountInactive);
        }

        if !text.is_empty() {
            let keywords = self.keywords.keywords_for(&resolved.tenant_id).await;
            check_banned_keywords(text, &keywords)?;
            check_content_heuristics(text)?;
        }

        Ok(PolicyPass {
            tenant_id: resolved.tenant_id,
            key_name: resolved.key_name,
            text_length: text.len(),
            api_key: key.to_string(),
        })
    }

    /// Best-effort bump of the resolved key's last-used timestamp (spec
    /// §4.4 step 9). Called by the Orchestrator after a request's full
    /// pipeline completes, not as part of the check itself.
    pub async fn touch_last_used(&self, api_key: &str) {
        self.resolver.touch_last_used(api_key).await;
    }
}

fn check_key_syntax(api_key: Option<&str>) -> Result<&str, PolicyError> {
    let key = api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(PolicyError::MissingApiKey)?;

    if key.len() < MIN_KEY_LEN || key.len() > MAX_KEY_LEN {
        return Err(PolicyError::InvalidApiKeyFormat);
    }
    if key.chars().any(|c| SUSPICIOUS_CHARS.contains(&c)) {
        return Err(PolicyError::InvalidApiKeyChars);
    }
    Ok(key)
}

fn check_banned_keywords(text: &str, keywords: &[String]) -> Result<(), PolicyError> {
    let lowered = text.to_lowercase();
    for keyword in keywords {
        if lowered.contains(keyword.as_str()) {
            return Err(PolicyError::BannedKeyword {
                keyword: keyword.clone(),
            });
        }
    }
    Ok(())
}

/// Length cap plus the deterministic repetition heuristic that stands in
/// for a pluggable external moderator (spec §4.3 step 6).
///
/// Resolves the spec's open question on the `len(words) == 11` boundary by
/// using the exact rule stated in §4.3: blocked when total tokens `>= 11`
/// and some token's share strictly exceeds 30%.
fn check_content_heuristics(text: &str) -> Result<(), PolicyError> {
    if text.len() > MAX_TEXT_LEN {
        return Err(PolicyError::TextTooLong);
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < REPETITION_MIN_TOKENS {
        return Ok(());
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in &words {
        *counts.entry(*word).or_insert(0) += 1;
    }

    let total = words.len() as f64;
    if let Some(max_count) = counts.values().max() {
        if (*max_count as f64) > total * REPETITION_MAX_SHARE {
            return Err(PolicyError::ExternalApiBlocked {
                reason: "excessive word repetition detected".to_string(),
            });
        }
    }

    Ok(())
}
