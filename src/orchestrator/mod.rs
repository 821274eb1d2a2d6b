//! Drives the per-request pipeline: PolicyEngine → SemanticCache →
//! UpstreamClient, emitting one log record and one analytics record per
//! terminal state (spec §4.4).

pub mod analytics;
pub mod chat;
pub mod tenant_settings;
pub mod upstream;

pub use analytics::{AnalyticsSink, InMemoryAnalyticsStore, LogSink, ProxyAnalyticsRecord, ProxyLogRecord};
pub use chat::{ChatCompletionResponse, ChatMessage, ChatRequest};
pub use tenant_settings::{TenantSettings, TenantSettingsRegistry};
pub use upstream::{ReqwestUpstreamClient, UpstreamClient, UpstreamError, UpstreamReply};

use crate::cache::SemanticCache;
use crate::constants::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::embedding::EmbeddingEncoder;
use crate::hashing::{fingerprint, tenant_scope};
use crate::policy::{PolicyEngine, PolicyError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Request body normalized from JSON, before the native/OpenAI-shape split
/// is resolved (spec §4.4 "Input normalization", §6 request body).
#[derive(Debug, Clone, Default)]
pub struct RawProxyRequest {
    /// `api_key` from the JSON body, if present. The Gateway merges in the
    /// `Authorization`/`X-API-Key` header fallback before this reaches the
    /// Orchestrator (spec §4.4: "If absent from the body, consult the
    /// `Authorization: Bearer ...` header then `X-API-Key`").
    pub api_key: Option<String>,
    /// Native `text` field.
    pub text: Option<String>,
    /// OpenAI-style `messages` field.
    pub messages: Option<Vec<ChatMessage>>,
    /// Model identifier; defaults to [`DEFAULT_MODEL`].
    pub model: Option<String>,
    /// Sampling temperature; defaults to [`DEFAULT_TEMPERATURE`].
    pub temperature: Option<f32>,
    /// When true, skip cache and upstream; return only the policy verdict.
    pub policy_only: bool,
}

impl RawProxyRequest {
    /// Derives `text` as the newline-joined concatenation of all
    /// `role == "user"` message contents, preserving order, when `messages`
    /// is present; otherwise falls back to the native `text` field.
    fn resolved_text(&self) -> String {
        if let Some(messages) = &self.messages {
            return messages
                .iter()
                .filter(|m| m.role == "user")
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");
        }
        self.text.clone().unwrap_or_default()
    }
}

/// High-level classification of a terminal [`ProxyResponse`] (spec §3
/// "ProxyResponse (core-level)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyResponseKind {
    /// Request served successfully, from cache or upstream.
    Ok,
    /// Policy rejected the key or tenant (401 group).
    AuthFailed,
    /// Policy rejected the content itself (banned keyword, length, heuristic).
    ContentBlocked,
    /// Request shape or key syntax was invalid.
    ValidationFailed,
    /// Upstream call failed or was cancelled/timed out.
    UpstreamError,
    /// Internal failure (e.g. embedding load failure).
    InternalError,
}

/// The terminal result of [`Orchestrator::process`] (spec §3
/// "ProxyResponse (core-level)").
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub success: bool,
    pub status_code: u16,
    pub kind: ProxyResponseKind,
    pub payload: ChatCompletionResponse,
    pub proxy_id: String,
    pub from_cache: bool,
    pub similarity: Option<f32>,
    /// Stable `error_code` for the HTTP error envelope, `None` on success.
    pub error_code: Option<&'static str>,
}

/// Drives the per-request pipeline described in spec §4.4.
pub struct Orchestrator {
    policy: PolicyEngine,
    cache: SemanticCache,
    encoder: Arc<dyn EmbeddingEncoder>,
    upstream: Arc<dyn UpstreamClient>,
    tenant_settings: TenantSettingsRegistry,
    log_sink: Arc<dyn LogSink>,
    analytics_sink: Arc<dyn AnalyticsSink>,
}

impl Orchestrator {
    /// Wires the five capability handles the pipeline needs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: PolicyEngine,
        cache: SemanticCache,
        encoder: Arc<dyn EmbeddingEncoder>,
        upstream: Arc<dyn UpstreamClient>,
        tenant_settings: TenantSettingsRegistry,
        log_sink: Arc<dyn LogSink>,
        analytics_sink: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            policy,
            cache,
            encoder,
            upstream,
            tenant_settings,
            log_sink,
            analytics_sink,
        }
    }

    /// Read-only access to the cache, for the `/cache/*` admin endpoints.
    pub fn cache(&self) -> &SemanticCache {
        &self.cache
    }

    /// Read-only access to the policy engine, for admin endpoints that need
    /// to resolve an API key to its owning tenant without running the full
    /// request pipeline (`check(key, "")` skips the banned-keyword/content
    /// steps entirely since they only apply to non-empty text).
    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Read-only access to tenant settings, for the `/ttl/*` and
    /// `/similarity-threshold/*` admin endpoints.
    pub fn tenant_settings(&self) -> &TenantSettingsRegistry {
        &self.tenant_settings
    }

    /// Read-only access to the log store, for `GET /logs/{proxy_id}`.
    ///
    /// Only meaningful when the orchestrator was built with an
    /// [`InMemoryAnalyticsStore`]; callers that want `GET /logs/{proxy_id}`
    /// against some other [`LogSink`] should query it directly.
    pub fn log_sink(&self) -> &Arc<dyn LogSink> {
        &self.log_sink
    }

    /// Entry contract: `process(request_data, client_ip, user_agent) ->
    /// ProxyResponse` (spec §4.4).
    ///
    /// `deadline` propagates a caller-specified upstream budget (spec §5
    /// "Cancellation and timeouts"); policy, cache, and embedding steps are
    /// not cancellable since they are bounded CPU.
    #[instrument(skip(self, request, user_agent), fields(proxy_id = tracing::field::Empty))]
    pub async fn process(
        &self,
        request: RawProxyRequest,
        client_ip: String,
        user_agent: Option<String>,
        deadline: Option<Duration>,
    ) -> ProxyResponse {
        let proxy_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("proxy_id", tracing::field::display(&proxy_id));
        let t0 = Instant::now();
        let created = chrono::Utc::now().timestamp();

        let model = request.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let text = request.resolved_text();

        info!(
            api_key_last4 = %last4(request.api_key.as_deref()),
            model = %model,
            "proxy request received"
        );

        let policy_result = self.policy.check(request.api_key.as_deref(), &text).await;

        let pass = match policy_result {
            Ok(pass) => pass,
            Err(err) => {
                let response = self
                    .finish_policy_rejected(
                        &proxy_id,
                        &model,
                        created,
                        err,
                        request.api_key.as_deref(),
                        t0,
                        &client_ip,
                        user_agent,
                    )
                    .await;
                return response;
            }
        };

        let scope = tenant_scope(&pass.tenant_id);

        if request.policy_only {
            let payload = ChatCompletionResponse::error(
                &proxy_id,
                &model,
                "policy_only",
                "policy check passed",
                created,
            );
            self.finish(
                &proxy_id,
                &scope,
                &pass.api_key,
                &model,
                temperature,
                ProxyResponseKind::Ok,
                200,
                None,
                payload,
                false,
                None,
                t0,
                &client_ip,
                user_agent,
            )
            .await
        } else {
            self.process_cache_and_upstream(
                proxy_id, scope, pass.api_key, model, temperature, text, created, t0, client_ip,
                user_agent, deadline,
            )
            .await
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_cache_and_upstream(
        &self,
        proxy_id: String,
        tenant_scope: String,
        api_key: String,
        model: String,
        temperature: f32,
        text: String,
        created: i64,
        t0: Instant,
        client_ip: String,
        user_agent: Option<String>,
        deadline: Option<Duration>,
    ) -> ProxyResponse {
        let fp = fingerprint(&tenant_scope, &text, &model, temperature);

        let embedding = match self.encoder.encode(&text) {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, "embedding encoder failed");
                let payload = ChatCompletionResponse::error(
                    &proxy_id,
                    &model,
                    "internal_error",
                    "embedding generation failed",
                    created,
                );
                return self
                    .finish(
                        &proxy_id,
                        &tenant_scope,
                        &api_key,
                        &model,
                        temperature,
                        ProxyResponseKind::InternalError,
                        500,
                        Some("INTERNAL_SERVER_ERROR"),
                        payload,
                        false,
                        None,
                        t0,
                        &client_ip,
                        user_agent,
                    )
                    .await;
            }
        };

        let settings = self.tenant_settings.get_or_default(&tenant_scope);
        let lookup = self
            .cache
            .semantic_lookup(&tenant_scope, &embedding, settings.similarity_threshold);

        if lookup.hit {
            let entry = lookup.entry.expect("hit implies Some(entry)");
            self.cache.access(&tenant_scope, &entry.key);
            let payload = match serde_json::from_value::<ChatCompletionResponse>(entry.response) {
                Ok(cached) => cached.with_proxy_id(&proxy_id),
                Err(_) => {
                    // Cache failure degrades to a miss, never a request failure
                    // (spec §4.2 "Failure semantics"); fall through to upstream.
                    return self
                        .call_upstream_and_finish(
                            proxy_id, tenant_scope, api_key, fp, model, temperature, text,
                            embedding, created, t0, client_ip, user_agent, deadline,
                            settings.ttl_seconds,
                        )
                        .await;
                }
            };
            return self
                .finish(
                    &proxy_id,
                    &tenant_scope,
                    &api_key,
                    &model,
                    temperature,
                    ProxyResponseKind::Ok,
                    200,
                    None,
                    payload,
                    true,
                    Some(lookup.best_similarity),
                    t0,
                    &client_ip,
                    user_agent,
                )
                .await;
        }

        self.call_upstream_and_finish(
            proxy_id, tenant_scope, api_key, fp, model, temperature, text, embedding, created, t0,
            client_ip, user_agent, deadline, settings.ttl_seconds,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn call_upstream_and_finish(
        &self,
        proxy_id: String,
        tenant_scope: String,
        api_key: String,
        fp: String,
        model: String,
        temperature: f32,
        text: String,
        embedding: Vec<f32>,
        created: i64,
        t0: Instant,
        client_ip: String,
        user_agent: Option<String>,
        deadline: Option<Duration>,
        ttl_seconds: u64,
    ) -> ProxyResponse {
        let call = self.upstream.complete(&text, &model, temperature);
        let outcome = match deadline {
            Some(budget) => match tokio::time::timeout(budget, call).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Deadline),
            },
            None => call.await,
        };

        match outcome {
            Ok(reply) => {
                let response = reply.into_response(&proxy_id, &model, created);
                let response_json = serde_json::to_value(&response).unwrap_or_default();
                self.cache.put(
                    &tenant_scope,
                    &fp,
                    &text,
                    embedding,
                    response_json,
                    ttl_seconds,
                );
                self.policy.touch_last_used(&api_key).await;
                self.finish(
                    &proxy_id,
                    &tenant_scope,
                    &api_key,
                    &model,
                    temperature,
                    ProxyResponseKind::Ok,
                    200,
                    None,
                    response,
                    false,
                    None,
                    t0,
                    &client_ip,
                    user_agent,
                )
                .await
            }
            Err(err) => {
                let reason = upstream_error_reason(&err);
                warn!(error = %err, "upstream call failed, not caching");
                let payload =
                    ChatCompletionResponse::error(&proxy_id, &model, "upstream_error", reason, created);
                self.finish(
                    &proxy_id,
                    &tenant_scope,
                    &api_key,
                    &model,
                    temperature,
                    ProxyResponseKind::UpstreamError,
                    500,
                    Some("UPSTREAM_ERROR"),
                    payload,
                    false,
                    None,
                    t0,
                    &client_ip,
                    user_agent,
                )
                .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_policy_rejected(
        &self,
        proxy_id: &str,
        model: &str,
        created: i64,
        err: PolicyError,
        attempted_key: Option<&str>,
        t0: Instant,
        client_ip: &str,
        user_agent: Option<String>,
    ) -> ProxyResponse {
        let kind = policy_error_kind(&err);
        let status = err.http_status();
        let error_code = err.error_code();
        let payload = ChatCompletionResponse::error(proxy_id, model, error_code, &err.to_string(), created);

        self.finish(
            proxy_id,
            "unknown",
            attempted_key.unwrap_or(""),
            model,
            DEFAULT_TEMPERATURE,
            kind,
            status,
            Some(error_code),
            payload,
            false,
            None,
            t0,
            client_ip,
            user_agent,
        )
        .await
    }

    /// Common terminal-state tail: emits exactly one log record and one
    /// analytics record, then returns the assembled response (spec §4.4
    /// "Terminal states always emit exactly one log record and one
    /// analytics record").
    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        proxy_id: &str,
        tenant_scope: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        kind: ProxyResponseKind,
        status_code: u16,
        error_code: Option<&'static str>,
        payload: ChatCompletionResponse,
        from_cache: bool,
        similarity: Option<f32>,
        t0: Instant,
        client_ip: &str,
        user_agent: Option<String>,
    ) -> ProxyResponse {
        let processing_time_ms = t0.elapsed().as_millis() as u64;
        let success = matches!(kind, ProxyResponseKind::Ok);

        let log_record = ProxyLogRecord {
            proxy_id: proxy_id.to_string(),
            tenant_scope: tenant_scope.to_string(),
            api_key_last4: last4(Some(api_key)),
            model: model.to_string(),
            cache_hit: from_cache,
            success,
            status_code,
            error_code: error_code.map(str::to_string),
            processing_time_ms,
            client_ip: client_ip.to_string(),
            user_agent: user_agent.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.log_sink.record(log_record).await;

        let analytics_record = ProxyAnalyticsRecord {
            proxy_id: proxy_id.to_string(),
            tenant_scope: tenant_scope.to_string(),
            api_key_id: api_key.to_string(),
            model: model.to_string(),
            temperature,
            cache_hit: from_cache,
            success,
            status_code,
            error_code: error_code.map(str::to_string),
            input_tokens: payload.usage.prompt_tokens,
            output_tokens: payload.usage.completion_tokens,
            total_tokens: payload.usage.total_tokens,
            cost_input: 0.0,
            cost_output: 0.0,
            processing_time_ms,
            client_ip: client_ip.to_string(),
            user_agent,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.analytics_sink.record(analytics_record).await;

        ProxyResponse {
            success,
            status_code,
            kind,
            payload,
            proxy_id: proxy_id.to_string(),
            from_cache,
            similarity,
            error_code,
        }
    }
}

fn policy_error_kind(err: &PolicyError) -> ProxyResponseKind {
    match err {
        PolicyError::MissingApiKey
        | PolicyError::InvalidApiKeyFormat
        | PolicyError::InvalidApiKeyChars => ProxyResponseKind::ValidationFailed,
        PolicyError::ApiKeyNotFound | PolicyError::ApiKeyInactive | PolicyError::UserAccountInactive => {
            ProxyResponseKind::AuthFailed
        }
        PolicyError::BannedKeyword { .. }
        | PolicyError::TextTooLong
        | PolicyError::ExternalApiBlocked { .. } => ProxyResponseKind::ContentBlocked,
    }
}

/// Derives the human-readable reason surfaced for an upstream failure (spec
/// §7 "Propagation").
fn upstream_error_reason(err: &UpstreamError) -> &str {
    match err {
        UpstreamError::Cancelled => "cancelled",
        UpstreamError::Deadline => "deadline",
        UpstreamError::AuthenticationFailed => "provider authentication failed",
        UpstreamError::RateLimited => "provider rate limit exceeded",
        UpstreamError::ServiceError => "provider service error",
        UpstreamError::Other(msg) => msg.as_str(),
    }
}

/// Last four characters of `api_key`, never the full key (spec §4.4 step 2:
/// "structured, no secrets beyond the key's last 4 characters").
fn last4(api_key: Option<&str>) -> String {
    match api_key {
        Some(key) if key.len() >= 4 => key[key.len() - 4..].to_string(),
        Some(key) => key.to_string(),
        None => String::new(),
    }
}
