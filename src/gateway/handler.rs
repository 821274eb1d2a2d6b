//! HTTP handlers for the proxy endpoint and the admin/ops surface (spec §6).

use crate::constants::MAX_REQUEST_BODY_BYTES;
use crate::gateway::error::GatewayError;
use crate::gateway::state::HandlerState;
use crate::hashing::tenant_scope;
use crate::orchestrator::{ChatMessage, RawProxyRequest};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream call budget applied when no per-request deadline is supplied.
const DEFAULT_UPSTREAM_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct ProxyRequestWire {
    api_key: Option<String>,
    text: Option<String>,
    messages: Option<Vec<ChatMessage>>,
    model: Option<String>,
    temperature: Option<f32>,
    #[serde(default)]
    policy_only: bool,
}

/// `POST /proxy` and its alias `POST /v1/chat/completions` (spec §6 "Proxy
/// endpoint").
pub async fn proxy_handler(
    State(state): State<HandlerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client_ip = client_ip_from_headers(&headers);

    if !state.rate_limiter.check_and_record(&client_ip) {
        return GatewayError::RateLimitExceeded.into_response();
    }

    let wire = match parse_body::<ProxyRequestWire>(&body) {
        Ok(wire) => wire,
        Err(err) => return err.into_response(),
    };

    let api_key = wire
        .api_key
        .clone()
        .or_else(|| extract_api_key_from_headers(&headers));
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = RawProxyRequest {
        api_key,
        text: wire.text,
        messages: wire.messages,
        model: wire.model,
        temperature: wire.temperature,
        policy_only: wire.policy_only,
    };

    let response = state
        .orchestrator
        .process(
            request,
            client_ip,
            user_agent,
            Some(DEFAULT_UPSTREAM_DEADLINE),
        )
        .await;

    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.payload)).into_response()
}

/// `GET /logs/{proxy_id}` (spec §6 "Log retrieval").
pub async fn get_log_handler(
    State(state): State<HandlerState>,
    Path(proxy_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let tenant_id = match resolve_admin_tenant(&state, &headers).await {
        Ok(tenant_id) => tenant_id,
        Err(err) => return err.into_response(),
    };

    let record = match state.orchestrator.log_sink().get(&proxy_id).await {
        Some(record) => record,
        None => return GatewayError::NotFound.into_response(),
    };

    if record.tenant_scope != tenant_scope(&tenant_id) {
        return GatewayError::WrongTenant.into_response();
    }

    Json(record).into_response()
}

#[derive(Serialize)]
struct ValueResponse<T: Serialize> {
    success: bool,
    value: T,
}

#[derive(Deserialize)]
struct TtlWrite {
    ttl_seconds: u64,
}

/// `GET /ttl/{api_key}` (spec §6 "Tenant settings").
pub async fn get_ttl_handler(
    State(state): State<HandlerState>,
    Path(api_key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let tenant_id = match resolve_tenant_for_key(&state, &headers, &api_key).await {
        Ok(tenant_id) => tenant_id,
        Err(err) => return err.into_response(),
    };
    let scope = tenant_scope(&tenant_id);
    let settings = state.orchestrator.tenant_settings().get_or_default(&scope);
    Json(ValueResponse {
        success: true,
        value: settings.ttl_seconds,
    })
    .into_response()
}

/// `POST /ttl/{api_key}` (spec §6 "Tenant settings").
pub async fn post_ttl_handler(
    State(state): State<HandlerState>,
    Path(api_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tenant_id = match resolve_tenant_for_key(&state, &headers, &api_key).await {
        Ok(tenant_id) => tenant_id,
        Err(err) => return err.into_response(),
    };
    let write = match parse_body::<TtlWrite>(&body) {
        Ok(write) => write,
        Err(err) => return err.into_response(),
    };
    let scope = tenant_scope(&tenant_id);
    state
        .orchestrator
        .tenant_settings()
        .set_ttl(&scope, write.ttl_seconds);
    Json(ValueResponse {
        success: true,
        value: write.ttl_seconds,
    })
    .into_response()
}

#[derive(Deserialize)]
struct SimilarityThresholdWrite {
    similarity_threshold: f32,
}

/// `GET /similarity-threshold/{api_key}` (spec §6 "Tenant settings").
pub async fn get_similarity_threshold_handler(
    State(state): State<HandlerState>,
    Path(api_key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let tenant_id = match resolve_tenant_for_key(&state, &headers, &api_key).await {
        Ok(tenant_id) => tenant_id,
        Err(err) => return err.into_response(),
    };
    let scope = tenant_scope(&tenant_id);
    let settings = state.orchestrator.tenant_settings().get_or_default(&scope);
    Json(ValueResponse {
        success: true,
        value: settings.similarity_threshold,
    })
    .into_response()
}

/// `POST /similarity-threshold/{api_key}` (spec §6 "Tenant settings").
pub async fn post_similarity_threshold_handler(
    State(state): State<HandlerState>,
    Path(api_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tenant_id = match resolve_tenant_for_key(&state, &headers, &api_key).await {
        Ok(tenant_id) => tenant_id,
        Err(err) => return err.into_response(),
    };
    let write = match parse_body::<SimilarityThresholdWrite>(&body) {
        Ok(write) => write,
        Err(err) => return err.into_response(),
    };
    let scope = tenant_scope(&tenant_id);
    state
        .orchestrator
        .tenant_settings()
        .set_similarity_threshold(&scope, write.similarity_threshold);
    Json(ValueResponse {
        success: true,
        value: write.similarity_threshold,
    })
    .into_response()
}

/// `GET /cache/stats` (spec §6 "Cache admin").
pub async fn cache_stats_handler(State(state): State<HandlerState>) -> Response {
    Json(state.orchestrator.cache().stats()).into_response()
}

/// `POST /cache/invalidate/{api_key}` (spec §6 "Cache admin").
pub async fn cache_invalidate_handler(
    State(state): State<HandlerState>,
    Path(api_key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let tenant_id = match resolve_tenant_for_key(&state, &headers, &api_key).await {
        Ok(tenant_id) => tenant_id,
        Err(err) => return err.into_response(),
    };
    let scope = tenant_scope(&tenant_id);
    let removed = state.orchestrator.cache().invalidate_tenant(&scope);
    Json(ValueResponse {
        success: true,
        value: removed,
    })
    .into_response()
}

const CONFIRMATION_TOKEN_HEADER: &str = "x-admin-confirmation-token";

/// `POST /cache/clear` (spec §6 "Cache admin": "allowed only in
/// non-production modes gated by a confirmation token header").
pub async fn cache_clear_handler(
    State(state): State<HandlerState>,
    headers: HeaderMap,
) -> Response {
    if state.production_mode {
        return GatewayError::AdminNotPermitted.into_response();
    }
    let supplied = headers
        .get(CONFIRMATION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    match (&state.admin_confirmation_token, supplied) {
        (Some(expected), Some(got)) if expected == got => {
            state.orchestrator.cache().clear();
            Json(ValueResponse {
                success: true,
                value: "cleared",
            })
            .into_response()
        }
        _ => GatewayError::AdminNotPermitted.into_response(),
    }
}

/// Resolves `api_key` from the `Authorization`/`X-API-Key` headers via the
/// policy engine, without running the banned-keyword/content checks (empty
/// text short-circuits them).
async fn resolve_admin_tenant(
    state: &HandlerState,
    headers: &HeaderMap,
) -> Result<String, GatewayError> {
    let key = extract_api_key_from_headers(headers).ok_or(GatewayError::MissingApiKey)?;
    let pass = state
        .orchestrator
        .policy()
        .check(Some(&key), "")
        .await
        .map_err(GatewayError::PolicyRejected)?;
    Ok(pass.tenant_id)
}

/// Resolves the tenant for an admin endpoint keyed by `{api_key}` in the
/// path, and confirms the presented header key matches that same tenant
/// (spec §6: "All require a valid key belonging to the affected tenant").
async fn resolve_tenant_for_key(
    state: &HandlerState,
    headers: &HeaderMap,
    path_api_key: &str,
) -> Result<String, GatewayError> {
    let caller_tenant = resolve_admin_tenant(state, headers).await?;
    let target = state
        .orchestrator
        .policy()
        .check(Some(path_api_key), "")
        .await
        .map_err(GatewayError::PolicyRejected)?;
    if target.tenant_id != caller_tenant {
        return Err(GatewayError::WrongTenant);
    }
    Ok(target.tenant_id)
}

fn extract_api_key_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if let Some(rest) = s.strip_prefix("Bearer ") {
                return Some(rest.trim().to_string());
            }
        }
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn client_ip_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, GatewayError> {
    if body.len() > MAX_REQUEST_BODY_BYTES {
        return Err(GatewayError::RequestTooLarge);
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| GatewayError::InvalidJson)?;
    if !value.is_object() {
        return Err(GatewayError::InvalidDataType);
    }
    serde_json::from_value(value).map_err(|_| GatewayError::InvalidDataType)
}
