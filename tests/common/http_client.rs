//! HTTP client helpers for tests.

use proxygate::ChatCompletionResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

/// A parsed non-2xx response from the admin/ops surface (spec §6 "Error
/// envelope").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error_code: String,
    pub message: String,
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    /// `POST /proxy`. Always returns the status code alongside the parsed
    /// chat-completion envelope, since that envelope shape is stable across
    /// both success and failure (spec §4.4.a).
    pub async fn proxy(
        &self,
        body: Value,
        api_key: Option<&str>,
    ) -> Result<(u16, ChatCompletionResponse), TestClientError> {
        let mut builder = self.client.post(self.url("/proxy")).json(&body);
        if let Some(key) = api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let payload = resp.json::<ChatCompletionResponse>().await?;
        Ok((status, payload))
    }

    /// `POST /proxy` with the request body carrying `api_key` itself, rather
    /// than a header.
    pub async fn proxy_with_body_key(
        &self,
        mut body: Value,
        api_key: &str,
    ) -> Result<(u16, ChatCompletionResponse), TestClientError> {
        body["api_key"] = json!(api_key);
        self.proxy(body, None).await
    }

    pub async fn get_log(
        &self,
        proxy_id: &str,
        api_key: &str,
    ) -> Result<(u16, Value), TestClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/logs/{proxy_id}")))
            .bearer_auth(api_key)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await?;
        Ok((status, body))
    }

    pub async fn get_ttl(&self, api_key: &str) -> Result<(u16, Value), TestClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/ttl/{api_key}")))
            .bearer_auth(api_key)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await?;
        Ok((status, body))
    }

    pub async fn post_ttl(
        &self,
        api_key: &str,
        ttl_seconds: u64,
    ) -> Result<(u16, Value), TestClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/ttl/{api_key}")))
            .bearer_auth(api_key)
            .json(&json!({ "ttl_seconds": ttl_seconds }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await?;
        Ok((status, body))
    }

    pub async fn get_similarity_threshold(
        &self,
        api_key: &str,
    ) -> Result<(u16, Value), TestClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/similarity-threshold/{api_key}")))
            .bearer_auth(api_key)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await?;
        Ok((status, body))
    }

    pub async fn post_similarity_threshold(
        &self,
        api_key: &str,
        similarity_threshold: f32,
    ) -> Result<(u16, Value), TestClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/similarity-threshold/{api_key}")))
            .bearer_auth(api_key)
            .json(&json!({ "similarity_threshold": similarity_threshold }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await?;
        Ok((status, body))
    }

    pub async fn cache_stats(&self) -> Result<(u16, Value), TestClientError> {
        let resp = self.client.get(self.url("/cache/stats")).send().await?;
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await?;
        Ok((status, body))
    }

    pub async fn cache_invalidate(
        &self,
        api_key: &str,
    ) -> Result<(u16, Value), TestClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/cache/invalidate/{api_key}")))
            .bearer_auth(api_key)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.json::<Value>().await?;
        Ok((status, body))
    }

    pub async fn cache_clear(&self, confirmation_token: Option<&str>) -> Result<u16, TestClientError> {
        let mut builder = self.client.post(self.url("/cache/clear"));
        if let Some(token) = confirmation_token {
            builder = builder.header("x-admin-confirmation-token", token);
        }
        let resp = builder.send().await?;
        Ok(resp.status().as_u16())
    }

    pub async fn health(&self) -> Result<HealthResponse, TestClientError> {
        let resp = self.client.get(self.url("/healthz")).send().await?;
        Ok(resp.json().await?)
    }

    pub async fn ready(&self) -> Result<ReadyResponse, TestClientError> {
        let resp = self.client.get(self.url("/ready")).send().await?;
        Ok(resp.json().await?)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadyResponse {
    pub status: String,
}

impl ReadyResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_url_building() {
        let client = TestClient::new("http://localhost:8080");
        assert_eq!(client.url("/healthz"), "http://localhost:8080/healthz");
        assert_eq!(client.url("healthz"), "http://localhost:8080/healthz");
    }

    #[test]
    fn test_ready_response_is_ok_helper() {
        let ready = ReadyResponse {
            status: "ok".to_string(),
        };
        assert!(ready.is_ok());
    }
}
