//! # proxygate
//!
//! A semantic-caching LLM proxy gateway.
//!
//! Requests flow through a fixed pipeline before ever reaching an upstream
//! provider:
//!
//! ```text
//! Request → PolicyEngine → SemanticCache → Orchestrator → UpstreamClient
//! ```
//!
//! The [`policy`] module validates the caller's API key and scans content
//! for banned keywords and heuristic abuse; the [`cache`] module serves
//! repeat prompts from a per-tenant, cosine-similarity index instead of
//! re-invoking the provider; the [`orchestrator`] module drives the full
//! per-request state machine and owns the terminal logging/analytics
//! contract. [`gateway`] is the thin Axum layer in front of all of it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use proxygate::Config;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `cpu` | CPU-only embedding inference (docs.rs default) |
//! | `metal` | Apple Silicon GPU acceleration |
//! | `cuda` | NVIDIA GPU acceleration |
//! | `mock` | Test doubles for the orchestrator's capability seams |
//!
//! ## Modules
//!
//! - [`cache`] - Per-tenant semantic cache
//! - [`config`] - Environment-backed configuration
//! - [`embedding`] - Text-to-vector encoder (deterministic or BERT-backed)
//! - [`gateway`] - Axum HTTP surface
//! - [`hashing`] - Tenant scoping and cache-key fingerprinting
//! - [`orchestrator`] - Per-request pipeline and terminal logging/analytics
//! - [`policy`] - API key validation and content moderation

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod gateway;
pub mod hashing;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod orchestrator;
pub mod policy;

pub use cache::{CacheEntry, CacheStats, LookupResult, SemanticCache, TenantCacheStats};
pub use config::{Config, ConfigError};
pub use constants::{DimValidationError, validate_embedding_dim};
pub use embedding::{EmbeddingEncoder, EmbeddingError, LazyEncoder};
pub use gateway::{HandlerState, create_router_with_state};
pub use hashing::{fingerprint, tenant_scope};
pub use orchestrator::{
    AnalyticsSink, ChatCompletionResponse, InMemoryAnalyticsStore, LogSink, Orchestrator,
    ProxyResponse, ProxyResponseKind, RawProxyRequest, TenantSettings, TenantSettingsRegistry,
    UpstreamClient, UpstreamError,
};
pub use policy::{
    ApiKeyResolver, BannedKeywordStore, EnvApiKeyResolver, InMemoryKeywordStore, PolicyEngine,
    PolicyError, ResolvedKey,
};
