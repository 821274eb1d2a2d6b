//! Test server harness.

use proxygate::gateway::{HandlerState, create_router_with_state};
use proxygate::mock::{MockApiKeyResolver, MockKeywordStore, MockUpstreamClient};
use proxygate::policy::{KeyState, PolicyEngine, ResolvedKey, TenantStatus};
use proxygate::{InMemoryAnalyticsStore, LazyEncoder, Orchestrator, SemanticCache, TenantSettingsRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;
const TEST_EMBEDDING_DIM: usize = 16;
const TEST_DEFAULT_TTL_SECS: u64 = 86_400;
const TEST_DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.89;

/// A tenant and API key pre-registered with a spawned test server, so tests
/// can address the proxy and admin surface without touching key resolution
/// plumbing.
#[derive(Debug, Clone)]
pub struct TestTenant {
    pub api_key: String,
    pub tenant_id: String,
}

/// Knobs a test can set before spawning a server; everything else is a
/// fixed, deterministic test double.
pub struct TestServerConfig {
    pub port: u16,
    pub tenants: Vec<TestTenant>,
    pub upstream: MockUpstreamClient,
    pub banned_keywords: Option<Vec<String>>,
    pub production_mode: bool,
    pub admin_confirmation_token: Option<String>,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            tenants: vec![TestTenant {
                api_key: "goodkey1234567890".to_string(),
                tenant_id: "tenant-a".to_string(),
            }],
            upstream: MockUpstreamClient::succeeding("hello from upstream"),
            banned_keywords: None,
            production_mode: false,
            admin_confirmation_token: Some("let-me-in".to_string()),
        }
    }
}

impl TestServerConfig {
    /// Registers an additional tenant/key pair.
    pub fn with_tenant(mut self, api_key: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        self.tenants.push(TestTenant {
            api_key: api_key.into(),
            tenant_id: tenant_id.into(),
        });
        self
    }

    pub fn with_upstream(mut self, upstream: MockUpstreamClient) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_production_mode(mut self, production_mode: bool) -> Self {
        self.production_mode = production_mode;
        self
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn find_available_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    Ok(addr.port())
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Spawns a fully-mocked proxygate server: a deterministic embedding encoder,
/// an in-memory semantic cache, a fixed-table policy engine seeded with
/// `config.tenants`, and a scripted upstream client. No network calls ever
/// leave the process.
pub async fn spawn_test_server(config: TestServerConfig) -> Result<TestServer, ServerStartupError> {
    let port = if config.port == 0 {
        find_available_port().await?
    } else {
        config.port
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let mut resolver = MockApiKeyResolver::new();
    for tenant in &config.tenants {
        resolver = resolver.with_key(
            tenant.api_key.clone(),
            ResolvedKey {
                tenant_id: tenant.tenant_id.clone(),
                key_name: tenant.tenant_id.clone(),
                state: KeyState::Enabled,
                tenant_status: TenantStatus::Active,
            },
        );
    }

    let keywords: Arc<dyn proxygate::BannedKeywordStore> = match config.banned_keywords {
        Some(list) => Arc::new(MockKeywordStore::new(list)),
        None => Arc::new(MockKeywordStore::new(Vec::new())),
    };

    let policy = PolicyEngine::new(Arc::new(resolver), keywords);
    let cache = SemanticCache::new();
    let encoder: Arc<dyn proxygate::EmbeddingEncoder> =
        Arc::new(LazyEncoder::deterministic(TEST_EMBEDDING_DIM));
    let upstream: Arc<dyn proxygate::UpstreamClient> = Arc::new(config.upstream);
    let tenant_settings =
        TenantSettingsRegistry::new(TEST_DEFAULT_TTL_SECS, TEST_DEFAULT_SIMILARITY_THRESHOLD);
    let store = Arc::new(InMemoryAnalyticsStore::new());

    let orchestrator = Arc::new(Orchestrator::new(
        policy,
        cache,
        encoder,
        upstream,
        tenant_settings,
        store.clone(),
        store,
    ));

    let state = HandlerState::new(
        orchestrator,
        config.production_mode,
        config.admin_confirmation_token,
    );

    let app = create_router_with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    wait_for_server_ready(
        local_addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr: local_addr,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_available_port() {
        let port = find_available_port()
            .await
            .expect("Should find available port");
        assert!(port > 0);
    }

    #[tokio::test]
    async fn test_server_config_defaults() {
        let config = TestServerConfig::default();
        assert_eq!(config.port, 0);
        assert_eq!(config.tenants.len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let server = spawn_test_server(TestServerConfig::default())
            .await
            .expect("server should spawn");
        let url = server.url();
        assert!(url.starts_with("http://127.0.0.1:"));
        server.shutdown().await;
    }
}
