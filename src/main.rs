//! proxygate HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use proxygate::config::Config;
use proxygate::embedding::LazyEncoder;
use proxygate::gateway::{HandlerState, create_router_with_state};
use proxygate::orchestrator::{InMemoryAnalyticsStore, Orchestrator, ReqwestUpstreamClient};
use proxygate::policy::{EnvApiKeyResolver, InMemoryKeywordStore, PolicyEngine};
use proxygate::{SemanticCache, TenantSettingsRegistry};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
██████╗ ██████╗  ██████╗ ██╗  ██╗██╗   ██╗ ██████╗  █████╗ ████████╗███████╗
██╔══██╗██╔══██╗██╔═══██╗╚██╗██╔╝╚██╗ ██╔╝██╔════╝ ██╔══██╗╚══██╔══╝██╔════╝
██████╔╝██████╔╝██║   ██║ ╚███╔╝  ╚████╔╝ ██║  ███╗███████║   ██║   █████╗
██╔═══╝ ██╔══██╗██║   ██║ ██╔██╗   ╚██╔╝  ██║   ██║██╔══██║   ██║   ██╔══╝
██║     ██║  ██║╚██████╔╝██╔╝ ██╗   ██║   ╚██████╔╝██║  ██║   ██║   ███████╗
╚═╝     ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝   ╚═╝    ╚═════╝ ╚═╝  ╚═╝   ╚═╝   ╚══════╝

        policy checked. cached. proxied.
"#
    );

    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        "proxygate starting"
    );

    // Explicit startup order: EmbeddingEncoder → SemanticCache →
    // TenantSettings → Orchestrator (spec §9 "Lifecycle"). Nothing here
    // hydrates from or dehydrates to external storage; all state is
    // in-process and lost on restart by design (spec §9 "Persistence").
    let encoder: Arc<dyn proxygate::EmbeddingEncoder> = match &config.embedding_model_dir {
        Some(dir) => {
            let handle = LazyEncoder::bert(dir.clone(), proxygate::constants::DEFAULT_EMBEDDING_DIM);
            if let Err(err) = handle.ensure_loaded() {
                tracing::warn!(error = %err, "BERT encoder failed to load, falling back to deterministic");
                Arc::new(LazyEncoder::deterministic(
                    proxygate::constants::DEFAULT_EMBEDDING_DIM,
                ))
            } else {
                Arc::new(handle)
            }
        }
        None => Arc::new(LazyEncoder::deterministic(
            proxygate::constants::DEFAULT_EMBEDDING_DIM,
        )),
    };

    let cache = SemanticCache::with_max_size(config.cache_max_size);
    let tenant_settings = TenantSettingsRegistry::new(
        config.default_ttl_seconds,
        config.default_similarity_threshold,
    );

    let key_spec = std::env::var("PROXYGATE_API_KEYS").unwrap_or_default();
    let resolver = Arc::new(EnvApiKeyResolver::from_spec(&key_spec));
    let keywords = Arc::new(InMemoryKeywordStore::new());
    let policy = PolicyEngine::new(resolver, keywords);

    let upstream = Arc::new(ReqwestUpstreamClient::new(
        config.upstream_url.clone(),
        config.upstream_api_key.clone(),
    ));
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
        config.admin_confirmation_token.clone(),
    );

    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("proxygate shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("PROXYGATE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .expect("failed to build client");

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
