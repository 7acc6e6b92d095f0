use std::sync::Arc;

use admin_kit::backend::{MemoryBackend, Services, UserHooks, api_dispatcher};
use admin_kit::config::AppConfig;
use admin_kit::dispatch::api_routes;
use admin_kit::email::SmtpMailer;
use admin_kit::onboarding::account::API_MOUNT;
use anyhow::Context;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(AppConfig::from_env().context("Failed to load configuration")?);
    if config.email.api_key.is_none() {
        tracing::warn!("SENDGRID_API_KEY is not set, outgoing email will fail");
    }

    // ── Services ────────────────────────────────────────────────────────
    let backend = Arc::new(MemoryBackend::new(config.password_reset_url.clone()));
    let services = Services {
        identity: backend.clone(),
        store: backend,
        mailer: Arc::new(SmtpMailer::new(config.email.clone())),
        hooks: UserHooks::default(),
    };
    let dispatcher = Arc::new(api_dispatcher(Arc::clone(&config), services)?);

    // ── HTTP ────────────────────────────────────────────────────────────
    let mount = format!("{}{}", config.base_path, API_MOUNT);
    let app = api_routes(Arc::clone(&dispatcher), &mount).layer(CorsLayer::permissive());

    eprintln!("admin-kit v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}{}/", config.port, mount);
    eprintln!("   Routes: {}", dispatcher.routes().join(", "));
    eprintln!("   Mode: {}", if config.dev_mode { "development" } else { "production" });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, mount = %mount, "API server started");
    axum::serve(listener, app).await?;

    Ok(())
}
