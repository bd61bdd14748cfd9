// PreVetScan HTTP service entry point.
//
// Startup sequence:
// 1. Load .env (if present) into the process environment
// 2. Initialize tracing (stdout)
// 3. Load config
// 4. Wire vendor clients
// 5. Serve until Ctrl+C

use std::net::SocketAddr;

use anyhow::Context;
use prevetscan_app::Services;
use prevetscan_core::config;
use prevetscan_server::{router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. A missing .env file is normal in production.
    let dotenv = dotenvy::dotenv();

    // 2. Initialize tracing
    init_tracing()?;
    info!("PreVetScan starting up");
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // 3. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: analysis model {}, chat model {}, BaaS at {}",
        config.llm.analysis_model, config.llm.chat_model, config.baas_url
    );
    if config.credentials.turnstile_site_key.is_none() {
        info!("No Turnstile site key configured; /api/config will report none");
    }

    // 4. Wire vendor clients
    let services = Services::from_config(&config);
    let state = AppState::new(services, config.credentials.turnstile_site_key.clone());
    let app = router(state, &config.server.allowed_origins);

    // 5. Serve
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("PreVetScan shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown requested");
}

/// Initialize tracing to stdout.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("prevetscan=info,tower_http=info,warn")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
