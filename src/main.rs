//! Kawari3D - Avatar hot-swap viewer service
//!
//! Main entry point for the CLI application.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kawari3d::{
    config::Config,
    error::WebError,
    loader::GltfLoader,
    output::browser::BrowserServer,
    render::RenderLoop,
    session::ViewerSession,
    web::routes::create_router,
    AppState,
};

/// Kawari3D - Avatar hot-swap viewer service
#[derive(Parser, Debug)]
#[command(name = "kawari3d", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default avatar model (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable HTTP server
    #[arg(long)]
    no_http: bool,

    /// HTTP server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", kawari3d::NAME, kawari3d::VERSION);

    let state = setup_and_spawn_services(&args).await?;

    // Wait for Ctrl+C / SIGTERM
    shutdown_signal().await;
    info!("Shutdown signal received");
    state.shutdown();

    // Give tasks a moment to clean up
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    info!("Kawari3D stopped");
    Ok(())
}

/// Setup config, load the default avatar, and spawn the render loop and HTTP server.
async fn setup_and_spawn_services(args: &Args) -> anyhow::Result<Arc<AppState>> {
    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.viewer.default_model = model.clone();
    }
    if args.no_http {
        config.http.enabled = false;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    config.validate()?;

    info!("Default model: {}", config.viewer.default_model);
    info!("Animation clip: {}", config.viewer.animation_clip);
    info!("Swap policy: {:?}", config.swap.policy);
    info!("HTTP server: {}", config.http.enabled);

    let loader = Arc::new(GltfLoader::new(&config.loader));
    let session = ViewerSession::new(config.clone(), loader);

    session
        .start()
        .await
        .with_context(|| format!("Failed to load default avatar {}", config.viewer.default_model))?;

    let state = AppState::new(session);

    // Start render loop
    let render = RenderLoop::new(Arc::clone(&state.session));
    tokio::spawn(render.run());

    // Start HTTP server if enabled
    if config.http.enabled {
        let http_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_http_server(http_state).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    Ok(state)
}

async fn run_http_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let http_config = state.session.config().http.clone();

    let browser_server = BrowserServer::new(Arc::clone(&state));

    let addr = format!("{}:{}", http_config.host, http_config.port);
    info!("HTTP server listening on {}", addr);
    info!("Viewer page at http://{}/viewer", addr);

    let app = create_router(Arc::clone(&state), &http_config).merge(browser_server.router());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WebError::Bind(format!("{}: {}", addr, e)))?;

    let mut shutdown_rx = state.subscribe_shutdown();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| WebError::Serve(e.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
