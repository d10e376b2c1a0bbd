use api::{
    build_app, init_auth_service, init_inference, init_provider_clients, middleware::AuthState,
    routes::AppState,
};
use config::{GatewayConfig, LoggingConfig};

#[tokio::main]
async fn main() {
    // Load configuration first to get logging settings
    let config = GatewayConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Application cannot start without a valid configuration.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let auth_service = init_auth_service(&config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialize authentication");
        std::process::exit(1);
    });

    let clients = init_provider_clients(&config.providers).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to create provider clients");
        std::process::exit(1);
    });

    let router = init_inference(&config, clients).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialize inference routing");
        std::process::exit(1);
    });

    let app = build_app(
        AppState::new(router.clone()),
        AuthState::new(auth_service),
    );

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind listener");
            std::process::exit(1);
        });

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!("API Endpoints:");
    tracing::info!("  - POST /v1/chat/completions (Chat Completions)");
    tracing::info!("  - GET /v1/models (Available Models)");
    tracing::info!("  - GET /v1/models/providers (Provider Status)");
    tracing::info!("  - GET /v1/health (Health Check)");

    // Open streams end once the router shuts down
    let shutdown_router = router.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_router.shutdown().await;
        })
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Build the filter string from the logging configuration
    let mut filter = logging_config.level.clone();

    for (module, level) in &logging_config.modules {
        filter.push_str(&format!(",{}={}", module, level));
    }

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
