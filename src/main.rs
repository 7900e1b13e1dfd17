use cdn_service::{build_router, build_state, domain::config::server::ServerConfig};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing, `info` unless RUST_LOG says otherwise
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().expect("ERROR: invalid server configuration");
    let port = config.port;

    tracing::info!(
        "Starting cdn-service worker {} (public: {}, temp: {})",
        config.worker_id,
        config.public_dir.display(),
        config.temp_dir.display()
    );

    // Configure CORS
    let cors = match config.cors_allowed_origins.clone() {
        Some(allowed_origins) => {
            let origins: Vec<_> = allowed_origins
                .iter()
                .map(|s| s.parse().expect("Invalid CORS origin"))
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        // Allow all origins if not specified
        None => CorsLayer::permissive(),
    };

    let app_state = build_state(config)
        .await
        .expect("ERROR: failed to initialise services");

    let router = build_router(app_state).layer(cors);

    // Start the server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind to port");

    tracing::info!("Server listening on 0.0.0.0:{}", port);

    axum::serve(listener, router)
        .await
        .expect("Failed to start server");
}
