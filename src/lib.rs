pub mod adapters;
pub mod application;
pub mod domain;
pub mod services;

use std::{io, path::Path, sync::Arc};

use adapters::{
    controllers::{
        asset_controller::AssetController, delete_controller::DeleteController,
        health_controller::HealthController, upload_controller::UploadController,
    },
    middleware::{security_headers, validate_cdn_secret},
    state::AppState,
};
use application::services::{
    namespace::PublicNamespace, OnDemandTranscodeService, Transcoder, UploadService,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::{delete, get, post},
    Router,
};
use domain::config::server::ServerConfig;
use services::FetchError;
use thiserror::Error;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("cannot prepare {path}: {source}")]
    Filesystem { path: String, source: io::Error },

    #[error("cannot build remote client: {0}")]
    RemoteClient(#[from] FetchError),
}

/// Creates the public layout and an empty scratch directory, then wires every
/// service the handlers need.
pub async fn build_state(config: ServerConfig) -> Result<AppState, BootstrapError> {
    let namespace = PublicNamespace::new(&config.public_dir);
    namespace
        .ensure_layout()
        .await
        .map_err(|source| BootstrapError::Filesystem {
            path: config.public_dir.display().to_string(),
            source,
        })?;
    prepare_scratch_dir(&config.temp_dir)
        .await
        .map_err(|source| BootstrapError::Filesystem {
            path: config.temp_dir.display().to_string(),
            source,
        })?;

    let engine = services::create_image_engine();
    let storage = services::create_asset_storage(namespace.clone());
    let remote = services::create_remote_source()?;
    let ids = services::create_id_generator(config.flake_machine_id);

    let upload_service = UploadService::new(
        config.secret.clone(),
        Transcoder::new(engine.clone()),
        storage.clone(),
        ids,
        config.temp_dir.clone(),
    );
    let on_demand = OnDemandTranscodeService::new(engine, namespace, remote, config.max_remote_bytes);

    Ok(AppState {
        config: Arc::new(config),
        upload_service,
        on_demand,
        storage,
    })
}

pub fn build_router(app_state: AppState) -> Router {
    // Protected routes that require the X-CDN-SECRET header
    let protected_routes = Router::new()
        .route("/health", get(HealthController::health_check))
        .route_layer(middleware::from_fn_with_state(
            app_state.config.clone(),
            validate_cdn_secret,
        ));

    // Uploads stream to disk and enforce their own byte limits
    let upload_routes = Router::new()
        .route("/avatars", post(UploadController::upload_avatar))
        .route("/banners", post(UploadController::upload_banner))
        .route("/attachments", post(UploadController::upload_attachment))
        .route("/emojis", post(UploadController::upload_emoji))
        .layer(DefaultBodyLimit::disable());

    let public_routes = Router::new()
        .route("/", delete(DeleteController::delete_file))
        .route(
            "/channels/{channel_id}/attachments/batch",
            delete(DeleteController::delete_channel_batch),
        )
        .route("/proxy/{url}/{filename}", get(AssetController::proxy))
        .route("/proxy-dimensions", get(AssetController::proxy_dimensions))
        .route("/{*path}", get(AssetController::get_asset));

    let worker_id = HeaderValue::from_str(&app_state.config.worker_id)
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));

    Router::new()
        .merge(protected_routes)
        .merge(upload_routes)
        .merge(public_routes)
        .layer(middleware::from_fn(security_headers))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("pid"),
            HeaderValue::from(std::process::id()),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-worker-id"),
            worker_id,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Leftovers from a previous run are never picked up again, so they go.
async fn prepare_scratch_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut purged = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => purged += 1,
            Err(e) => warn!("Failed to purge scratch entry {}: {}", path.display(), e),
        }
    }

    if purged > 0 {
        info!("Purged {} leftover scratch entries", purged);
    }
    Ok(())
}
