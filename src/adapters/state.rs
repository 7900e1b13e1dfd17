use axum::extract::FromRef;
use std::sync::Arc;

use crate::{
    application::services::{AssetStorage, OnDemandTranscodeService, UploadService},
    domain::config::server::ServerConfig,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub upload_service: UploadService,
    pub on_demand: OnDemandTranscodeService,
    pub storage: Arc<dyn AssetStorage>,
}
