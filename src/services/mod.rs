pub mod error;
pub mod flake;
pub mod http_remote_source;
pub mod local_storage;
mod quantize;
pub mod raster_engine;

pub use error::{EngineError, FetchError};
pub use flake::FlakeIdGenerator;
pub use http_remote_source::HttpRemoteSource;
pub use local_storage::LocalAssetStorage;
pub use raster_engine::RasterEngine;

use std::sync::Arc;

use crate::application::services::{
    namespace::PublicNamespace, AssetStorage, IdGenerator, ImageEngine, RemoteSource,
};

pub fn create_image_engine() -> Arc<dyn ImageEngine> {
    Arc::new(RasterEngine::new())
}

pub fn create_asset_storage(namespace: PublicNamespace) -> Arc<dyn AssetStorage> {
    Arc::new(LocalAssetStorage::new(namespace))
}

pub fn create_remote_source() -> Result<Arc<dyn RemoteSource>, FetchError> {
    Ok(Arc::new(HttpRemoteSource::new()?))
}

pub fn create_id_generator(machine_id: u16) -> Arc<dyn IdGenerator> {
    Arc::new(FlakeIdGenerator::new(machine_id))
}
