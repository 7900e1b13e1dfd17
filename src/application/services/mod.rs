pub mod asset_storage;
pub mod geometry_resolver;
pub mod id_generator;
pub mod image_engine;
pub mod namespace;
pub mod on_demand;
pub mod remote_source;
pub mod secret;
pub mod transcoder;
pub mod upload_service;

pub use asset_storage::{AssetStorage, Placement};
pub use id_generator::IdGenerator;
pub use image_engine::ImageEngine;
pub use on_demand::OnDemandTranscodeService;
pub use remote_source::RemoteSource;
pub use transcoder::Transcoder;
pub use upload_service::{UploadProfile, UploadService};
