pub mod asset;
pub mod geometry;
pub mod image;
pub mod upload;
