pub mod asset_dto;
pub mod upload_dto;
