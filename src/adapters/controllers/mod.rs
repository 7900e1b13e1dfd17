pub mod asset_controller;
pub mod delete_controller;
pub mod health_controller;
pub mod upload_controller;
