pub mod limits;
pub mod server;
