//! HTTP API handlers for mmx-tw

pub mod download;
pub mod health;
pub mod runs;
pub mod train;

pub use download::download_routes;
pub use health::health_routes;
pub use runs::run_routes;
pub use train::train_routes;
