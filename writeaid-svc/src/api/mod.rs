//! HTTP API handlers for writeaid-svc

pub mod analysis;
pub mod health;

pub use analysis::analysis_routes;
pub use health::health_routes;
