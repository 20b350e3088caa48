//! HTTP surface: engine ingress, health and status

pub mod middleware;
pub mod routes;

pub use routes::build_router;
