pub mod auth;
pub mod handlers;
pub mod limits;
pub mod routes;

pub use routes::{create_app, AppState, GatewaySettings};
