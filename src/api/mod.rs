// Host HTTP layer over the gateway facade

pub mod routes;

pub use routes::{create_gateway_router, status_for, ApiError, GatewayAppState};
