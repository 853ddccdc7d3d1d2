// Error taxonomy and configuration
pub mod config;
pub mod error;

// Tenant identity and data model
pub mod identity;
pub mod model;

// Remote platform client
pub mod platform;

// Account lifecycle, token issuance, catalog and configuration
pub mod accounts;
pub mod catalog;
pub mod configurator;
pub mod tokens;

// Facade and HTTP layer
pub mod api;
pub mod gateway;

pub use error::{ErrorKind, GatewayError};
pub use gateway::{Envelope, Gateway};
pub use identity::TenantId;
