//! Remote automation platform seam.
//!
//! The platform is the system of record for accounts, tokens and components.
//! Every manager in the gateway talks to it through [`ConnectPlatform`], which
//! keeps the managers testable without a network and lets the host swap the
//! HTTP client for something else.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Managers (accounts, tokens, catalog,   │
//! │            configurator)                 │
//! └─────────────────────────────────────────┘
//!          ↓  ConnectPlatform (trait)
//! ┌─────────────────────────────────────────┐
//! │       ConnectClient (reqwest)            │
//! │  - bearer auth via PlatformAuth          │
//! │  - status → GatewayError mapping         │
//! └─────────────────────────────────────────┘
//!          ↓
//!     Remote platform REST API
//! ```

mod auth;
mod client;
mod pagination;

#[cfg(test)]
pub(crate) mod fake;

pub use auth::PlatformAuth;
pub use client::ConnectClient;
pub use pagination::paginate;

use crate::error::Result;
use crate::identity::TenantId;
use crate::model::{
    AccountFilter, Component, ComponentFilter, ComponentSummary, ComponentType, ConfiguredProps,
    ExternalAccount, ExternalApp, Page, PropOption,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Token as issued by the platform, before the gateway attaches tenant and origins.
#[derive(Clone, Debug, PartialEq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub connect_link_url: Option<String>,
}

/// Inputs of one remote prop-resolution call.
#[derive(Clone, Copy, Debug)]
pub struct PropConfiguration<'a> {
    pub tenant: &'a TenantId,
    pub component_key: &'a str,
    pub prop_name: &'a str,
    pub configured_props: &'a ConfiguredProps,
}

/// What the platform computed for one prop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemoteOptions {
    pub options: Vec<PropOption>,
    /// Errors the platform reported while computing options
    pub errors: Vec<String>,
}

/// Operations the gateway needs from the remote platform.
///
/// Implementations map "does not exist" to `GatewayError::NotFound` and every
/// other failure to `GatewayError::Upstream`, preserving the remote message.
/// Implementations never retry.
#[async_trait]
pub trait ConnectPlatform: Send + Sync {
    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        cursor: Option<&str>,
    ) -> Result<Page<ExternalAccount>>;

    async fn get_account(
        &self,
        account_id: &str,
        include_credentials: bool,
    ) -> Result<ExternalAccount>;

    async fn delete_account(&self, account_id: &str) -> Result<()>;

    async fn delete_external_user(&self, tenant: &TenantId) -> Result<()>;

    async fn create_connect_token(
        &self,
        tenant: &TenantId,
        allowed_origins: &[String],
    ) -> Result<IssuedToken>;

    async fn list_components(
        &self,
        component_type: ComponentType,
        filter: &ComponentFilter,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ComponentSummary>>;

    async fn get_component(&self, component_type: ComponentType, key: &str) -> Result<Component>;

    async fn configure_prop(&self, request: PropConfiguration<'_>) -> Result<RemoteOptions>;

    async fn list_apps(
        &self,
        q: Option<&str>,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ExternalApp>>;

    async fn get_app(&self, app_id: &str) -> Result<ExternalApp>;
}
