//! Tenant identity resolution.
//!
//! The host application authenticates its users; by the time a request reaches
//! the gateway it carries the caller's opaque `external_user_id`. This module
//! turns that into a validated [`TenantId`] which every core operation takes
//! explicitly. There is no ambient "current tenant".

use crate::error::{GatewayError, Result};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};


/// Opaque identifier of one end user of the host application.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap an external user id. Blank ids are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::invalid("external_user_id is required"));
        }
        Ok(TenantId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self> {
        TenantId::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Resolves the calling tenant from the host's request context.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Result<TenantId>;
}

/// Reads the tenant from a single request header set by the host's auth layer.
#[derive(Clone, Debug)]
pub struct HeaderIdentity {
    header: String,
}

impl HeaderIdentity {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for HeaderIdentity {
    fn default() -> Self {
        Self::new("x-external-user-id")
    }
}

impl IdentityResolver for HeaderIdentity {
    fn resolve(&self, headers: &HeaderMap) -> Result<TenantId> {
        let value = headers
            .get(self.header.as_str())
            .ok_or_else(|| GatewayError::invalid(format!("missing {} header", self.header)))?
            .to_str()
            .map_err(|_| GatewayError::invalid(format!("{} header is not valid text", self.header)))?;

        TenantId::new(value)
    }
}
