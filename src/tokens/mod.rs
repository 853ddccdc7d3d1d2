//! Connection token issuance.
//!
//! A connect token lets one tenant's end user run the platform's account
//! linking flow from a browser. Tokens are minted on demand, restricted to a
//! set of origins, handed back to the caller and forgotten. There is no
//! revoke: tokens are short-lived and single-purpose.

use crate::error::{GatewayError, Result};
use crate::identity::TenantId;
use crate::model::ConnectToken;
use crate::platform::ConnectPlatform;
use reqwest::Url;
use std::sync::Arc;
use tracing::{info, warn};

/// Connection Token Issuer.
pub struct TokenIssuer {
    platform: Arc<dyn ConnectPlatform>,
    default_origin: String,
}

impl TokenIssuer {
    pub fn new(platform: Arc<dyn ConnectPlatform>, default_origin: impl Into<String>) -> Self {
        Self {
            platform,
            default_origin: default_origin.into(),
        }
    }

    /// Mint a token for `tenant`.
    ///
    /// `None` falls back to the configured default origin. An explicit empty
    /// list is rejected rather than widened.
    pub async fn create_connect_token(
        &self,
        tenant: &TenantId,
        allowed_origins: Option<Vec<String>>,
    ) -> Result<ConnectToken> {
        let requested = match allowed_origins {
            None => vec![self.default_origin.clone()],
            Some(origins) if origins.is_empty() => {
                return Err(GatewayError::invalid("allowed_origins must not be empty"));
            }
            Some(origins) => origins,
        };
        let origins = normalize_origins(&requested)?;

        let issued = self.platform.create_connect_token(tenant, &origins).await?;
        if issued.token.trim().is_empty() {
            warn!(tenant = %tenant, "Platform returned an empty connect token");
            return Err(GatewayError::upstream("platform returned an empty connect token"));
        }

        info!(
            tenant = %tenant,
            origins = origins.len(),
            expires_at = %issued.expires_at,
            "Connect token issued"
        );

        Ok(ConnectToken {
            token: issued.token,
            expires_at: issued.expires_at,
            tenant: tenant.as_str().to_string(),
            allowed_origins: origins,
            connect_link_url: issued.connect_link_url,
        })
    }
}

/// Validate each origin and reduce it to its canonical form, dropping duplicates.
pub(crate) fn normalize_origins(origins: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(origins.len());
    for raw in origins {
        let origin = normalize_origin(raw)?;
        if !normalized.contains(&origin) {
            normalized.push(origin);
        }
    }
    Ok(normalized)
}

fn normalize_origin(raw: &str) -> Result<String> {
    let invalid = |reason: &str| GatewayError::invalid(format!("origin '{}' {}", raw, reason));

    let url = Url::parse(raw.trim()).map_err(|_| invalid("is not an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("must use http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("has no host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a path, query or fragment"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("must not carry credentials"));
    }

    Ok(url.origin().ascii_serialization())
}
