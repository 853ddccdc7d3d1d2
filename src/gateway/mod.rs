//! Gateway facade.
//!
//! The single entry point for host collaborators. Every operation takes the
//! caller's [`TenantId`] explicitly and delegates to one of the managers.
//! Results are plain `Result<T, GatewayError>`; [`Envelope`] is the uniform
//! shape they are rendered into at the boundary.

use crate::accounts::{AccountManager, CascadeOutcome};
use crate::catalog::ComponentCatalog;
use crate::config::GatewayConfig;
use crate::configurator::{ConfigureRequest, ConfigureResult, Configurator};
use crate::error::{ErrorBody, GatewayError, Result};
use crate::identity::TenantId;
use crate::model::{
    AccountFilter, Component, ComponentFilter, ComponentSummary, ComponentType, ConnectToken,
    ExternalAccount, ExternalApp, Page,
};
use crate::platform::ConnectPlatform;
use crate::tokens::TokenIssuer;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Uniform result shape returned to every collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &GatewayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from(error)),
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}

impl Envelope<CascadeOutcome> {
    /// A cascade with failed deletes is unsuccessful but still carries the
    /// full outcome so the caller can see which accounts were removed.
    pub fn from_cascade(result: Result<CascadeOutcome>) -> Self {
        match result {
            Ok(outcome) => match outcome.failure() {
                Some(failure) => Self {
                    success: false,
                    error: Some(ErrorBody::from(&failure)),
                    data: Some(outcome),
                },
                None => Self::ok(outcome),
            },
            Err(e) => Self::err(&e),
        }
    }
}

/// Connector Gateway.
pub struct Gateway {
    platform: Arc<dyn ConnectPlatform>,
    accounts: AccountManager,
    tokens: TokenIssuer,
    catalog: ComponentCatalog,
    configurator: Configurator,
    operators: HashSet<String>,
}

impl Gateway {
    pub fn new(platform: Arc<dyn ConnectPlatform>, config: &GatewayConfig) -> Self {
        Self {
            accounts: AccountManager::new(
                Arc::clone(&platform),
                config.request_timeout(),
                config.cascade.max_concurrency,
            ),
            tokens: TokenIssuer::new(
                Arc::clone(&platform),
                config.connect.default_allowed_origin.clone(),
            ),
            catalog: ComponentCatalog::new(Arc::clone(&platform)),
            configurator: Configurator::new(Arc::clone(&platform)),
            operators: config
                .server
                .operator_ids
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            platform,
        }
    }

    /// List the caller's accounts.
    ///
    /// The filter is always pinned to the caller; naming another tenant's
    /// `external_user_id` is rejected.
    pub async fn list_accounts(
        &self,
        tenant: &TenantId,
        mut filter: AccountFilter,
    ) -> Result<Vec<ExternalAccount>> {
        if let Some(requested) = filter.external_user_id.as_deref() {
            if requested.trim() != tenant.as_str() {
                warn!(tenant = %tenant, "Account listing requested for another tenant");
                return Err(GatewayError::invalid(
                    "external_user_id does not match the calling tenant",
                ));
            }
        }
        filter.external_user_id = Some(tenant.as_str().to_string());
        self.accounts.list_accounts(&filter).await
    }

    pub async fn get_account(
        &self,
        tenant: &TenantId,
        account_id: &str,
        include_credentials: bool,
    ) -> Result<ExternalAccount> {
        self.accounts
            .get_account(tenant, account_id, include_credentials)
            .await
    }

    pub async fn delete_account(&self, tenant: &TenantId, account_id: &str) -> Result<()> {
        self.accounts.delete_account(tenant, account_id).await
    }

    /// Delete every account of `app_id` across all tenants.
    ///
    /// Only callers listed in `server.operator_ids` may cascade; anyone else
    /// is rejected before the platform is contacted. Partial failure is
    /// reported inside the outcome, not as `Err`.
    pub async fn delete_accounts_for_app(
        &self,
        tenant: &TenantId,
        app_id: &str,
    ) -> Result<CascadeOutcome> {
        if !self.operators.contains(tenant.as_str()) {
            warn!(tenant = %tenant, app_id = %app_id, "Cascade delete refused for non-operator");
            return Err(GatewayError::invalid(
                "cascade delete requires an operator identity",
            ));
        }
        info!(tenant = %tenant, app_id = %app_id, "Cascade delete requested");
        self.accounts.delete_all_for_app(app_id).await
    }

    pub async fn create_connect_token(
        &self,
        tenant: &TenantId,
        allowed_origins: Option<Vec<String>>,
    ) -> Result<ConnectToken> {
        self.tokens
            .create_connect_token(tenant, allowed_origins)
            .await
    }

    pub async fn list_components(
        &self,
        tenant: &TenantId,
        component_type: ComponentType,
        filter: &ComponentFilter,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ComponentSummary>> {
        debug!(tenant = %tenant, component_type = ?component_type, "Listing components");
        self.catalog
            .list_components(component_type, filter, cursor, limit)
            .await
    }

    pub async fn get_component(
        &self,
        tenant: &TenantId,
        component_type: ComponentType,
        key: &str,
    ) -> Result<Component> {
        debug!(tenant = %tenant, key = %key, "Fetching component");
        self.catalog.get_component(component_type, key).await
    }

    /// Resolve one prop of a component for the caller.
    ///
    /// The request's `external_user_id` must be the caller.
    pub async fn configure_component(
        &self,
        tenant: &TenantId,
        request: &ConfigureRequest,
    ) -> Result<ConfigureResult> {
        let valid = request.validate()?;
        if &valid.tenant != tenant {
            warn!(tenant = %tenant, "Configuration requested for another tenant");
            return Err(GatewayError::invalid(
                "external_user_id does not match the calling tenant",
            ));
        }
        self.configurator.resolve(&valid).await
    }

    pub async fn list_apps(
        &self,
        tenant: &TenantId,
        q: Option<&str>,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ExternalApp>> {
        debug!(tenant = %tenant, q = ?q, "Listing apps");
        self.catalog.list_apps(q, cursor, limit).await
    }

    pub async fn get_app(&self, tenant: &TenantId, app_id: &str) -> Result<ExternalApp> {
        debug!(tenant = %tenant, app_id = %app_id, "Fetching app");
        self.catalog.get_app(app_id).await
    }

    /// Remove the caller's platform user together with all of its accounts.
    pub async fn delete_external_user(&self, tenant: &TenantId, user_id: &str) -> Result<()> {
        let target = TenantId::new(user_id)?;
        if &target != tenant {
            warn!(tenant = %tenant, "Deletion requested for another external user");
            return Err(GatewayError::invalid(
                "user_id does not match the calling tenant",
            ));
        }
        self.platform.delete_external_user(&target).await?;
        info!(tenant = %tenant, "External user deleted");
        Ok(())
    }
}
