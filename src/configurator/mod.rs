//! Dependent-field resolution for remote components.
//!
//! A component's props form a dependency graph: the options of `sheet` can
//! only be computed once `spreadsheet` has a value. Each call resolves one
//! prop against a snapshot of the caller's configuration:
//!
//! ```text
//! validate request ─→ fetch component ─→ check graph ─→ check dependencies
//!                                                            │
//!                               ConfigureResult ←─ resolve (local or remote)
//! ```
//!
//! The configuration is only ever borrowed, so resolving one prop cannot
//! change or retract another. Remote failures are surfaced as-is and never
//! retried here.

mod graph;

pub use graph::PropGraph;

use crate::catalog::ComponentCatalog;
use crate::error::{GatewayError, Result};
use crate::identity::TenantId;
use crate::model::{ComponentType, ConfiguredProps, PropKind, PropOption};
use crate::platform::{ConnectPlatform, PropConfiguration};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One configuration call as received from the caller.
///
/// Every field is optional on the wire so that a missing field is reported as
/// `InvalidArgument` by [`ConfigureRequest::validate`] instead of a decode error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigureRequest {
    /// Component key
    #[serde(default, alias = "id")]
    pub component: Option<String>,
    #[serde(default)]
    pub component_type: ComponentType,
    #[serde(default)]
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub prop_name: Option<String>,
    #[serde(default)]
    pub configured_props: Option<ConfiguredProps>,
}

/// A request whose required fields are all present.
#[derive(Debug)]
pub struct ValidRequest<'a> {
    pub component_key: &'a str,
    pub component_type: ComponentType,
    pub tenant: TenantId,
    pub prop_name: &'a str,
    pub configured_props: &'a ConfiguredProps,
}

impl ConfigureRequest {
    pub fn validate(&self) -> Result<ValidRequest<'_>> {
        let component_key = required(&self.component, "component")?;
        let tenant = TenantId::new(self.external_user_id.clone().unwrap_or_default())?;
        let prop_name = required(&self.prop_name, "prop_name")?;
        let configured_props = self
            .configured_props
            .as_ref()
            .ok_or_else(|| GatewayError::invalid("configured_props is required"))?;

        Ok(ValidRequest {
            component_key,
            component_type: self.component_type,
            tenant,
            prop_name,
            configured_props,
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GatewayError::invalid(format!("{} is required", field))),
    }
}

/// Options resolved for one prop.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConfigureResult {
    pub prop_name: String,
    pub options: Vec<PropOption>,
}

/// Component Configurator.
pub struct Configurator {
    platform: Arc<dyn ConnectPlatform>,
    catalog: ComponentCatalog,
}

impl Configurator {
    pub fn new(platform: Arc<dyn ConnectPlatform>) -> Self {
        Self {
            catalog: ComponentCatalog::new(Arc::clone(&platform)),
            platform,
        }
    }

    /// Resolve the options of `request.prop_name`.
    pub async fn configure(&self, request: &ConfigureRequest) -> Result<ConfigureResult> {
        self.resolve(&request.validate()?).await
    }

    /// Resolve one prop of an already validated request.
    pub async fn resolve(&self, request: &ValidRequest<'_>) -> Result<ConfigureResult> {
        let component = self
            .catalog
            .get_component(request.component_type, request.component_key)
            .await?;

        let prop = component.prop(request.prop_name).ok_or_else(|| {
            GatewayError::invalid(format!(
                "component {} has no prop '{}'",
                component.key, request.prop_name
            ))
        })?;

        let graph = PropGraph::build(&component.props).map_err(|e| {
            warn!(component = %component.key, error = %e, "Malformed prop schema");
            e
        })?;

        let missing = graph.unmet_dependencies(&prop.name, request.configured_props);
        if !missing.is_empty() {
            debug!(
                tenant = %request.tenant,
                component = %component.key,
                prop = %prop.name,
                missing = ?missing,
                "Prop dependencies not yet configured"
            );
            return Err(GatewayError::MissingDependency {
                prop: prop.name.clone(),
                missing,
            });
        }

        if let PropKind::Unrecognized { raw } = &prop.kind {
            return Err(GatewayError::upstream(format!(
                "prop '{}' has unsupported type '{}'",
                prop.name, raw
            )));
        }

        if let (Some(options), false) = (&prop.options, prop.remote_options) {
            debug!(component = %component.key, prop = %prop.name, "Resolved static options");
            return Ok(ConfigureResult {
                prop_name: prop.name.clone(),
                options: options.clone(),
            });
        }

        let resolved = self
            .platform
            .configure_prop(PropConfiguration {
                tenant: &request.tenant,
                component_key: &component.key,
                prop_name: &prop.name,
                configured_props: request.configured_props,
            })
            .await?;

        if !resolved.errors.is_empty() {
            warn!(
                tenant = %request.tenant,
                component = %component.key,
                prop = %prop.name,
                errors = resolved.errors.len(),
                "Platform reported errors resolving prop"
            );
            return Err(GatewayError::upstream(resolved.errors.join("; ")));
        }

        info!(
            tenant = %request.tenant,
            component = %component.key,
            prop = %prop.name,
            options = resolved.options.len(),
            "Prop resolved"
        );

        Ok(ConfigureResult {
            prop_name: prop.name.clone(),
            options: resolved.options,
        })
    }
}
