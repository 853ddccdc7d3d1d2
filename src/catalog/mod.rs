//! Component and app catalog.
//!
//! Listings are cursor-paginated by the platform. Callers either page
//! explicitly with [`ComponentCatalog::list_components`] /
//! [`ComponentCatalog::list_apps`], or take a lazy stream that walks every page
//! on demand. Nothing is cached.

use crate::error::{GatewayError, Result};
use crate::model::{Component, ComponentFilter, ComponentSummary, ComponentType, ExternalApp, Page};
use crate::platform::{paginate, ConnectPlatform};
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::debug;

/// Component Catalog.
pub struct ComponentCatalog {
    platform: Arc<dyn ConnectPlatform>,
}

impl ComponentCatalog {
    pub fn new(platform: Arc<dyn ConnectPlatform>) -> Self {
        Self { platform }
    }

    /// Fetch one page of components. `cursor = None` is the first page.
    pub async fn list_components(
        &self,
        component_type: ComponentType,
        filter: &ComponentFilter,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ComponentSummary>> {
        let limit = check_limit(limit)?;
        let page = self
            .platform
            .list_components(component_type, filter, non_blank(cursor), limit)
            .await?;

        debug!(
            component_type = ?component_type,
            app = ?filter.app,
            count = page.data.len(),
            more = page.next_cursor.is_some(),
            "Listed components"
        );
        Ok(page)
    }

    /// Every matching component, fetched page by page as the stream is polled.
    pub fn components(
        &self,
        component_type: ComponentType,
        filter: ComponentFilter,
    ) -> BoxStream<'static, Result<ComponentSummary>> {
        let platform = Arc::clone(&self.platform);
        paginate(move |cursor| {
            let platform = Arc::clone(&platform);
            let filter = filter.clone();
            async move {
                platform
                    .list_components(component_type, &filter, cursor.as_deref(), None)
                    .await
            }
        })
    }

    pub async fn get_component(&self, component_type: ComponentType, key: &str) -> Result<Component> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GatewayError::invalid("component key is required"));
        }
        self.platform.get_component(component_type, key).await
    }

    /// Fetch one page of apps, optionally filtered by free text.
    pub async fn list_apps(
        &self,
        q: Option<&str>,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ExternalApp>> {
        let limit = check_limit(limit)?;
        self.platform
            .list_apps(non_blank(q), non_blank(cursor), limit)
            .await
    }

    /// Every matching app, fetched lazily.
    pub fn apps(&self, q: Option<String>) -> BoxStream<'static, Result<ExternalApp>> {
        let platform = Arc::clone(&self.platform);
        paginate(move |cursor| {
            let platform = Arc::clone(&platform);
            let q = q.clone();
            async move {
                platform
                    .list_apps(non_blank(q.as_deref()), cursor.as_deref(), None)
                    .await
            }
        })
    }

    pub async fn get_app(&self, app_id: &str) -> Result<ExternalApp> {
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(GatewayError::invalid("app id is required"));
        }
        self.platform.get_app(app_id).await
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn check_limit(limit: Option<u32>) -> Result<Option<u32>> {
    match limit {
        Some(0) => Err(GatewayError::invalid("limit must be greater than zero")),
        other => Ok(other),
    }
}
