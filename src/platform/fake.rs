//! In-memory platform used by unit tests.

use super::{ConnectPlatform, IssuedToken, PropConfiguration, RemoteOptions};
use crate::error::{GatewayError, Result};
use crate::identity::TenantId;
use crate::model::{
    AccountFilter, Component, ComponentFilter, ComponentSummary, ComponentType, ConfiguredProps,
    ExternalAccount, ExternalApp, Page,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Resolver = Box<dyn Fn(&ConfiguredProps) -> RemoteOptions + Send + Sync>;

pub(crate) struct FakePlatform {
    accounts: Mutex<Vec<ExternalAccount>>,
    components: Mutex<Vec<Component>>,
    apps: Mutex<Vec<ExternalApp>>,
    delete_failures: Mutex<HashMap<String, GatewayError>>,
    delete_delays: Mutex<HashMap<String, Duration>>,
    list_failure: Mutex<Option<GatewayError>>,
    resolvers: Mutex<HashMap<String, Resolver>>,
    configure_calls: Mutex<Vec<(String, ConfiguredProps)>>,
    token_requests: Mutex<Vec<(String, Vec<String>)>>,
    deleted_users: Mutex<Vec<String>>,
    page_size: usize,
    remote_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub(crate) fn account(id: &str, tenant: &str, app: &str, healthy: bool, dead: bool) -> ExternalAccount {
    ExternalAccount {
        account_id: id.to_string(),
        tenant: tenant.to_string(),
        app: ExternalApp {
            app_id: format!("app_{}", app),
            slug: app.to_string(),
            display_name: app.to_string(),
        },
        healthy,
        dead,
        credentials: Some(serde_json::json!({"oauth_access_token": format!("secret-{}", id)})),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self {
            accounts: Mutex::new(Vec::new()),
            components: Mutex::new(Vec::new()),
            apps: Mutex::new(Vec::new()),
            delete_failures: Mutex::new(HashMap::new()),
            delete_delays: Mutex::new(HashMap::new()),
            list_failure: Mutex::new(None),
            resolvers: Mutex::new(HashMap::new()),
            configure_calls: Mutex::new(Vec::new()),
            token_requests: Mutex::new(Vec::new()),
            deleted_users: Mutex::new(Vec::new()),
            page_size: 2,
            remote_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_account(self, account: ExternalAccount) -> Self {
        self.accounts.lock().unwrap().push(account);
        self
    }

    pub(crate) fn with_component(self, component: Component) -> Self {
        self.components.lock().unwrap().push(component);
        self
    }

    pub(crate) fn with_app(self, app: ExternalApp) -> Self {
        self.apps.lock().unwrap().push(app);
        self
    }

    pub(crate) fn fail_delete(self, account_id: &str, error: GatewayError) -> Self {
        self.delete_failures
            .lock()
            .unwrap()
            .insert(account_id.to_string(), error);
        self
    }

    pub(crate) fn delay_delete(self, account_id: &str, delay: Duration) -> Self {
        self.delete_delays
            .lock()
            .unwrap()
            .insert(account_id.to_string(), delay);
        self
    }

    pub(crate) fn fail_listing(self, error: GatewayError) -> Self {
        *self.list_failure.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn on_configure(
        self,
        prop: &str,
        resolver: impl Fn(&ConfiguredProps) -> RemoteOptions + Send + Sync + 'static,
    ) -> Self {
        self.resolvers
            .lock()
            .unwrap()
            .insert(prop.to_string(), Box::new(resolver));
        self
    }

    pub(crate) fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn account_ids(&self) -> Vec<String> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.account_id.clone())
            .collect()
    }

    pub(crate) fn configure_calls(&self) -> Vec<(String, ConfiguredProps)> {
        self.configure_calls.lock().unwrap().clone()
    }

    pub(crate) fn token_requests(&self) -> Vec<(String, Vec<String>)> {
        self.token_requests.lock().unwrap().clone()
    }

    pub(crate) fn deleted_users(&self) -> Vec<String> {
        self.deleted_users.lock().unwrap().clone()
    }

    fn record_call(&self) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn page_of<T: Clone>(&self, items: Vec<T>, cursor: Option<&str>) -> Page<T> {
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        let data = items.get(start..end).map(|s| s.to_vec()).unwrap_or_default();
        let next_cursor = if end < items.len() {
            Some(end.to_string())
        } else {
            None
        };
        Page { data, next_cursor }
    }
}

#[async_trait]
impl ConnectPlatform for FakePlatform {
    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        cursor: Option<&str>,
    ) -> Result<Page<ExternalAccount>> {
        self.record_call();
        if let Some(err) = self.list_failure.lock().unwrap().clone() {
            return Err(err);
        }
        let matching: Vec<ExternalAccount> = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                filter
                    .app
                    .as_ref()
                    .map_or(true, |app| &a.app.slug == app || &a.app.app_id == app)
            })
            .filter(|a| {
                filter
                    .external_user_id
                    .as_ref()
                    .map_or(true, |t| &a.tenant == t)
            })
            .cloned()
            .collect();
        Ok(self.page_of(matching, cursor))
    }

    async fn get_account(
        &self,
        account_id: &str,
        _include_credentials: bool,
    ) -> Result<ExternalAccount> {
        self.record_call();
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.account_id == account_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("record not found"))
    }

    async fn delete_account(&self, account_id: &str) -> Result<()> {
        self.record_call();
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.delete_delays.lock().unwrap().get(account_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let failure = self.delete_failures.lock().unwrap().get(account_id).cloned();
        let result = match failure {
            Some(err) => Err(err),
            None => {
                let mut accounts = self.accounts.lock().unwrap();
                let before = accounts.len();
                accounts.retain(|a| a.account_id != account_id);
                if accounts.len() == before {
                    Err(GatewayError::not_found("record not found"))
                } else {
                    Ok(())
                }
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete_external_user(&self, tenant: &TenantId) -> Result<()> {
        self.record_call();
        self.deleted_users
            .lock()
            .unwrap()
            .push(tenant.as_str().to_string());
        self.accounts
            .lock()
            .unwrap()
            .retain(|a| a.tenant != tenant.as_str());
        Ok(())
    }

    async fn create_connect_token(
        &self,
        tenant: &TenantId,
        allowed_origins: &[String],
    ) -> Result<IssuedToken> {
        self.record_call();
        self.token_requests
            .lock()
            .unwrap()
            .push((tenant.as_str().to_string(), allowed_origins.to_vec()));
        Ok(IssuedToken {
            token: format!("ctok_{}", tenant),
            expires_at: Utc::now() + ChronoDuration::hours(4),
            connect_link_url: None,
        })
    }

    async fn list_components(
        &self,
        component_type: ComponentType,
        filter: &ComponentFilter,
        cursor: Option<&str>,
        _limit: Option<u32>,
    ) -> Result<Page<ComponentSummary>> {
        self.record_call();
        let summaries: Vec<ComponentSummary> = self
            .components
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.component_type == component_type)
            .filter(|c| filter.app.as_ref().map_or(true, |app| c.app.as_ref() == Some(app)))
            .filter(|c| {
                filter
                    .q
                    .as_ref()
                    .map_or(true, |q| c.name.to_lowercase().contains(&q.to_lowercase()))
            })
            .map(|c| ComponentSummary {
                key: c.key.clone(),
                name: c.name.clone(),
                version: c.version.clone(),
                description: c.description.clone(),
            })
            .collect();
        Ok(self.page_of(summaries, cursor))
    }

    async fn get_component(&self, component_type: ComponentType, key: &str) -> Result<Component> {
        self.record_call();
        self.components
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.component_type == component_type && c.key == key)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("component {} not found", key)))
    }

    async fn configure_prop(&self, request: PropConfiguration<'_>) -> Result<RemoteOptions> {
        self.record_call();
        self.configure_calls.lock().unwrap().push((
            request.prop_name.to_string(),
            request.configured_props.clone(),
        ));
        let resolvers = self.resolvers.lock().unwrap();
        let resolver = resolvers
            .get(request.prop_name)
            .ok_or_else(|| GatewayError::upstream(format!("no options for {}", request.prop_name)))?;
        Ok(resolver(request.configured_props))
    }

    async fn list_apps(
        &self,
        q: Option<&str>,
        cursor: Option<&str>,
        _limit: Option<u32>,
    ) -> Result<Page<ExternalApp>> {
        self.record_call();
        let apps: Vec<ExternalApp> = self
            .apps
            .lock()
            .unwrap()
            .iter()
            .filter(|a| q.map_or(true, |q| a.slug.contains(q)))
            .cloned()
            .collect();
        Ok(self.page_of(apps, cursor))
    }

    async fn get_app(&self, app_id: &str) -> Result<ExternalApp> {
        self.record_call();
        self.apps
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.app_id == app_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("app {} not found", app_id)))
    }
}
