use super::{ConnectPlatform, IssuedToken, PlatformAuth, PropConfiguration, RemoteOptions};
use crate::config::{PlatformConfig, PlatformEnvironment};
use crate::error::{GatewayError, Result};
use crate::identity::TenantId;
use crate::model::{
    AccountFilter, Component, ComponentFilter, ComponentSummary, ComponentType, ConfiguredProps,
    ExternalAccount, ExternalApp, Page, PropDefinition, PropKind, PropOption,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use urlencoding::encode;

/// Page size requested when walking account listings.
const ACCOUNT_PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// `{ "data": ... }` or the bare object
#[derive(Deserialize)]
#[serde(untagged)]
enum Single<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Single<T> {
    fn into_inner(self) -> T {
        match self {
            Single::Wrapped { data } => data,
            Single::Bare(inner) => inner,
        }
    }
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    page_info: Option<PageInfo>,
}

#[derive(Deserialize, Default)]
struct PageInfo {
    #[serde(default)]
    end_cursor: Option<String>,
}

impl<T> ListResponse<T> {
    fn into_page<U>(self, convert: impl FnMut(T) -> U) -> Page<U> {
        let next_cursor = if self.data.is_empty() {
            None
        } else {
            self.page_info
                .and_then(|p| p.end_cursor)
                .filter(|c| !c.is_empty())
        };
        Page {
            data: self.data.into_iter().map(convert).collect(),
            next_cursor,
        }
    }
}

#[derive(Deserialize)]
struct WireApp {
    id: String,
    #[serde(default)]
    name_slug: String,
    #[serde(default)]
    name: String,
}

impl From<WireApp> for ExternalApp {
    fn from(app: WireApp) -> Self {
        ExternalApp {
            app_id: app.id,
            slug: app.name_slug,
            display_name: app.name,
        }
    }
}

#[derive(Deserialize)]
struct WireAccount {
    id: String,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    healthy: Option<bool>,
    #[serde(default)]
    dead: Option<bool>,
    app: WireApp,
    #[serde(default)]
    credentials: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WireAccount> for ExternalAccount {
    fn from(account: WireAccount) -> Self {
        ExternalAccount {
            account_id: account.id,
            tenant: account.external_id.unwrap_or_default(),
            app: account.app.into(),
            healthy: account.healthy.unwrap_or(false),
            dead: account.dead.unwrap_or(false),
            credentials: account.credentials,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Serialize)]
struct CreateTokenRequest<'a> {
    external_user_id: &'a str,
    allowed_origins: &'a [String],
}

#[derive(Deserialize)]
struct CreateTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    connect_link_url: Option<String>,
}

/// Options arrive either as `{label, value}` objects or as bare values
#[derive(Deserialize)]
#[serde(untagged)]
enum WireOption {
    Labeled {
        label: String,
        value: serde_json::Value,
    },
    Bare(serde_json::Value),
}

impl From<WireOption> for PropOption {
    fn from(option: WireOption) -> Self {
        match option {
            WireOption::Labeled { label, value } => PropOption { label, value },
            WireOption::Bare(value) => PropOption::from_value(value),
        }
    }
}

#[derive(Deserialize)]
struct WireProp {
    name: String,
    #[serde(rename = "type")]
    prop_type: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    optional: Option<bool>,
    #[serde(default)]
    options: Option<Vec<WireOption>>,
    #[serde(default, rename = "remoteOptions")]
    remote_options: Option<bool>,
    #[serde(default, rename = "dependsOn")]
    depends_on: Option<Vec<String>>,
    #[serde(default)]
    app: Option<String>,
}

impl From<WireProp> for PropDefinition {
    fn from(prop: WireProp) -> Self {
        PropDefinition {
            kind: PropKind::parse(&prop.prop_type, prop.app.as_deref()),
            name: prop.name,
            label: prop.label,
            required: !prop.optional.unwrap_or(false),
            depends_on: prop.depends_on.unwrap_or_default(),
            options: prop
                .options
                .map(|opts| opts.into_iter().map(PropOption::from).collect()),
            remote_options: prop.remote_options.unwrap_or(false),
        }
    }
}

#[derive(Deserialize)]
struct WireComponent {
    key: String,
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    configurable_props: Vec<WireProp>,
}

impl WireComponent {
    fn into_component(self, component_type: ComponentType) -> Component {
        let props: Vec<PropDefinition> = self
            .configurable_props
            .into_iter()
            .map(PropDefinition::from)
            .collect();
        Component {
            app: Component::app_from_props(&props),
            key: self.key,
            name: self.name,
            version: self.version,
            description: self.description,
            component_type,
            props,
        }
    }
}

#[derive(Serialize)]
struct ConfigurePropRequest<'a> {
    external_user_id: &'a str,
    id: &'a str,
    prop_name: &'a str,
    configured_props: &'a ConfiguredProps,
}

#[derive(Deserialize)]
struct ConfigurePropResponse {
    #[serde(default)]
    options: Option<Vec<WireOption>>,
    #[serde(default, rename = "stringOptions")]
    string_options: Option<Vec<String>>,
    #[serde(default)]
    errors: Option<Vec<String>>,
}

impl From<ConfigurePropResponse> for RemoteOptions {
    fn from(response: ConfigurePropResponse) -> Self {
        let mut options: Vec<PropOption> = response
            .options
            .unwrap_or_default()
            .into_iter()
            .map(PropOption::from)
            .collect();
        if let Some(strings) = response.string_options {
            options.extend(
                strings
                    .into_iter()
                    .map(|s| PropOption::from_value(serde_json::Value::String(s))),
            );
        }
        RemoteOptions {
            options,
            errors: response.errors.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the remote platform's Connect REST API.
///
/// Authenticates every call with a client-credentials bearer token and scopes
/// it to one project and environment.
pub struct ConnectClient {
    http_client: Client,
    base_url: String,
    project_id: String,
    environment: PlatformEnvironment,
    auth: PlatformAuth,
}

impl ConnectClient {
    /// Build a client from platform configuration.
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent("connect-gateway/0.1")
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let auth = PlatformAuth::new(
            http_client.clone(),
            &base_url,
            config.client_id.clone(),
            config.client_secret.clone(),
        );
        Ok(Self {
            http_client,
            base_url,
            project_id: config.project_id.clone(),
            environment: config.environment,
            auth,
        })
    }

    fn connect_url(&self, path: &str) -> String {
        format!(
            "{}/connect/{}/{}",
            self.base_url,
            encode(&self.project_id),
            path
        )
    }

    /// Attach auth + environment headers, send, and map failure statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(&token)
            .header("X-PD-Environment", self.environment.as_str())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Token may have been revoked early; the next call fetches a new one
            self.auth.invalidate(&token).await;
        }
        check_response_status(response).await
    }
}

/// Map non-2xx responses to gateway errors, keeping the platform's message.
///
/// - 404 → `NotFound`
/// - Other non-2xx → `Upstream` with status
async fn check_response_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = remote_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown platform error")
            .to_string()
    });

    if status == StatusCode::NOT_FOUND {
        Err(GatewayError::NotFound(message))
    } else {
        Err(GatewayError::Upstream {
            status: Some(status.as_u16()),
            message,
        })
    }
}

/// Pull a human-readable message out of an error body.
fn remote_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let candidate = json
            .get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
            .or_else(|| json.get("message").and_then(|m| m.as_str()));
        if let Some(message) = candidate {
            return Some(message.to_string());
        }
    }
    Some(trimmed.to_string())
}

fn push_opt(query: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        query.push((key, v.to_string()));
    }
}

#[async_trait]
impl ConnectPlatform for ConnectClient {
    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        cursor: Option<&str>,
    ) -> Result<Page<ExternalAccount>> {
        let mut query = Vec::new();
        push_opt(&mut query, "app", filter.app.as_deref());
        push_opt(&mut query, "oauth_app_id", filter.oauth_app_id.as_deref());
        push_opt(&mut query, "external_user_id", filter.external_user_id.as_deref());
        query.push(("include_credentials", filter.include_credentials.to_string()));
        query.push(("limit", ACCOUNT_PAGE_SIZE.to_string()));
        push_opt(&mut query, "after", cursor);

        let response = self
            .send(self.http_client.get(self.connect_url("accounts")).query(&query))
            .await?;
        let list: ListResponse<WireAccount> = response.json().await?;
        Ok(list.into_page(ExternalAccount::from))
    }

    async fn get_account(
        &self,
        account_id: &str,
        include_credentials: bool,
    ) -> Result<ExternalAccount> {
        let url = self.connect_url(&format!("accounts/{}", encode(account_id)));
        let response = self
            .send(
                self.http_client
                    .get(url)
                    .query(&[("include_credentials", include_credentials.to_string())]),
            )
            .await?;
        let account: Single<WireAccount> = response.json().await?;
        Ok(account.into_inner().into())
    }

    async fn delete_account(&self, account_id: &str) -> Result<()> {
        let url = self.connect_url(&format!("accounts/{}", encode(account_id)));
        self.send(self.http_client.delete(url)).await?;
        Ok(())
    }

    async fn delete_external_user(&self, tenant: &TenantId) -> Result<()> {
        let url = self.connect_url(&format!("users/{}", encode(tenant.as_str())));
        self.send(self.http_client.delete(url)).await?;
        Ok(())
    }

    async fn create_connect_token(
        &self,
        tenant: &TenantId,
        allowed_origins: &[String],
    ) -> Result<IssuedToken> {
        let response = self
            .send(
                self.http_client
                    .post(self.connect_url("tokens"))
                    .json(&CreateTokenRequest {
                        external_user_id: tenant.as_str(),
                        allowed_origins,
                    }),
            )
            .await?;
        let token: CreateTokenResponse = response.json().await?;
        Ok(IssuedToken {
            token: token.token,
            expires_at: token.expires_at,
            connect_link_url: token.connect_link_url,
        })
    }

    async fn list_components(
        &self,
        component_type: ComponentType,
        filter: &ComponentFilter,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ComponentSummary>> {
        let mut query = Vec::new();
        push_opt(&mut query, "app", filter.app.as_deref());
        push_opt(&mut query, "q", filter.q.as_deref());
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        push_opt(&mut query, "after", cursor);

        let response = self
            .send(
                self.http_client
                    .get(self.connect_url(component_type.collection()))
                    .query(&query),
            )
            .await?;
        let list: ListResponse<ComponentSummary> = response.json().await?;
        Ok(list.into_page(|c| c))
    }

    async fn get_component(&self, component_type: ComponentType, key: &str) -> Result<Component> {
        let url = self.connect_url(&format!("{}/{}", component_type.collection(), encode(key)));
        let response = self.send(self.http_client.get(url)).await?;
        let component: Single<WireComponent> = response.json().await?;
        Ok(component.into_inner().into_component(component_type))
    }

    async fn configure_prop(&self, request: PropConfiguration<'_>) -> Result<RemoteOptions> {
        let response = self
            .send(
                self.http_client
                    .post(self.connect_url("components/configure"))
                    .json(&ConfigurePropRequest {
                        external_user_id: request.tenant.as_str(),
                        id: request.component_key,
                        prop_name: request.prop_name,
                        configured_props: request.configured_props,
                    }),
            )
            .await?;
        let configured: ConfigurePropResponse = response.json().await?;
        Ok(configured.into())
    }

    async fn list_apps(
        &self,
        q: Option<&str>,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<ExternalApp>> {
        let mut query = Vec::new();
        push_opt(&mut query, "q", q);
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        push_opt(&mut query, "after", cursor);

        let url = format!("{}/apps", self.base_url);
        let response = self.send(self.http_client.get(url).query(&query)).await?;
        let list: ListResponse<WireApp> = response.json().await?;
        Ok(list.into_page(ExternalApp::from))
    }

    async fn get_app(&self, app_id: &str) -> Result<ExternalApp> {
        let url = format!("{}/apps/{}", self.base_url, encode(app_id));
        let response = self.send(self.http_client.get(url)).await?;
        let app: Single<WireApp> = response.json().await?;
        Ok(app.into_inner().into())
    }
}
